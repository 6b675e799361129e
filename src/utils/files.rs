use crate::error::{FetchError, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Extension every saved image gets, whatever the source format
pub const OUTPUT_EXTENSION: &str = "jpg";

/// `LANG=FILE` pair naming the ID list of one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageList {
    pub lang: String,
    pub path: PathBuf,
}

impl FromStr for LanguageList {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lang, path) = s
            .split_once('=')
            .ok_or_else(|| format!("Expected LANG=FILE, got '{s}'"))?;
        let lang = lang.trim();
        validate_segment(lang).map_err(|e| e.to_string())?;
        if path.trim().is_empty() {
            return Err(format!("Missing ID list file for '{lang}'"));
        }
        Ok(Self {
            lang: lang.to_string(),
            path: PathBuf::from(path.trim()),
        })
    }
}

/// Read an ID list: one identifier per line, blank lines dropped.
///
/// A missing or unreadable file is logged and treated as an empty list.
pub fn read_ids<P: AsRef<Path>>(path: P) -> Vec<String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => parse_ids(&content),
        Err(e) => {
            warn!("Could not read ID list {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn parse_ids(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Write an ID list, one identifier per line
pub fn write_ids<P: AsRef<Path>>(path: P, ids: &[String]) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut content = ids.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)
}

/// Check that `segment` is a single plain path component
pub fn validate_segment(segment: &str) -> Result<&str> {
    let invalid = segment.is_empty()
        || segment.contains(['/', '\\', '\0'])
        || matches!(
            Path::new(segment).components().next(),
            Some(Component::CurDir | Component::ParentDir | Component::Prefix(_))
        );
    if invalid {
        return Err(FetchError::InvalidPath(segment.to_string()));
    }
    Ok(segment)
}

/// `<base>/<lang>/<relative…>/<id>.jpg`, refusing anything that would leave `base`
pub fn destination_path(base: &Path, lang: &str, relative: &str, id: &str) -> Result<PathBuf> {
    let mut path = base.join(validate_segment(lang)?);
    for segment in relative.split(['/', '\\']).filter(|s| !s.is_empty()) {
        path.push(validate_segment(segment)?);
    }
    path.push(format!("{}.{}", validate_segment(id)?, OUTPUT_EXTENSION));
    Ok(path)
}

/// Write `bytes` to `path`, creating parent directories and replacing any
/// existing file. Returns the absolute path written.
///
/// The write is not atomic: an interrupted run can leave a truncated file.
pub async fn save_image(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    let absolute = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    debug!("Saved {} bytes to {}", bytes.len(), absolute.display());
    Ok(absolute)
}
