use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub mod contents;
pub mod walker;

pub use contents::ContentsClient;
pub use walker::{sort_and_dedup, walk};

/// Extensions, compared case-insensitively, that mark an image file
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    #[serde(alias = "directory")]
    Dir,
    /// Symlinks, submodules and anything else the walk ignores
    #[serde(other)]
    Other,
}

/// One node of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// An image found by the walk, with the directory chain that leads to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    /// Directory names below the walk root joined by `/`, empty at the root
    pub relative_path: String,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// Something that can list one directory of the remote tree
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;
}

/// Identifier for an image file name, or `None` if the name is not an image.
///
/// `cover.PNG` gives `cover`; `notes.txt` and `.png` give `None`.
pub fn image_id(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        .then_some(stem)
}
