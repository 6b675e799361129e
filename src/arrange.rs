use crate::utils::files::{validate_segment, OUTPUT_EXTENSION};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Statistics for one arrange pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArrangeSummary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Batch check which flat `<base>/<id>.jpg` files exist
fn batch_check_existing(base: &Path, ids: &[String]) -> HashMap<String, bool> {
    ids.par_iter()
        .map(|id| {
            let exists = validate_segment(id)
                .map(|id| base.join(format!("{}.{}", id, OUTPUT_EXTENSION)).is_file())
                .unwrap_or(false);
            (id.clone(), exists)
        })
        .collect()
}

/// Move each `<base>/<id>.jpg` into `<base>/<lang>/<id>.jpg`.
///
/// Missing files are skipped, failed moves are logged; neither stops the
/// pass. A file already at the destination is replaced.
pub fn arrange(base: &Path, lang: &str, ids: &[String]) -> ArrangeSummary {
    let mut summary = ArrangeSummary::default();

    if let Err(e) = validate_segment(lang) {
        warn!("Cannot arrange into language folder: {}", e);
        summary.failed = ids.len();
        return summary;
    }
    let lang_dir = base.join(lang);
    let existing = batch_check_existing(base, ids);

    for id in ids {
        if let Err(e) = validate_segment(id) {
            warn!("Rejected id '{}': {}", id, e);
            summary.failed += 1;
            continue;
        }

        let file_name = format!("{}.{}", id, OUTPUT_EXTENSION);
        if !existing.get(id).copied().unwrap_or(false) {
            info!("Skipping {}: not found in {}", file_name, base.display());
            summary.skipped += 1;
            continue;
        }

        let moved = fs::create_dir_all(&lang_dir)
            .and_then(|_| fs::rename(base.join(&file_name), lang_dir.join(&file_name)));
        match moved {
            Ok(()) => {
                info!("Moved {} to {}", file_name, lang_dir.display());
                summary.moved += 1;
            }
            Err(e) => {
                warn!("Failed to move {}: {}", file_name, e);
                summary.failed += 1;
            }
        }
    }

    summary
}
