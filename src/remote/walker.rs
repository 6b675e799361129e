use super::{image_id, EntryKind, ImageRecord, ListingSource};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Recursively collect every image below `root`.
///
/// Listing calls are issued one at a time, depth-first, in the order the
/// service returns entries. A directory whose listing fails is logged and
/// contributes nothing; its siblings are still walked.
pub async fn walk(source: &dyn ListingSource, root: &str) -> Vec<ImageRecord> {
    let records = walk_dir(source, root.to_string(), String::new()).await;
    debug!("Found {} images under {}", records.len(), root);
    records
}

fn walk_dir<'a>(
    source: &'a dyn ListingSource,
    path: String,
    relative: String,
) -> BoxFuture<'a, Vec<ImageRecord>> {
    async move {
        let entries = match source.list(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping '{}': {}", path, e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            match entry.kind {
                EntryKind::Dir => {
                    let child = join_relative(&relative, &entry.name);
                    records.extend(walk_dir(source, entry.path, child).await);
                }
                EntryKind::File => {
                    if let Some(id) = image_id(&entry.name) {
                        records.push(ImageRecord::new(id, relative.clone()));
                    }
                }
                EntryKind::Other => {}
            }
        }
        records
    }
    .boxed()
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Sort records by id and keep the first record seen for each id
pub fn sort_and_dedup(records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ImageRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect();
    unique.sort_by(|a, b| a.id.cmp(&b.id));
    unique
}
