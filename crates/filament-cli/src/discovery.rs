//! Markdown discovery under a vault root.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with('.'))
}

/// All markdown files under `vault`, sorted.
///
/// Hidden entries are never visited, which keeps the `.filament` working
/// directory and editor state like `.obsidian` out of the document set.
/// An unreadable directory is skipped with a warning rather than aborting
/// the walk.
pub fn discover_documents(vault: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = WalkDir::new(vault)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry during vault scan");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|path| path.extension().map_or(false, |ext| ext == "md"))
        .collect();
    documents.sort();
    documents
}
