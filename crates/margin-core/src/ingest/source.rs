//! Document listing for ingestion

use std::path::{Path, PathBuf};

use super::document::NOTE_SUFFIX;
use crate::error::Result;

/// Every `.note` document directly inside `dir`, sorted by file name
pub async fn list_note_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut documents = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_note = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(NOTE_SUFFIX));
        if is_note && entry.file_type().await?.is_file() {
            documents.push(path);
        }
    }

    documents.sort();
    Ok(documents)
}
