use std::path::Path;

use margin_core::db::NoteStore;

use crate::commands::common::{normalize_note_identifier, open_workspace, resolve_note};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let workspace = open_workspace(db_path)?;
    let mut note = resolve_note(&normalized_id, workspace.notes.as_ref()).await?;

    note.mark_deleted();
    workspace.notes.upsert(&note).await?;
    println!("{}", note.guid);
    Ok(())
}

pub async fn run_purge(db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path)?;
    let purged = workspace.notes.purge_deleted().await?;
    println!("Removed {purged} deleted note(s)");
    Ok(())
}
