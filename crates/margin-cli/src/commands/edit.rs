use std::path::Path;

use margin_core::db::NoteStore;
use margin_core::models::content::{inner_markup, replace_inner_markup};
use margin_core::Note;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_note_identifier, open_workspace, resolve_note,
};
use crate::error::CliError;

pub async fn run_edit(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let workspace = open_workspace(db_path)?;
    let mut note = resolve_note(&normalized_id, workspace.notes.as_ref()).await?;

    // The editor works on the raw markup inside the note-content wrapper.
    let current = inner_markup(note.xml_content()).trim().to_string();
    let Some(edited) = capture_editor_input_with_initial(&current)? else {
        return Err(CliError::EmptyEditedContent);
    };

    if apply_edit(&mut note, &edited)? {
        workspace.notes.upsert(&note).await?;
    }
    println!("{}", note.guid);
    Ok(())
}

/// Put edited markup back into the note. Returns whether the body changed;
/// markup that is not well-formed is rejected and the note left as it was.
pub fn apply_edit(note: &mut Note, edited: &str) -> Result<bool, CliError> {
    if edited == inner_markup(note.xml_content()).trim() {
        return Ok(false);
    }
    let content = replace_inner_markup(note.xml_content(), edited)?;
    note.change_content(content);
    Ok(true)
}
