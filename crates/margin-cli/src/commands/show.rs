use std::path::Path;

use margin_core::models::change_date::format_change_date;
use margin_core::models::content::to_plain_text;
use margin_core::models::NoteWire;
use margin_core::Note;

use crate::commands::common::{
    normalize_note_identifier, open_workspace, render_tags, resolve_note,
};
use crate::error::CliError;

pub async fn run_show(id: &str, xml: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let workspace = open_workspace(db_path)?;
    let note = resolve_note(&normalized_id, workspace.notes.as_ref()).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&note_json(&note, xml))?);
        return Ok(());
    }
    if xml {
        println!("{}", note.xml_content());
        return Ok(());
    }

    println!("{}", note.title);
    println!("guid:     {}", note.guid);
    println!("changed:  {}", format_change_date(&note.last_change_date()));
    if note.is_template() {
        println!("template: yes");
    }
    let tags = render_tags(&note);
    if !tags.is_empty() {
        println!("tags:     {tags}");
    }
    println!();
    println!("{}", to_plain_text(note.xml_content()).trim_end());
    Ok(())
}

/// Wire form of the note; the content markup only when asked for
pub fn note_json(note: &Note, with_content: bool) -> NoteWire {
    if with_content {
        NoteWire::from(note)
    } else {
        note.to_wire_without_content()
    }
}
