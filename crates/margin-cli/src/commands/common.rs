use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use margin_core::db::{Database, ListFilter, NoteStore, SqliteNoteStore, SqliteSettingsStore};
use margin_core::models::change_date::format_change_date;
use margin_core::models::content::to_plain_text;
use margin_core::sync::FolderRemote;
use margin_core::{Note, NoteGuid};
use serde::Serialize;

use crate::error::CliError;

/// The local database and the stores over it
pub struct Workspace {
    pub notes: Arc<SqliteNoteStore>,
    pub settings: Arc<SqliteSettingsStore>,
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub guid: String,
    pub title: String,
    pub preview: String,
    pub last_change_date: String,
    pub relative_time: String,
    pub lifecycle: String,
    pub tags: Vec<String>,
}

pub fn open_workspace(db_path: &Path) -> Result<Workspace, CliError> {
    let db = Arc::new(Database::open(db_path)?);
    Ok(Workspace {
        notes: Arc::new(SqliteNoteStore::new(Arc::clone(&db))),
        settings: Arc::new(SqliteSettingsStore::new(db)),
    })
}

pub async fn open_remote(remote_dir: &Path) -> Result<Arc<FolderRemote>, CliError> {
    Ok(Arc::new(FolderRemote::open(remote_dir).await?))
}

pub async fn list_notes(
    limit: usize,
    include_templates: bool,
    query: Option<&str>,
    db_path: &Path,
) -> Result<Vec<Note>, CliError> {
    let workspace = open_workspace(db_path)?;
    let filter = ListFilter {
        include_templates,
        query: query.map(ToString::to_string),
        limit: Some(limit),
    };
    Ok(workspace.notes.list(&filter).await?)
}

/// Find a live note by full guid or unique guid prefix
pub async fn resolve_note(note_query: &str, store: &dyn NoteStore) -> Result<Note, CliError> {
    if let Ok(guid) = note_query.parse::<NoteGuid>() {
        if let Some(note) = store.find(&guid).await?.filter(|note| !note.is_deleted()) {
            return Ok(note);
        }
    }

    let prefix = note_query.to_lowercase();
    let mut matching = store
        .list_by_guid_date()
        .await?
        .into_iter()
        .filter(|note| !note.is_deleted() && note.guid.as_str().starts_with(&prefix))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(note_query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_guid(&note.guid))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "Guid prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_guid(guid: &NoteGuid) -> String {
    guid.as_str().chars().take(8).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_guid(&note.guid);
            let title = truncate(&note.title, 40);
            let relative_time =
                format_relative_time(note.last_change_date().timestamp_millis(), now_ms);
            let tags = render_tags(note);

            if tags.is_empty() {
                format!("{short_id:<8}  {title:<40}  {relative_time}")
            } else {
                format!("{short_id:<8}  {title:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        guid: note.guid.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        last_change_date: format_change_date(&note.last_change_date()),
        relative_time: format_relative_time(note.last_change_date().timestamp_millis(), now_ms),
        lifecycle: note.lifecycle.as_str().to_string(),
        tags: note.tags.iter().cloned().collect(),
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let text = to_plain_text(note.xml_content());
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    truncate(first_line, max_chars)
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Body from the arguments, else from piped stdin. Empty bodies are allowed.
pub fn resolve_note_body(body_parts: &[String]) -> Result<String, CliError> {
    if let Some(body) = normalize_content(&body_parts.join(" ")) {
        return Ok(body);
    }
    Ok(read_piped_stdin()?.unwrap_or_default())
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("margin-note-{}-{now}.txt", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("MARGIN_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn resolve_remote_dir(cli_remote: Option<PathBuf>) -> PathBuf {
    cli_remote
        .or_else(|| env::var_os("MARGIN_REMOTE_DIR").map(PathBuf::from))
        .unwrap_or_else(default_remote_dir)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("margin")
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("margin.db")
}

pub fn default_remote_dir() -> PathBuf {
    data_dir().join("remote")
}
