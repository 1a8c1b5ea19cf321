//! Database layer for Margin

mod connection;
mod migrations;
mod repository;
mod settings_repository;

pub use connection::Database;
pub use repository::{ListFilter, NoteKey, NoteStore, SqliteNoteStore};
pub use settings_repository::{SettingsStore, SqliteSettingsStore};
