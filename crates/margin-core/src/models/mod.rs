//! Data models for Margin

pub mod change_date;
pub mod content;
mod note;
mod settings;
mod wire;

pub use note::{Note, NoteGuid, NoteHandle, NoteLifecycle, DELETED_TAG, TEMPLATE_TAG};
pub use settings::{SyncSettings, DEFAULT_INGEST_WORKERS};
pub use wire::NoteWire;
