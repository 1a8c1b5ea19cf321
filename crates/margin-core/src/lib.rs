//! margin-core - Core library for Margin
//!
//! This crate contains the note model, the local `SQLite` store, the document
//! ingestion pipeline and the sync engine used by the Margin CLI.

pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Note, NoteGuid, NoteLifecycle};
