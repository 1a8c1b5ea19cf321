//! Persisted sync settings model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default size of the ingestion worker pool (sequential)
pub const DEFAULT_INGEST_WORKERS: usize = 1;

/// Settings the sync engine reads from persisted configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Start time of the last fully completed sync round (the sync baseline)
    pub last_sync_date: Option<DateTime<Utc>>,
    /// Whether notebook templates appear in note listings
    pub include_templates_in_listing: bool,
    /// Ingestion worker pool size
    pub ingest_workers: usize,
}

impl SyncSettings {
    /// The baseline used for conflict detection; never-synced clients use the epoch.
    pub fn baseline(&self) -> DateTime<Utc> {
        self.last_sync_date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            last_sync_date: None,
            include_templates_in_listing: false,
            ingest_workers: DEFAULT_INGEST_WORKERS,
        }
    }
}
