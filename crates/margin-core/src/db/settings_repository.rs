//! Settings repository implementation

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::change_date::{format_change_date, parse_change_date};
use crate::models::SyncSettings;

const LAST_SYNC_DATE: &str = "last_sync_date";
const INCLUDE_TEMPLATES: &str = "include_templates_in_listing";
const INGEST_WORKERS: &str = "ingest_workers";

/// Trait for persisted sync configuration
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load settings, falling back to defaults for missing keys
    async fn load(&self) -> Result<SyncSettings>;

    /// Save settings
    async fn save(&self, settings: &SyncSettings) -> Result<()>;
}

/// `SQLite` implementation of `SettingsStore`
#[derive(Clone)]
pub struct SqliteSettingsStore {
    db: Arc<Database>,
}

impl SqliteSettingsStore {
    /// Create a new repository over the shared database
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load(&self) -> Result<SyncSettings> {
        let conn = self.db.connection().await;
        let mut settings = SyncSettings::default();

        if let Some(value) = Self::get_setting(&conn, LAST_SYNC_DATE)? {
            match parse_change_date(&value) {
                Ok(date) => settings.last_sync_date = Some(date),
                Err(error) => tracing::warn!("Ignoring stored sync date: {error}"),
            }
        }

        if let Some(value) = Self::get_setting(&conn, INCLUDE_TEMPLATES)? {
            settings.include_templates_in_listing = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(value) = Self::get_setting(&conn, INGEST_WORKERS)? {
            if let Ok(workers) = value.trim().parse::<usize>() {
                settings.ingest_workers = workers.max(1);
            }
        }

        Ok(settings)
    }

    async fn save(&self, settings: &SyncSettings) -> Result<()> {
        let mut conn = self.db.connection().await;
        let tx = conn.transaction()?;

        match settings.last_sync_date {
            Some(date) => Self::set_setting(&tx, LAST_SYNC_DATE, &format_change_date(&date))?,
            None => {
                tx.execute("DELETE FROM settings WHERE key = ?", params![LAST_SYNC_DATE])?;
            }
        }
        Self::set_setting(
            &tx,
            INCLUDE_TEMPLATES,
            if settings.include_templates_in_listing {
                "true"
            } else {
                "false"
            },
        )?;
        Self::set_setting(&tx, INGEST_WORKERS, &settings.ingest_workers.to_string())?;

        tx.commit()?;
        Ok(())
    }
}
