//! Local note store

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::change_date::{format_change_date, parse_change_date};
use crate::models::{Note, NoteGuid, NoteHandle, NoteLifecycle};

/// Which notes a listing query returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Include notebook templates (tombstones are never listed)
    pub include_templates: bool,
    /// Whitespace-separated words that must all appear in title or content
    pub query: Option<String>,
    /// Maximum number of notes
    pub limit: Option<usize>,
}

/// Address of a stored note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKey {
    Handle(NoteHandle),
    Guid(NoteGuid),
}

impl From<NoteHandle> for NoteKey {
    fn from(handle: NoteHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<NoteGuid> for NoteKey {
    fn from(guid: NoteGuid) -> Self {
        Self::Guid(guid)
    }
}

/// Trait for local note storage, the single shared mutable resource of a sync
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Get a note by guid, tombstones included
    async fn find(&self, guid: &NoteGuid) -> Result<Option<Note>>;

    /// Insert the note, or overwrite the stored note with the same guid
    async fn upsert(&self, note: &Note) -> Result<NoteHandle>;

    /// Physically remove a note; returns whether a row was removed
    async fn delete(&self, key: NoteKey) -> Result<bool>;

    /// Every stored note ordered by guid, tombstones and templates included
    async fn list_by_guid_date(&self) -> Result<Vec<Note>>;

    /// Listing query, newest first
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Note>>;

    /// Physically remove every tombstone; returns the number removed
    async fn purge_deleted(&self) -> Result<usize>;
}

/// `SQLite` implementation of `NoteStore`
#[derive(Clone)]
pub struct SqliteNoteStore {
    db: Arc<Database>,
}

const NOTE_COLUMNS: &str =
    "id, guid, title, file, content, modified_date, tags, lifecycle, last_sync_revision";

/// Raw row, converted to a [`Note`] outside the rusqlite row callback
struct NoteRow {
    id: i64,
    guid: String,
    title: String,
    file: Option<String>,
    content: String,
    modified_date: String,
    tags: String,
    lifecycle: String,
    last_sync_revision: Option<i64>,
}

impl NoteRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            guid: row.get(1)?,
            title: row.get(2)?,
            file: row.get(3)?,
            content: row.get(4)?,
            modified_date: row.get(5)?,
            tags: row.get(6)?,
            lifecycle: row.get(7)?,
            last_sync_revision: row.get(8)?,
        })
    }

    fn into_note(self) -> Result<Note> {
        let mut note = Note::new(
            self.guid.parse()?,
            self.title,
            parse_change_date(&self.modified_date)?,
        );
        note.set_content_preserving_timestamp(self.content);
        note.file_name = self.file;
        note.tags = serde_json::from_str(&self.tags)?;
        note.lifecycle = self.lifecycle.parse()?;
        note.last_sync_revision = self.last_sync_revision;
        note.local_handle = Some(NoteHandle(self.id));
        Ok(note)
    }
}

impl SqliteNoteStore {
    /// Create a new store over the shared database
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn query_notes(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Note>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, NoteRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(NoteRow::into_note).collect()
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn find(&self, guid: &NoteGuid) -> Result<Option<Note>> {
        let conn = self.db.connection().await;
        let row = conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE guid = ?"),
                params![guid.as_str()],
                NoteRow::read,
            )
            .optional()?;
        row.map(NoteRow::into_note).transpose()
    }

    async fn upsert(&self, note: &Note) -> Result<NoteHandle> {
        let tags = serde_json::to_string(&note.tags)?;
        let conn = self.db.connection().await;
        let id: i64 = conn.query_row(
            "INSERT INTO notes (guid, title, file, content, modified_date, tags, lifecycle, last_sync_revision)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(guid) DO UPDATE SET
                title = excluded.title,
                file = COALESCE(excluded.file, notes.file),
                content = excluded.content,
                modified_date = excluded.modified_date,
                tags = excluded.tags,
                lifecycle = excluded.lifecycle,
                last_sync_revision = COALESCE(excluded.last_sync_revision, notes.last_sync_revision)
             RETURNING id",
            params![
                note.guid.as_str(),
                note.title,
                note.file_name,
                note.xml_content(),
                format_change_date(&note.last_change_date()),
                tags,
                note.lifecycle.as_str(),
                note.last_sync_revision,
            ],
            |row| row.get(0),
        )?;

        tracing::trace!("Stored note {} as row {id}", note.guid);
        Ok(NoteHandle(id))
    }

    async fn delete(&self, key: NoteKey) -> Result<bool> {
        let conn = self.db.connection().await;
        let rows = match key {
            NoteKey::Handle(handle) => {
                conn.execute("DELETE FROM notes WHERE id = ?", params![handle.0])?
            }
            NoteKey::Guid(guid) => {
                conn.execute("DELETE FROM notes WHERE guid = ?", params![guid.as_str()])?
            }
        };
        Ok(rows > 0)
    }

    async fn list_by_guid_date(&self) -> Result<Vec<Note>> {
        let conn = self.db.connection().await;
        Self::query_notes(
            &conn,
            &format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY guid ASC, modified_date DESC"),
            [],
        )
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Note>> {
        let mut sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE lifecycle != ?");
        let mut values = vec![NoteLifecycle::Deleted.as_str().to_string()];

        if !filter.include_templates {
            sql.push_str(" AND lifecycle != ?");
            values.push(NoteLifecycle::Template.as_str().to_string());
        }

        for word in filter.query.iter().flat_map(|query| query.split_whitespace()) {
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')");
            let pattern = format!("%{}%", escape_like(word));
            values.push(pattern.clone());
            values.push(pattern);
        }

        sql.push_str(" ORDER BY modified_date DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit as i64));
        }

        let conn = self.db.connection().await;
        Self::query_notes(&conn, &sql, params_from_iter(values.iter()))
    }

    async fn purge_deleted(&self) -> Result<usize> {
        let conn = self.db.connection().await;
        let rows = conn.execute(
            "DELETE FROM notes WHERE lifecycle = ?",
            params![NoteLifecycle::Deleted.as_str()],
        )?;
        tracing::info!("Purged {rows} local tombstones");
        Ok(rows)
    }
}

/// Make `%`, `_` and `\` match literally in a `LIKE ... ESCAPE '\'` pattern
fn escape_like(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::change_date::now_utc;
    use crate::models::TEMPLATE_TAG;
    use pretty_assertions::assert_eq;

    fn setup() -> SqliteNoteStore {
        SqliteNoteStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn note(title: &str, body: &str) -> Note {
        Note::create(title, body)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_find() {
        let store = setup();
        let mut original = note("Hello", "<note-content>world</note-content>");
        original.add_tag("system:notebook:inbox");

        let handle = store.upsert(&original).await.unwrap();
        let fetched = store.find(&original.guid).await.unwrap().unwrap();

        assert_eq!(fetched, original);
        assert_eq!(fetched.xml_content(), original.xml_content());
        assert_eq!(fetched.tags, original.tags);
        assert_eq!(fetched.local_handle, Some(handle));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_overwrites_same_guid() {
        let store = setup();
        let mut original = note("Draft", "one");
        let first = store.upsert(&original).await.unwrap();

        original.change_content("two");
        let second = store.upsert(&original).await.unwrap();

        assert_eq!(first, second);
        let fetched = store.find(&original.guid).await.unwrap().unwrap();
        assert_eq!(fetched.xml_content(), "two");
        assert_eq!(fetched.last_change_date(), original.last_change_date());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_by_handle_and_guid() {
        let store = setup();
        let a = note("A", "");
        let b = note("B", "");
        let handle = store.upsert(&a).await.unwrap();
        store.upsert(&b).await.unwrap();

        assert!(store.delete(handle.into()).await.unwrap());
        assert!(!store.delete(handle.into()).await.unwrap());
        assert!(store.delete(b.guid.into()).await.unwrap());
        assert!(store.find(&a.guid).await.unwrap().is_none());
        assert!(store.find(&b.guid).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_hides_tombstones_and_templates() {
        let store = setup();
        store.upsert(&note("Visible", "")).await.unwrap();

        let mut template = note("Template", "");
        template.add_tag(TEMPLATE_TAG);
        store.upsert(&template).await.unwrap();

        let mut gone = note("Gone", "");
        gone.mark_deleted();
        store.upsert(&gone).await.unwrap();

        let titles = |notes: Vec<Note>| notes.into_iter().map(|n| n.title).collect::<Vec<_>>();

        let listed = store.list(&ListFilter::default()).await.unwrap();
        assert_eq!(titles(listed), vec!["Visible"]);

        let with_templates = store
            .list(&ListFilter {
                include_templates: true,
                ..ListFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(with_templates.len(), 2);
        assert!(with_templates.iter().all(|n| !n.is_deleted()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_search_requires_every_word() {
        let store = setup();
        store.upsert(&note("Shopping", "milk and eggs")).await.unwrap();
        store.upsert(&note("Recipes", "eggs benedict")).await.unwrap();
        store.upsert(&note("Work", "quarterly report")).await.unwrap();

        let eggs = store
            .list(&ListFilter {
                query: Some("eggs".to_string()),
                ..ListFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(eggs.len(), 2);

        let milk_eggs = store
            .list(&ListFilter {
                query: Some("eggs  milk".to_string()),
                ..ListFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(milk_eggs.len(), 1);
        assert_eq!(milk_eggs[0].title, "Shopping");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_search_matches_wildcards_literally() {
        let store = setup();
        store.upsert(&note("Discount", "50% off")).await.unwrap();
        store.upsert(&note("Plain", "500 off")).await.unwrap();
        store.upsert(&note("snake_case", "")).await.unwrap();
        store.upsert(&note("snakeXcase", "")).await.unwrap();

        let search = |query: &str| ListFilter {
            query: Some(query.to_string()),
            ..ListFilter::default()
        };
        let titles = |notes: Vec<Note>| notes.into_iter().map(|n| n.title).collect::<Vec<_>>();

        assert_eq!(titles(store.list(&search("0%")).await.unwrap()), vec!["Discount"]);
        assert_eq!(titles(store.list(&search("snake_")).await.unwrap()), vec!["snake_case"]);
        assert_eq!(titles(store.list(&search("%")).await.unwrap()), vec!["Discount"]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_newest_first_with_limit() {
        let store = setup();
        let base = now_utc();
        for (offset, title) in [(1, "old"), (3, "newest"), (2, "middle")] {
            let mut n = note(title, "");
            n.set_change_date_utc(base + chrono::Duration::seconds(offset));
            store.upsert(&n).await.unwrap();
        }

        let listed = store
            .list(&ListFilter {
                limit: Some(2),
                ..ListFilter::default()
            })
            .await
            .unwrap();
        let titles = listed.into_iter().map(|n| n.title).collect::<Vec<_>>();
        assert_eq!(titles, vec!["newest", "middle"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_purge_deleted() {
        let store = setup();
        let keep = note("Keep", "");
        let mut drop = note("Drop", "");
        drop.mark_deleted();
        store.upsert(&keep).await.unwrap();
        store.upsert(&drop).await.unwrap();

        assert_eq!(store.purge_deleted().await.unwrap(), 1);
        assert_eq!(store.list_by_guid_date().await.unwrap().len(), 1);
    }
}
