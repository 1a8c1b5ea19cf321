//! Note model

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::change_date::{normalize, now_utc, parse_change_date};
use crate::error::{Error, Result};

/// Tag marking a tombstone kept until the remote confirms deletion
pub const DELETED_TAG: &str = "system:deleted";
/// Tag marking a notebook template, hidden from normal listings
pub const TEMPLATE_TAG: &str = "system:template";

/// Globally unique note identifier, the only identity shared by local and remote stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteGuid(Uuid);

impl NoteGuid {
    /// Create a new random guid
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this guid
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteGuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteGuid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidGuid(s.to_string()))
    }
}

/// Local store row identifier. Assigned by the store; never part of identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteHandle(pub i64);

impl fmt::Display for NoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state carried by the `system:*` sentinel tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLifecycle {
    #[default]
    Active,
    /// Tombstone, removed once the remote has deleted it
    Deleted,
    /// Notebook template, excluded from normal listing
    Template,
}

impl NoteLifecycle {
    /// The sentinel tag for this state, if any
    pub const fn sentinel_tag(self) -> Option<&'static str> {
        match self {
            Self::Active => None,
            Self::Deleted => Some(DELETED_TAG),
            Self::Template => Some(TEMPLATE_TAG),
        }
    }

    /// Stable name used by the local store
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
            Self::Template => "template",
        }
    }
}

impl FromStr for NoteLifecycle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            "template" => Ok(Self::Template),
            other => Err(Error::InvalidInput(format!("unknown note lifecycle '{other}'"))),
        }
    }
}

/// A note, the unit of synchronization
///
/// The body and the change date are private so that every user-visible edit
/// goes through [`Note::change_content`], which advances the date in the same
/// step.
#[derive(Debug, Clone)]
pub struct Note {
    /// Identity shared with the remote service
    pub guid: NoteGuid,
    /// Human-readable title
    pub title: String,
    xml_content: String,
    last_change_date: DateTime<Utc>,
    /// Legacy revision counter, kept for backward compatibility only
    pub last_sync_revision: Option<i64>,
    /// Tags other than the current lifecycle sentinel. A tombstoned template
    /// keeps `system:template` here so the wire copy still says what it was.
    pub tags: BTreeSet<String>,
    /// Active, tombstoned or template
    pub lifecycle: NoteLifecycle,
    /// Row identifier in the local store, once persisted
    pub local_handle: Option<NoteHandle>,
    /// Source document path for notes loaded from disk
    pub file_name: Option<String>,
}

impl Note {
    /// Build a note with an empty body
    #[must_use]
    pub fn new(guid: NoteGuid, title: impl Into<String>, last_change_date: DateTime<Utc>) -> Self {
        Self {
            guid,
            title: title.into(),
            xml_content: String::new(),
            last_change_date: normalize(last_change_date),
            last_sync_revision: None,
            tags: BTreeSet::new(),
            lifecycle: NoteLifecycle::Active,
            local_handle: None,
            file_name: None,
        }
    }

    /// Create a brand-new note authored now
    #[must_use]
    pub fn create(title: impl Into<String>, xml_content: impl Into<String>) -> Self {
        let mut note = Self::new(NoteGuid::new(), title, now_utc());
        note.xml_content = xml_content.into();
        note
    }

    pub fn xml_content(&self) -> &str {
        &self.xml_content
    }

    pub const fn last_change_date(&self) -> DateTime<Utc> {
        self.last_change_date
    }

    /// Parse and set the change date from its raw string form.
    pub fn set_change_date(&mut self, raw: &str) -> Result<()> {
        self.last_change_date = parse_change_date(raw)?;
        Ok(())
    }

    pub fn set_change_date_utc(&mut self, date: DateTime<Utc>) {
        self.last_change_date = normalize(date);
    }

    /// Replace the body without touching the change date (re-hydration).
    pub fn set_content_preserving_timestamp(&mut self, xml_content: impl Into<String>) {
        self.xml_content = xml_content.into();
    }

    /// Replace the body as a user edit; the change date moves to now.
    pub fn change_content(&mut self, xml_content: impl Into<String>) {
        self.xml_content = xml_content.into();
        self.touch();
    }

    /// Tombstone the note so the next sync round deletes it remotely.
    pub fn mark_deleted(&mut self) {
        self.enter_deleted();
        self.touch();
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle == NoteLifecycle::Deleted
    }

    pub fn is_template(&self) -> bool {
        self.lifecycle == NoteLifecycle::Template
    }

    /// Add a tag, folding lifecycle sentinels into [`NoteLifecycle`].
    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        match tag {
            "" => {}
            DELETED_TAG => self.enter_deleted(),
            TEMPLATE_TAG => {
                if self.lifecycle == NoteLifecycle::Deleted {
                    self.tags.insert(TEMPLATE_TAG.to_string());
                } else {
                    self.lifecycle = NoteLifecycle::Template;
                }
            }
            other => {
                self.tags.insert(other.to_string());
            }
        }
    }

    /// All tags including the lifecycle sentinel, as documents and the wire carry them
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags = self.tags.iter().cloned().collect::<Vec<_>>();
        if let Some(sentinel) = self.lifecycle.sentinel_tag() {
            tags.push(sentinel.to_string());
        }
        tags
    }

    fn enter_deleted(&mut self) {
        if self.lifecycle == NoteLifecycle::Template {
            self.tags.insert(TEMPLATE_TAG.to_string());
        }
        self.lifecycle = NoteLifecycle::Deleted;
    }

    // Dates are normalized to milliseconds, so two edits less than 1ms apart
    // would otherwise share a timestamp.
    fn touch(&mut self) {
        let now = now_utc();
        self.last_change_date = if now > self.last_change_date {
            now
        } else {
            self.last_change_date + chrono::Duration::milliseconds(1)
        };
    }
}

/// Notes compare by guid, change date and title. The body is not compared.
impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.guid == other.guid
            && self.last_change_date == other.last_change_date
            && self.title == other.title
    }
}

impl Eq for Note {}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Note: {} ({})",
            self.title,
            super::change_date::format_change_date(&self.last_change_date)
        )
    }
}
