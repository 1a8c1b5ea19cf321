//! JSON wire form of a note, as exchanged with the remote sync service

use chrono::{DateTime, Utc};
use quick_xml::escape::unescape;
use serde::{Deserialize, Serialize};

use super::change_date::format_change_date;
use super::note::{Note, NoteGuid};
use crate::error::Result;

/// A note as the remote service sends and receives it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteWire {
    pub guid: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "note-content", default, skip_serializing_if = "Option::is_none")]
    pub note_content: Option<String>,
    #[serde(rename = "last-change-date")]
    pub last_change_date: String,
    #[serde(rename = "last-sync-revision", default, skip_serializing_if = "Option::is_none")]
    pub last_sync_revision: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NoteWire {
    /// Decode into a [`Note`]. Titles arrive XML-escaped and are unescaped here.
    pub fn into_note(self) -> Result<Note> {
        let guid: NoteGuid = self.guid.parse()?;
        let title = unescape(&self.title)
            .map_or_else(|_| self.title.clone(), std::borrow::Cow::into_owned);

        let mut note = Note::new(guid, title, DateTime::<Utc>::UNIX_EPOCH);
        note.set_change_date(&self.last_change_date)?;
        note.set_content_preserving_timestamp(self.note_content.unwrap_or_default());
        note.last_sync_revision = self.last_sync_revision.filter(|revision| *revision >= 0);
        for tag in &self.tags {
            note.add_tag(tag);
        }
        Ok(note)
    }
}

impl From<&Note> for NoteWire {
    fn from(note: &Note) -> Self {
        Self {
            guid: note.guid.to_string(),
            title: quick_xml::escape::escape(note.title.as_str()).into_owned(),
            note_content: Some(note.xml_content().to_string()),
            last_change_date: format_change_date(&note.last_change_date()),
            last_sync_revision: note.last_sync_revision,
            tags: note.all_tags(),
        }
    }
}

impl Note {
    /// Wire form with content and revision stripped, for metadata output
    pub fn to_wire_without_content(&self) -> NoteWire {
        NoteWire {
            note_content: None,
            last_sync_revision: None,
            ..NoteWire::from(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteLifecycle;
    use pretty_assertions::assert_eq;

    const PAYLOAD: &str = r#"{
        "guid": "5a6fd5a2-1d9c-4a9b-9e8a-0c4fd2b0c001",
        "title": "Fish &amp; Chips",
        "note-content": "<note-content version=\"0.1\">batter</note-content>",
        "last-change-date": "2010-01-23T12:07:38.7743020-05:00",
        "last-sync-revision": 7,
        "tags": ["system:notebook:food", "system:template"]
    }"#;

    #[test]
    fn test_decode_payload() {
        let wire: NoteWire = serde_json::from_str(PAYLOAD).unwrap();
        let note = wire.into_note().unwrap();

        assert_eq!(note.title, "Fish & Chips");
        assert_eq!(
            note.xml_content(),
            "<note-content version=\"0.1\">batter</note-content>"
        );
        assert_eq!(note.last_sync_revision, Some(7));
        assert_eq!(note.lifecycle, NoteLifecycle::Template);
        assert!(note.tags.contains("system:notebook:food"));
    }

    #[test]
    fn test_encode_escapes_title_and_keeps_sentinels() {
        let wire: NoteWire = serde_json::from_str(PAYLOAD).unwrap();
        let note = wire.into_note().unwrap();
        let encoded = NoteWire::from(&note);

        assert_eq!(encoded.title, "Fish &amp; Chips");
        assert_eq!(encoded.last_change_date, "2010-01-23T17:07:38.774Z");
        assert!(encoded.tags.contains(&"system:template".to_string()));
    }

    #[test]
    fn test_without_content_omits_body_and_revision() {
        let wire: NoteWire = serde_json::from_str(PAYLOAD).unwrap();
        let note = wire.into_note().unwrap();
        let json = serde_json::to_string(&note.to_wire_without_content()).unwrap();

        assert!(!json.contains("note-content"));
        assert!(!json.contains("last-sync-revision"));
    }

    #[test]
    fn test_decode_rejects_bad_date() {
        let wire = NoteWire {
            guid: NoteGuid::new().to_string(),
            title: "x".to_string(),
            note_content: None,
            last_change_date: "soon".to_string(),
            last_sync_revision: None,
            tags: Vec::new(),
        };
        assert!(wire.into_note().is_err());
    }
}
