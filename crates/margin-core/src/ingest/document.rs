//! Parsing of on-disk `.note` documents
//!
//! Structured fields come from an XML pass. The body is cut out of the raw text
//! instead so that it is stored exactly as written.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{Note, NoteGuid};

/// Suffix of note documents
pub const NOTE_SUFFIX: &str = ".note";

static CONTENT_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<note-content\b[^>]*>.*</note-content>").expect("Invalid regex")
});

#[derive(Default)]
struct Fields {
    title: String,
    last_change_date: Option<String>,
    tags: Vec<String>,
}

/// Parse one note document. `path` supplies the guid through its file name.
pub fn parse_note_document(path: &Path, raw: &str) -> Result<Note> {
    let guid = guid_from_path(path)?;
    let fields = read_fields(path, raw)?;

    let raw_date = fields
        .last_change_date
        .ok_or_else(|| malformed(path, "missing last-change-date"))?;
    let mut note = Note::new(guid, fields.title.trim(), DateTime::<Utc>::UNIX_EPOCH);
    note.set_change_date(raw_date.trim())?;

    let content = match extract_content(raw) {
        Ok(fragment) => strip_title(fragment, &note.title),
        Err(error) => {
            tracing::warn!("{error}; storing '{}' with an empty body", note.title);
            String::new()
        }
    };
    note.set_content_preserving_timestamp(content);
    for tag in &fields.tags {
        note.add_tag(tag);
    }
    note.file_name = Some(path.display().to_string());
    Ok(note)
}

/// The raw `<note-content ...>...</note-content>` fragment, byte for byte
pub fn extract_content(raw: &str) -> Result<&str> {
    CONTENT_FRAGMENT
        .find(raw)
        .map(|found| found.as_str())
        .ok_or_else(|| Error::MissingContentFragment(raw.chars().take(60).collect()))
}

/// Remove one leading copy of the title, followed by a blank line, from the body.
pub fn strip_title(content: &str, title: &str) -> String {
    if title.is_empty() {
        return content.to_string();
    }
    let escaped = quick_xml::escape::partial_escape(title);
    let pattern = format!(
        r"^(<note-content[^>]*>)?\s*{}\n\n",
        regex::escape(&escaped)
    );
    match Regex::new(&pattern) {
        Ok(leading_title) => leading_title.replace(content, "$1").into_owned(),
        Err(error) => {
            tracing::warn!("Could not build title pattern for '{title}': {error}");
            content.to_string()
        }
    }
}

fn guid_from_path(path: &Path) -> Result<NoteGuid> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| malformed(path, "file name is not UTF-8"))?;
    let stem = name.strip_suffix(NOTE_SUFFIX).unwrap_or(name);
    stem.parse::<NoteGuid>()
        .map_err(|_| malformed(path, &format!("'{stem}' is not a note guid")))
}

fn read_fields(path: &Path, raw: &str) -> Result<Fields> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut fields = Fields::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|error| malformed(path, &error.to_string()))?;
        match event {
            Event::Start(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                if stack.is_empty() && name != "note" {
                    return Err(malformed(path, &format!("root element is <{name}>")));
                }
                stack.push(name);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let slot = match stack_tail(&stack) {
                    ["note", "title"] => Some(&mut fields.title),
                    ["note", "last-change-date"] => {
                        Some(fields.last_change_date.get_or_insert_with(String::new))
                    }
                    ["tags", "tag"] if stack.len() == 3 => {
                        fields.tags.push(String::new());
                        fields.tags.last_mut()
                    }
                    _ => None,
                };
                if let Some(slot) = slot {
                    let text = text
                        .unescape()
                        .map_err(|error| malformed(path, &error.to_string()))?;
                    slot.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

fn stack_tail(stack: &[String]) -> [&str; 2] {
    match stack {
        [.., parent, child] => [parent.as_str(), child.as_str()],
        [only] => ["", only.as_str()],
        [] => ["", ""],
    }
}

fn malformed(path: &Path, reason: &str) -> Error {
    Error::MalformedDocument {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::change_date::format_change_date;
    use crate::models::NoteLifecycle;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const GUID: &str = "8c6f0d1e-4b1a-4d8e-9d9e-2f1f3c0b7a55";

    fn path() -> PathBuf {
        PathBuf::from(format!("/notes/{GUID}.note"))
    }

    fn document(title: &str, content: &str, date: &str, tags: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<note version="0.3" xmlns:link="http://beatniksoftware.com/tomboy/link" xmlns="http://beatniksoftware.com/tomboy">
  <title>{title}</title>
  <text xml:space="preserve">{content}</text>
  <last-change-date>{date}</last-change-date>
  <tags>{tags}</tags>
</note>"#
        )
    }

    #[test]
    fn test_parse_full_document() {
        let raw = document(
            "Fish &amp; Chips",
            "<note-content version=\"0.1\">Fish &amp; Chips\n\nBuy <bold>vinegar</bold>\n</note-content>",
            "2010-01-23T12:07:38.7743020-05:00",
            "<tag>system:notebook:food</tag><tag>system:template</tag>",
        );

        let note = parse_note_document(&path(), &raw).unwrap();

        assert_eq!(note.guid.to_string(), GUID);
        assert_eq!(note.title, "Fish & Chips");
        assert_eq!(
            format_change_date(&note.last_change_date()),
            "2010-01-23T17:07:38.774Z"
        );
        assert_eq!(
            note.xml_content(),
            "<note-content version=\"0.1\">Buy <bold>vinegar</bold>\n</note-content>"
        );
        assert_eq!(note.lifecycle, NoteLifecycle::Template);
        assert!(note.tags.contains("system:notebook:food"));
        assert_eq!(note.file_name, Some(path().display().to_string()));
    }

    #[test]
    fn test_content_kept_verbatim_without_title_line() {
        let body = "<note-content version=\"0.1\"><list><list-item dir=\"ltr\">a</list-item></list>  spaced   </note-content>";
        let raw = document("Other", body, "2011-06-01T08:00:00.000Z", "");
        let note = parse_note_document(&path(), &raw).unwrap();
        assert_eq!(note.xml_content(), body);
    }

    #[test]
    fn test_missing_content_fragment_is_not_fatal() {
        let raw = document("Empty", "", "2011-06-01T08:00:00.000Z", "");
        let note = parse_note_document(&path(), &raw).unwrap();
        assert_eq!(note.xml_content(), "");
        assert_eq!(note.title, "Empty");
    }

    #[test]
    fn test_malformed_date_fails() {
        let raw = document("Bad", "<note-content>x</note-content>", "last tuesday", "");
        assert!(matches!(
            parse_note_document(&path(), &raw),
            Err(Error::MalformedTimestamp(_))
        ));
    }

    #[test]
    fn test_missing_date_fails() {
        let raw = "<note><title>No date</title></note>";
        assert!(matches!(
            parse_note_document(&path(), raw),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_bad_guid_in_file_name() {
        let raw = document("Bad", "", "2011-06-01T08:00:00.000Z", "");
        assert!(matches!(
            parse_note_document(Path::new("/notes/readme.note"), &raw),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_broken_xml_fails() {
        let raw = "<note><title>Unclosed</note>";
        assert!(matches!(
            parse_note_document(&path(), raw),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_strip_title_is_literal() {
        let content = "<note-content>a.b (c)\n\nrest</note-content>";
        assert_eq!(strip_title(content, "a.b (c)"), "<note-content>rest</note-content>");
        // '.' must not act as a wildcard
        let content = "<note-content>aXb (c)\n\nrest</note-content>";
        assert_eq!(strip_title(content, "a.b (c)"), content);
    }

    #[test]
    fn test_strip_title_only_once() {
        let content = "<note-content>Todo\n\nTodo\n\nitems</note-content>";
        assert_eq!(
            strip_title(content, "Todo"),
            "<note-content>Todo\n\nitems</note-content>"
        );
    }

    #[test]
    fn test_strip_title_requires_blank_line() {
        let content = "<note-content>Todo\nitems</note-content>";
        assert_eq!(strip_title(content, "Todo"), content);
    }
}
