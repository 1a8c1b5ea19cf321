//! Conversions between plain text and `<note-content>` fragments, and raw
//! edits of the markup inside them

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Markup version written for new fragments
pub const CONTENT_VERSION: &str = "0.1";

const CLOSING_TAG: &str = "</note-content>";

/// Wrap plain text into a `<note-content>` fragment.
pub fn to_note_content(plain: &str) -> String {
    format!(
        "<note-content version=\"{CONTENT_VERSION}\">{}</note-content>",
        quick_xml::escape::partial_escape(plain)
    )
}

/// Text of a fragment with the markup removed.
///
/// Malformed fragments fall back to the text read up to the error.
pub fn to_plain_text(xml_content: &str) -> String {
    let mut reader = Reader::from_str(xml_content);
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(chunk)) => match chunk.unescape() {
                Ok(unescaped) => text.push_str(&unescaped),
                Err(_) => text.push_str(&String::from_utf8_lossy(&chunk)),
            },
            Ok(Event::CData(chunk)) => text.push_str(&String::from_utf8_lossy(&chunk)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                tracing::debug!("Stopped reading note content: {error}");
                break;
            }
        }
    }
    text
}

/// The markup between the `<note-content>` tags, or the whole string when it
/// carries no wrapper.
pub fn inner_markup(xml_content: &str) -> &str {
    split_fragment(xml_content).map_or(xml_content, |(_, inner)| inner)
}

/// Replace the markup inside a fragment, keeping the fragment's own opening tag.
///
/// `inner` is stored as written, so it has to be well-formed on its own.
pub fn replace_inner_markup(xml_content: &str, inner: &str) -> Result<String> {
    check_well_formed(inner)?;
    let opening = split_fragment(xml_content).map_or_else(
        || format!("<note-content version=\"{CONTENT_VERSION}\">"),
        |(opening, _)| opening.to_string(),
    );
    Ok(format!("{opening}{inner}{CLOSING_TAG}"))
}

fn split_fragment(xml_content: &str) -> Option<(&str, &str)> {
    let fragment = xml_content.trim_end();
    if !fragment.starts_with("<note-content") {
        return None;
    }
    let opening_end = fragment.find('>')? + 1;
    let inner = fragment.get(opening_end..)?.strip_suffix(CLOSING_TAG)?;
    Some((&fragment[..opening_end], inner))
}

fn check_well_formed(markup: &str) -> Result<()> {
    let mut reader = Reader::from_str(markup);
    let mut open = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                open.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
            }
            Event::End(_) => {
                if open.pop().is_none() {
                    return Err(Error::InvalidInput(
                        "closing tag without a matching opening tag".into(),
                    ));
                }
            }
            Event::Text(text) => {
                text.unescape()
                    .map_err(|error| Error::InvalidInput(error.to_string()))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match open.pop() {
        Some(name) => Err(Error::InvalidInput(format!("<{name}> is never closed"))),
        None => Ok(()),
    }
}
