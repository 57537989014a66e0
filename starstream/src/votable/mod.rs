//! VOTable envelope handling.
//!
//! A TAP query answered with `FORMAT=votable` returns an XML document whose
//! row data sits base64-encoded inside a `STREAM` element, usually at
//! `VOTABLE/RESOURCE/TABLE/DATA/BINARY2/STREAM`. The element is matched by
//! local name so any namespace prefix (or none) is accepted.

pub mod binary;

pub use binary::{decode, NonFinitePolicy, RawRecord, RecordDecoder, RECORD_SIZE};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::EnvelopeError;

/// Namespace URI of VOTable 1.3 documents.
pub const VOTABLE_NAMESPACE: &str = "http://www.ivoa.net/xml/VOTable/v1.3";

const STREAM_ELEMENT: &[u8] = b"STREAM";

/// Extract and base64-decode the first `STREAM` element of a VOTable document.
///
/// Returns `Ok(None)` when the document is well-formed but carries no
/// `STREAM`, which is how the archive answers an empty region. Whitespace
/// inside the element is stripped before decoding.
pub fn extract_stream(xml: &str) -> Result<Option<Vec<u8>>, EnvelopeError> {
    let Some(text) = find_stream_text(xml)? else {
        return Ok(None);
    };

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(Some(STANDARD.decode(compact.as_bytes())?))
}

/// Reject duplicate, unquoted or badly escaped attributes.
fn check_attributes(element: &BytesStart) -> Result<(), EnvelopeError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| EnvelopeError::Parse(e.to_string()))?;
        attribute
            .unescape_value()
            .map_err(|e| EnvelopeError::Parse(e.to_string()))?;
    }
    Ok(())
}

/// Walk the whole document, validating structure, and collect the text of
/// the first `STREAM` element.
fn find_stream_text(xml: &str) -> Result<Option<String>, EnvelopeError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut in_stream = false;
    let mut stream: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            EnvelopeError::Parse(format!("at byte {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(e) => {
                if depth == 0 && saw_root {
                    return Err(EnvelopeError::Parse("multiple root elements".to_string()));
                }
                check_attributes(&e)?;
                saw_root = true;
                depth += 1;
                if stream.is_none() && e.local_name().as_ref() == STREAM_ELEMENT {
                    in_stream = true;
                    stream = Some(String::new());
                }
            }
            Event::Empty(e) => {
                if depth == 0 && saw_root {
                    return Err(EnvelopeError::Parse("multiple root elements".to_string()));
                }
                check_attributes(&e)?;
                saw_root = true;
                if stream.is_none() && e.local_name().as_ref() == STREAM_ELEMENT {
                    stream = Some(String::new());
                }
            }
            Event::End(e) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    EnvelopeError::Parse("closing tag without matching opening tag".to_string())
                })?;
                if in_stream && e.local_name().as_ref() == STREAM_ELEMENT {
                    in_stream = false;
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| EnvelopeError::Parse(e.to_string()))?;
                if in_stream {
                    if let Some(buf) = stream.as_mut() {
                        buf.push_str(&text);
                    }
                } else if depth == 0 && !text.chars().all(char::is_whitespace) {
                    return Err(EnvelopeError::Parse(
                        "text content outside the root element".to_string(),
                    ));
                }
            }
            Event::CData(c) => {
                if in_stream {
                    if let Some(buf) = stream.as_mut() {
                        buf.push_str(&String::from_utf8_lossy(&c));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(EnvelopeError::Parse(format!(
            "unexpected end of document with {depth} unclosed element(s)"
        )));
    }
    if !saw_root {
        return Err(EnvelopeError::Parse("no root element".to_string()));
    }

    Ok(stream)
}
