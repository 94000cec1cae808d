//! `META-INF/container.xml` → package document path.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::archive::Archive;
use crate::error::ParseError;
use crate::path;

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Find the OPF path named by the first `<rootfile full-path>`.
pub fn find_opf_path(archive: &Archive) -> Result<String, ParseError> {
    let container = archive
        .read_text(CONTAINER_PATH)
        .ok_or(ParseError::MissingContainer)?;

    let mut reader = XmlReader::from_str(&container);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"full-path" {
                        let raw = attr
                            .unescape_value()
                            .map(|v| v.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                        let opf_path = path::normalize(&path::decode(raw.trim()));
                        if opf_path.is_empty() {
                            return Err(ParseError::InvalidContainer(
                                "rootfile has an empty full-path".into(),
                            ));
                        }
                        return Ok(opf_path);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::InvalidContainer(format!(
                    "Failed to parse container.xml: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Err(ParseError::InvalidContainer(
        "No rootfile found in container.xml".into(),
    ))
}
