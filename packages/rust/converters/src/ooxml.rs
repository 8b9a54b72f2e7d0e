//! Zip package helpers shared by the Office Open XML converters.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::warn;
use zip::ZipArchive;

use markitup_shared::{ConversionError, ReadSeek, read_all, read_prefix};

pub(crate) const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub(crate) type Package = ZipArchive<Cursor<Vec<u8>>>;

/// True when the stream starts with a local file header.
pub(crate) fn has_zip_magic(input: &mut dyn ReadSeek) -> bool {
    read_prefix(input, ZIP_MAGIC.len()).is_ok_and(|head| head == ZIP_MAGIC)
}

/// Buffers the whole stream and opens it as a zip archive.
pub(crate) fn open_package(converter: &str, input: &mut dyn ReadSeek) -> Result<Package, ConversionError> {
    let bytes = read_all(input).map_err(|e| ConversionError::io(converter, e))?;
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConversionError::malformed(converter, format!("not a zip archive: {e}")))
}

/// A member as UTF-8 text; `None` when the archive has no such entry.
pub(crate) fn read_member(archive: &mut Package, name: &str) -> Result<Option<String>, String> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(format!("{name}: {e}")),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| format!("{name}: {e}"))?;
    Ok(Some(xml))
}

/// Title from `docProps/core.xml`; an unreadable part is logged and skipped.
pub(crate) fn package_title(archive: &mut Package) -> Option<String> {
    match read_member(archive, "docProps/core.xml") {
        Ok(Some(xml)) => core_title(&xml),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "unreadable docProps/core.xml, ignoring");
            None
        }
    }
}

/// `<dc:title>` from the core properties part.
pub(crate) fn core_title(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut in_title = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"title" => in_title = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"title" => in_title = false,
            Ok(Event::Text(t)) if in_title => {
                let title = t.unescape().ok()?.trim().to_string();
                return (!title.is_empty()).then_some(title);
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// A relationship part (`*.rels`) as `(Id, Type, Target)` triples.
pub(crate) fn relationships(xml: &str) -> Vec<(String, String, String)> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = String::new();
                let mut kind = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = value,
                        b"Type" => kind = value,
                        b"Target" => target = value,
                        _ => {}
                    }
                }
                rels.push((id, kind, target));
            }
            Ok(Event::Eof) | Err(_) => return rels,
            _ => {}
        }
    }
}

/// Resolves a relationship target against the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            other => parts.push(other),
        }
    }
    parts.join("/")
}
