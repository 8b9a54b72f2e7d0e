//! Content-based format sniffing.
//!
//! Uses the `infer` crate for magic-byte detection, with additional
//! heuristics for zip-packaged Office documents and for text formats that
//! carry no binary signature.

use markitup_shared::StreamInfo;

use crate::charset::looks_like_text;
use crate::mime::extension_for_mime;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Derive a format guess from the leading bytes alone.
///
/// Returns `None` for empty input and for binary data with no known signature.
pub fn sniff(head: &[u8]) -> Option<StreamInfo> {
    if head.is_empty() {
        return None;
    }

    if let Some(kind) = infer::get(head) {
        let mime = match kind.mime_type() {
            "application/zip" => detect_office_package(head).unwrap_or("application/zip"),
            other => other,
        };
        let extension = extension_for_mime(mime)
            .map(str::to_string)
            .unwrap_or_else(|| format!(".{}", kind.extension()));
        return Some(StreamInfo::default().with_mime_type(mime).with_extension(extension));
    }

    if looks_like_text(head) {
        let mime = sniff_text(head);
        let info = StreamInfo::default().with_mime_type(mime);
        return Some(match extension_for_mime(mime) {
            Some(ext) => info.with_extension(ext),
            None => info,
        });
    }

    None
}

/// Zip archives carry their member names in plain text in the local headers,
/// so the first entries tell an Office package from a generic archive.
fn detect_office_package(head: &[u8]) -> Option<&'static str> {
    if contains(head, b"word/") {
        Some(DOCX_MIME)
    } else if contains(head, b"ppt/") {
        Some(PPTX_MIME)
    } else if contains(head, b"xl/") {
        Some(XLSX_MIME)
    } else {
        None
    }
}

/// Classify signature-less text. Falls back to `text/plain`.
fn sniff_text(head: &[u8]) -> &'static str {
    let window = &head[..head.len().min(1024)];
    let text = String::from_utf8_lossy(window);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("{\\rtf") {
        return "application/rtf";
    }
    if opens_as_html(&lower) {
        return "text/html";
    }
    if lower.starts_with("<?xml") {
        return "application/xml";
    }
    if looks_like_json(head) {
        return "application/json";
    }
    "text/plain"
}

/// HTML only when the document itself opens with markup. Tags quoted later
/// in prose (a Markdown note about `<body>`) do not count.
fn opens_as_html(lower: &str) -> bool {
    const OPENERS: &[&str] = &["<!doctype html", "<html", "<head", "<body"];

    let mut rest = lower.trim_start();
    while let Some(comment) = rest.strip_prefix("<!--") {
        match comment.find("-->") {
            Some(end) => rest = comment[end + 3..].trim_start(),
            None => return false,
        }
    }
    OPENERS.iter().any(|opener| {
        rest.strip_prefix(opener)
            .is_some_and(|after| after.is_empty() || after.starts_with(['>', ' ', '\t', '\n', '\r', '/']))
    })
}

fn looks_like_json(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim();
    let (Some(first), Some(last)) = (trimmed.chars().next(), trimmed.chars().last()) else {
        return false;
    };
    matches!((first, last), ('{', '}') | ('[', ']')) && trimmed.contains('"')
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
