//! Extension ↔ MIME type tables.
//!
//! The table is ordered: when several extensions share a MIME type, the first
//! one listed is the canonical extension for that type.

use std::path::Path;

use markitup_shared::normalize_extension;

const EXTENSION_TABLE: &[(&str, &str)] = &[
    // Text
    (".txt", "text/plain"),
    (".text", "text/plain"),
    (".log", "text/plain"),
    (".md", "text/markdown"),
    (".markdown", "text/markdown"),
    (".html", "text/html"),
    (".htm", "text/html"),
    (".xhtml", "application/xhtml+xml"),
    (".csv", "text/csv"),
    (".json", "application/json"),
    (".jsonl", "application/json"),
    (".ipynb", "application/x-ipynb+json"),
    (".xml", "application/xml"),
    (".rss", "application/rss+xml"),
    (".rtf", "application/rtf"),
    // Documents
    (".pdf", "application/pdf"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        ".pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    (
        ".xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (".doc", "application/msword"),
    (".ppt", "application/vnd.ms-powerpoint"),
    (".xls", "application/vnd.ms-excel"),
    (".epub", "application/epub+zip"),
    (".zip", "application/zip"),
    // Images
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".webp", "image/webp"),
    (".bmp", "image/bmp"),
    (".tif", "image/tiff"),
    (".tiff", "image/tiff"),
    // Audio / video
    (".mp3", "audio/mpeg"),
    (".wav", "audio/x-wav"),
    (".m4a", "audio/m4a"),
    (".flac", "audio/x-flac"),
    (".ogg", "audio/ogg"),
    (".opus", "audio/opus"),
    (".aac", "audio/aac"),
    (".mp4", "video/mp4"),
    (".mov", "video/quicktime"),
    (".webm", "video/webm"),
];

/// MIME type for an extension (with or without leading dot, any case).
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let ext = normalize_extension(extension)?;
    EXTENSION_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
}

/// Canonical extension (leading dot) for a MIME type. Parameters are ignored.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(_, m)| *m == essence)
        .map(|(e, _)| *e)
}

/// Normalized extension of the last path component, if it has one.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(normalize_extension)
}

/// `true` for MIME types whose payload is text and therefore has a charset.
pub fn is_textual_mime(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/")
        || essence.ends_with("+xml")
        || essence.ends_with("+json")
        || matches!(
            essence.as_str(),
            "application/json"
                | "application/xml"
                | "application/rtf"
                | "application/csv"
                | "application/javascript"
        )
}
