//! Core domain types: stream hints, priority tiers, and conversion results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StreamInfo
// ---------------------------------------------------------------------------

/// Advisory format hints attached to one conversion attempt.
///
/// Every field is optional and none of them is trusted: a `StreamInfo` is a
/// guess, produced either by the caller or by probing the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// MIME type, e.g. `text/html`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// File extension, lowercase with a leading dot (e.g. `.docx`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Character set for text content, e.g. `UTF-8`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Declared file name (no directory component required).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Local file path the stream was opened from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Source URL, used for resolving relative links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl StreamInfo {
    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the extension. Accepts `docx`, `.docx` or `.DOCX`.
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = normalize_extension(extension.as_ref());
        self
    }

    /// Set the charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Set the declared file name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the local path.
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Set the source URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Return a copy where every field set on `other` overrides ours.
    pub fn merged_with(&self, other: &StreamInfo) -> StreamInfo {
        StreamInfo {
            mime_type: other.mime_type.clone().or_else(|| self.mime_type.clone()),
            extension: other.extension.clone().or_else(|| self.extension.clone()),
            charset: other.charset.clone().or_else(|| self.charset.clone()),
            filename: other.filename.clone().or_else(|| self.filename.clone()),
            local_path: other.local_path.clone().or_else(|| self.local_path.clone()),
            url: other.url.clone().or_else(|| self.url.clone()),
        }
    }

    /// `true` when no hint at all is present.
    pub fn is_empty(&self) -> bool {
        *self == StreamInfo::default()
    }

    /// The (MIME type, extension) pair guesses are deduplicated on.
    pub fn format_key(&self) -> (Option<&str>, Option<&str>) {
        (self.mime_type.as_deref(), self.extension.as_deref())
    }

    /// Lowercased MIME type without parameters (`text/html; charset=x` → `text/html`).
    pub fn essence(&self) -> Option<String> {
        self.mime_type
            .as_deref()
            .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
    }

    /// `true` if the MIME essence starts with any of `prefixes`.
    pub fn mime_starts_with(&self, prefixes: &[&str]) -> bool {
        self.essence()
            .is_some_and(|m| prefixes.iter().any(|p| m.starts_with(p)))
    }

    /// `true` if the extension is one of `extensions` (given with leading dots).
    pub fn extension_in(&self, extensions: &[&str]) -> bool {
        self.extension
            .as_deref()
            .is_some_and(|e| extensions.contains(&e))
    }
}

/// Normalize an extension to lowercase with a single leading dot.
///
/// Returns `None` for empty input.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_ascii_lowercase()))
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Trial order of a converter within a single guess. Lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Converters keyed on a specific binary signature or format.
    pub const SPECIFIC_FILE_FORMAT: Priority = Priority(0);
    /// Converters handling broad families such as `text/*`.
    pub const GENERIC_FILE_FORMAT: Priority = Priority(10);
    /// Last-resort converters, tried only after everything else declined.
    pub const CATCH_ALL: Priority = Priority(20);

    /// An explicit priority outside the predefined tiers.
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Priority::SPECIFIC_FILE_FORMAT => write!(f, "specific"),
            Priority::GENERIC_FILE_FORMAT => write!(f, "generic"),
            Priority::CATCH_ALL => write!(f, "catch-all"),
            Priority(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionResult
// ---------------------------------------------------------------------------

/// A table pulled out of the source document, row-major, first row = header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    /// Cell text, row by row.
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Render as a pipe table. Short rows are padded; an empty table renders
    /// as an empty string.
    pub fn to_markdown(&self) -> String {
        let col_count = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if col_count == 0 {
            return String::new();
        }

        let render_row = |row: &[String]| {
            let cells: Vec<String> = (0..col_count)
                .map(|i| {
                    row.get(i)
                        .map(|c| c.replace('|', "\\|").replace('\n', " "))
                        .unwrap_or_default()
                })
                .collect();
            format!("| {} |", cells.join(" | "))
        };

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(render_row(&self.rows[0]));
        lines.push(format!("|{}|", vec![" --- "; col_count].join("|")));
        for row in &self.rows[1..] {
            lines.push(render_row(row));
        }
        lines.join("\n")
    }
}

/// Reference to an image or other media embedded in the markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// MIME type of the referenced media.
    pub mime_type: String,
    /// Alt text as written into the markdown.
    pub alt_text: String,
    /// Where the media lives: a data URI, URL, or archive-relative path.
    pub source: String,
}

/// Raw media carried alongside the markdown (audio inputs, for example).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// MIME type of `data`.
    pub mime_type: String,
    /// Raw bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Structured metadata produced next to the markdown text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document title, if one could be determined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tables found in the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<ExtractedTable>,
    /// Embedded media references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaReference>,
}

/// Output of a successful conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Markdown text. Always present, possibly empty.
    pub markdown: String,
    /// Title, tables and media references.
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Raw media for inputs that have no textual rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<MediaAttachment>,
    /// The guess the winning converter was run under.
    #[serde(default)]
    pub stream_info: StreamInfo,
}

impl ConversionResult {
    /// A result holding only markdown text.
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_table(mut self, table: ExtractedTable) -> Self {
        self.metadata.tables.push(table);
        self
    }

    pub fn with_media(mut self, media: MediaReference) -> Self {
        self.metadata.media.push(media);
        self
    }

    pub fn with_attachment(mut self, attachment: MediaAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_stream_info(mut self, info: StreamInfo) -> Self {
        self.stream_info = info;
        self
    }

    /// Document title, if any.
    pub fn title(&self) -> Option<&str> {
        self.metadata.title.as_deref()
    }
}

impl std::fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_normalized() {
        let info = StreamInfo::default().with_extension("DOCX");
        assert_eq!(info.extension.as_deref(), Some(".docx"));
        let info = StreamInfo::default().with_extension(".Md");
        assert_eq!(info.extension.as_deref(), Some(".md"));
        assert_eq!(normalize_extension("  "), None);
    }

    #[test]
    fn merged_with_prefers_other() {
        let base = StreamInfo::default()
            .with_filename("a.txt")
            .with_mime_type("text/plain");
        let over = StreamInfo::default().with_mime_type("text/html");
        let merged = base.merged_with(&over);
        assert_eq!(merged.mime_type.as_deref(), Some("text/html"));
        assert_eq!(merged.filename.as_deref(), Some("a.txt"));
    }

    #[test]
    fn essence_strips_parameters() {
        let info = StreamInfo::default().with_mime_type("Text/HTML; charset=utf-8");
        assert_eq!(info.essence().as_deref(), Some("text/html"));
        assert!(info.mime_starts_with(&["text/"]));
    }

    #[test]
    fn priority_tiers_are_ordered() {
        assert!(Priority::SPECIFIC_FILE_FORMAT < Priority::GENERIC_FILE_FORMAT);
        assert!(Priority::GENERIC_FILE_FORMAT < Priority::CATCH_ALL);
        assert_eq!(Priority::CATCH_ALL.to_string(), "catch-all");
        assert_eq!(Priority::new(-5).to_string(), "-5");
    }

    #[test]
    fn table_renders_with_padding() {
        let table = ExtractedTable {
            rows: vec![
                vec!["Name".into(), "Value".into()],
                vec!["a|b".into()],
            ],
        };
        assert_eq!(
            table.to_markdown(),
            "| Name | Value |\n| --- | --- |\n| a\\|b |  |"
        );
        assert_eq!(ExtractedTable::default().to_markdown(), "");
    }

    #[test]
    fn result_display_is_markdown() {
        let result = ConversionResult::new("# Hi").with_title("Hi");
        assert_eq!(result.to_string(), "# Hi");
        assert_eq!(result.title(), Some("Hi"));
    }
}
