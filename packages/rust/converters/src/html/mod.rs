//! HTML → Markdown converter.
//!
//! 1. Pick the content container (`main`, `article`, `[role=main]`, `body`)
//! 2. Swap every table for a placeholder paragraph and render it separately
//! 3. Convert the rest with `htmd`
//! 4. Run the cleanup pipeline and splice the tables back in

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use markitup_probe::{extension_of, mime_for_extension};
use markitup_shared::{
    ConversionError, ConversionResult, ConverterConfig, DocumentConverter, ExtractedTable,
    MediaReference, ReadSeek, StreamInfo, read_all,
};

use crate::text::decode_text;
use cleanup::CleanupContext;

const ACCEPTED_MIME_PREFIXES: &[&str] = &["text/html", "application/xhtml"];
const ACCEPTED_EXTENSIONS: &[&str] = &[".html", ".htm", ".xhtml"];

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "iframe", "noscript", "svg", "head", "template",
];

/// Containers tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role=\"main\"]"];

/// Delimits table placeholders. Private-use, and stripped from the input
/// before parsing, so no document text can collide with a placeholder.
const PLACEHOLDER_MARK: char = '\u{E000}';

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("th, td"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img[src]"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("head > title, title"));
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Converts HTML documents.
pub struct HtmlConverter {
    keep_data_uris: bool,
}

impl HtmlConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            keep_data_uris: config.keep_data_uris,
        }
    }
}

impl DocumentConverter for HtmlConverter {
    fn name(&self) -> &str {
        "html"
    }

    fn accepts(&self, _input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        info.mime_starts_with(ACCEPTED_MIME_PREFIXES) || info.extension_in(ACCEPTED_EXTENSIONS)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;
        let html = decode_text(&bytes, info.charset.as_deref())
            .map_err(|detail| ConversionError::decode(self.name(), detail))?;
        let base_url = info.url.as_deref().and_then(|u| Url::parse(u).ok());
        html_to_markdown(&html, base_url.as_ref(), self.keep_data_uris)
            .map_err(|detail| ConversionError::malformed(self.name(), detail))
    }
}

/// Convert an HTML document to a [`ConversionResult`].
#[instrument(skip_all, fields(len = html.len()))]
pub fn html_to_markdown(
    html: &str,
    base_url: Option<&Url>,
    keep_data_uris: bool,
) -> Result<ConversionResult, String> {
    let html = html.replace(PLACEHOLDER_MARK, "");
    let document = Html::parse_document(&html);
    let head_title = document
        .select(&TITLE)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let content = Html::parse_fragment(&content_html(&document, &html));
    let (with_placeholders, tables) = extract_tables(&content);
    let media = collect_media(&content);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();
    let raw = converter
        .convert(&with_placeholders)
        .map_err(|e| format!("htmd conversion failed: {e}"))?;
    debug!(raw_len = raw.len(), tables = tables.len(), "htmd conversion complete");

    let ctx = CleanupContext {
        base_url,
        keep_data_uris,
    };
    let mut markdown = cleanup::run_pipeline(&raw, &ctx);

    for (index, table) in tables.iter().enumerate() {
        markdown = markdown.replacen(&placeholder(index), &table.to_markdown(), 1);
    }

    let title = head_title.or_else(|| first_h1(&markdown));
    let mut result = ConversionResult::new(markdown);
    if let Some(title) = title {
        result = result.with_title(title);
    }
    for table in tables {
        result = result.with_table(table);
    }
    for reference in media {
        result = result.with_media(reference);
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Content selection
// ---------------------------------------------------------------------------

fn content_html(document: &Html, raw: &str) -> String {
    for css in CONTENT_SELECTORS {
        let sel = selector(css);
        if let Some(el) = document.select(&sel).next() {
            return el.inner_html();
        }
    }
    match document.select(&BODY).next() {
        Some(body) => body.inner_html(),
        None => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Serialize `fragment` with each outermost table replaced by a numbered
/// placeholder paragraph.
///
/// Replacement happens on the re-serialized fragment, so the table's own
/// serialization always matches.
fn extract_tables(fragment: &Html) -> (String, Vec<ExtractedTable>) {
    let mut serialized = fragment.root_element().inner_html();
    let mut tables = Vec::new();

    for table in fragment.select(&TABLE).filter(|t| !inside_table(t)) {
        let extracted = table_rows(&table);
        if extracted.rows.is_empty() {
            continue;
        }
        let marker = format!("<p>{}</p>", placeholder(tables.len()));
        serialized = serialized.replacen(&table.html(), &marker, 1);
        tables.push(extracted);
    }
    (serialized, tables)
}

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_MARK}table{index}{PLACEHOLDER_MARK}")
}

fn inside_table(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "table")
}

fn table_rows(table: &ElementRef<'_>) -> ExtractedTable {
    let rows = table
        .select(&ROW)
        .filter(|row| {
            // rows of nested tables belong to those tables
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .map(|row| {
            row.select(&CELL)
                .map(|cell| collapse_whitespace(&cell.text().collect::<Vec<_>>().join(" ")))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();
    ExtractedTable { rows }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collect_media(fragment: &Html) -> Vec<MediaReference> {
    fragment
        .select(&IMG)
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() {
                return None;
            }
            Some(MediaReference {
                mime_type: media_mime(src),
                alt_text: img.value().attr("alt").unwrap_or_default().trim().to_string(),
                source: src.to_string(),
            })
        })
        .collect()
}

fn media_mime(src: &str) -> String {
    if let Some(rest) = src.strip_prefix("data:") {
        let end = rest.find([';', ',']).unwrap_or(rest.len());
        return rest[..end].to_string();
    }
    let path = src.split(['?', '#']).next().unwrap_or(src);
    extension_of(path)
        .and_then(|ext| mime_for_extension(&ext))
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn first_h1(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));
    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
