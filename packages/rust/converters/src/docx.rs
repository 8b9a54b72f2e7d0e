//! Word (`.docx`) → Markdown.
//!
//! Walks `word/document.xml` with a streaming `quick-xml` reader and emits
//! headings, list items, paragraphs and tables. The title comes from
//! `docProps/core.xml` when present, else the first heading.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use markitup_shared::{
    ConversionError, ConversionResult, DocumentConverter, ExtractedTable, ReadSeek, StreamInfo,
};

use crate::ooxml::{has_zip_magic, open_package, package_title, read_member};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub struct DocxConverter;

impl DocumentConverter for DocxConverter {
    fn name(&self) -> &str {
        "docx"
    }

    /// Needs a docx label and a zip signature; a text file named
    /// `report.docx` is declined here rather than failing in `convert`.
    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        let labelled = info.mime_starts_with(&[DOCX_MIME]) || info.extension_in(&[".docx"]);
        labelled && has_zip_magic(input)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let mut archive = open_package(self.name(), input)?;
        let body = read_member(&mut archive, "word/document.xml")
            .map_err(|e| ConversionError::malformed(self.name(), e))?
            .ok_or_else(|| ConversionError::malformed(self.name(), "missing word/document.xml"))?;
        let core_title = package_title(&mut archive);

        let blocks = parse_body(&body).map_err(|e| ConversionError::malformed(self.name(), e))?;
        debug!(blocks = blocks.len(), "docx body parsed");
        Ok(render(blocks, core_title))
    }
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Block {
    Heading { level: usize, text: String },
    ListItem { depth: usize, text: String },
    Paragraph(String),
    Table(ExtractedTable),
}

#[derive(Default)]
struct ParagraphState {
    style: Option<String>,
    list_depth: Option<usize>,
    text: String,
}

impl ParagraphState {
    fn into_block(self) -> Option<Block> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        if let Some(level) = self.style.as_deref().and_then(heading_level) {
            return Some(Block::Heading { level, text });
        }
        match self.list_depth {
            Some(depth) => Some(Block::ListItem { depth, text }),
            None => Some(Block::Paragraph(text)),
        }
    }
}

/// `Title` and `Heading1`..`Heading6`, ignoring case and spaces.
fn heading_level(style: &str) -> Option<usize> {
    let style = style.to_ascii_lowercase().replace(' ', "");
    if style == "title" {
        return Some(1);
    }
    style
        .strip_prefix("heading")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=6).contains(n))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_body(xml: &str) -> Result<Vec<Block>, String> {
    let mut reader = Reader::from_str(xml);
    let mut blocks = Vec::new();
    let mut paragraph: Option<ParagraphState> = None;
    // rows → cells; one entry per open (possibly nested) table
    let mut tables: Vec<Vec<Vec<String>>> = Vec::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => paragraph = Some(ParagraphState::default()),
                b"t" => in_text = true,
                b"tbl" => tables.push(Vec::new()),
                b"tr" => {
                    if let Some(rows) = tables.last_mut() {
                        rows.push(Vec::new());
                    }
                }
                b"tc" => {
                    if let Some(row) = tables.last_mut().and_then(|rows| rows.last_mut()) {
                        row.push(String::new());
                    }
                }
                b"numPr" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.list_depth.get_or_insert(0);
                    }
                }
                other => apply_empty(other, &e, paragraph.as_mut()),
            },
            Event::Empty(e) => apply_empty(e.local_name().as_ref(), &e, paragraph.as_mut()),
            Event::Text(t) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    p.text.push_str(&text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let Some(block) = paragraph.take().and_then(ParagraphState::into_block) else {
                        continue;
                    };
                    match tables.last_mut().and_then(|rows| rows.last_mut()).and_then(|row| row.last_mut()) {
                        Some(cell) => append_cell_text(cell, &block_text(&block)),
                        None => blocks.push(block),
                    }
                }
                b"tbl" => {
                    let Some(rows) = tables.pop() else { continue };
                    let table = ExtractedTable { rows };
                    match tables.last_mut().and_then(|rows| rows.last_mut()).and_then(|row| row.last_mut()) {
                        // nested tables are flattened into the enclosing cell
                        Some(cell) => {
                            let text = table.rows.iter().flatten().map(String::as_str).collect::<Vec<_>>().join(" ");
                            append_cell_text(cell, &text);
                        }
                        None if !table.rows.is_empty() => blocks.push(Block::Table(table)),
                        None => {}
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(blocks)
}

/// Elements that matter whether written as `<x/>` or `<x>...</x>`.
fn apply_empty(name: &[u8], e: &BytesStart<'_>, paragraph: Option<&mut ParagraphState>) {
    let Some(p) = paragraph else { return };
    match name {
        b"pStyle" => p.style = val_attribute(e),
        b"ilvl" => {
            p.list_depth = Some(val_attribute(e).and_then(|v| v.parse().ok()).unwrap_or(0));
        }
        b"tab" => p.text.push('\t'),
        b"br" | b"cr" => p.text.push('\n'),
        _ => {}
    }
}

fn val_attribute(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn block_text(block: &Block) -> String {
    match block {
        Block::Heading { text, .. } | Block::ListItem { text, .. } | Block::Paragraph(text) => {
            text.clone()
        }
        Block::Table(table) => table.to_markdown(),
    }
}

fn append_cell_text(cell: &mut String, text: &str) {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !cell.is_empty() && !text.is_empty() {
        cell.push(' ');
    }
    cell.push_str(&text);
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(blocks: Vec<Block>, core_title: Option<String>) -> ConversionResult {
    let mut out = String::new();
    let mut first_heading = None;
    let mut tables = Vec::new();
    let mut previous_was_list = false;

    for block in blocks {
        let is_list = matches!(block, Block::ListItem { .. });
        if !out.is_empty() {
            out.push_str(if is_list && previous_was_list { "\n" } else { "\n\n" });
        }
        previous_was_list = is_list;

        match block {
            Block::Heading { level, text } => {
                out.push_str(&format!("{} {text}", "#".repeat(level)));
                first_heading.get_or_insert(text);
            }
            Block::ListItem { depth, text } => {
                out.push_str(&format!("{}- {text}", "  ".repeat(depth)));
            }
            Block::Paragraph(text) => out.push_str(&text),
            Block::Table(table) => {
                out.push_str(&table.to_markdown());
                tables.push(table);
            }
        }
    }

    let mut result = ConversionResult::new(out);
    if let Some(title) = core_title.or(first_heading) {
        result = result.with_title(title);
    }
    for table in tables {
        result = result.with_table(table);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const W_NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn stored() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    }

    fn docx(body: &str, core: Option<&str>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", stored()).unwrap();
        write!(zip, r#"<?xml version="1.0"?><w:document {W_NS}><w:body>{body}</w:body></w:document>"#).unwrap();
        if let Some(title) = core {
            zip.start_file("docProps/core.xml", stored()).unwrap();
            write!(
                zip,
                r#"<cp:coreProperties xmlns:cp="x" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{title}</dc:title></cp:coreProperties>"#
            )
            .unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn para(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
            .unwrap_or_default();
        format!(r#"<w:p>{ppr}<w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    fn convert(bytes: Vec<u8>) -> Result<ConversionResult, ConversionError> {
        let info = StreamInfo::default().with_extension(".docx");
        DocxConverter.convert(&mut Cursor::new(bytes), &info)
    }

    #[test]
    fn headings_and_paragraphs() {
        let body = format!(
            "{}{}{}",
            para(Some("Heading1"), "Overview"),
            para(None, "First &amp; foremost."),
            para(Some("Heading2"), "Details")
        );
        let result = convert(docx(&body, None)).unwrap();
        assert_eq!(result.markdown, "# Overview\n\nFirst & foremost.\n\n## Details");
        assert_eq!(result.title(), Some("Overview"));
    }

    #[test]
    fn core_title_wins() {
        let result = convert(docx(&para(Some("Heading1"), "Body heading"), Some("Annual Report"))).unwrap();
        assert_eq!(result.title(), Some("Annual Report"));
    }

    #[test]
    fn list_items_are_grouped() {
        let item = |lvl: u8, text: &str| {
            format!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{lvl}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
            )
        };
        let body = format!("{}{}{}{}", para(None, "Steps:"), item(0, "one"), item(1, "nested"), item(0, "two"));
        let result = convert(docx(&body, None)).unwrap();
        assert_eq!(result.markdown, "Steps:\n\n- one\n  - nested\n- two");
    }

    #[test]
    fn tables_render_and_are_recorded() {
        let cell = |t: &str| format!("<w:tc>{}</w:tc>", para(None, t));
        let row = |a: &str, b: &str| format!("<w:tr>{}{}</w:tr>", cell(a), cell(b));
        let body = format!("<w:tbl>{}{}</w:tbl>{}", row("Name", "Qty"), row("Apple", "3"), para(None, "after"));
        let result = convert(docx(&body, None)).unwrap();
        assert_eq!(
            result.markdown,
            "| Name | Qty |\n| --- | --- |\n| Apple | 3 |\n\nafter"
        );
        assert_eq!(result.metadata.tables.len(), 1);
    }

    #[test]
    fn tabs_and_breaks_are_kept() {
        let body = r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>"#;
        let result = convert(docx(body, None)).unwrap();
        assert_eq!(result.markdown, "a\tb\nc");
    }

    #[test]
    fn accepts_requires_zip_signature() {
        let info = StreamInfo::default().with_filename("report.docx").with_extension(".docx");
        let mut text = Cursor::new(b"Quarterly numbers look fine.".to_vec());
        assert!(!DocxConverter.accepts(&mut text, &info));
        let mut real = Cursor::new(docx(&para(None, "x"), None));
        assert!(DocxConverter.accepts(&mut real, &info));
        assert!(!DocxConverter.accepts(&mut real, &StreamInfo::default()));
    }

    #[test]
    fn missing_document_part_is_malformed() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.txt", stored()).unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let err = convert(bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = convert(b"PK\x03\x04 definitely not a zip".to_vec()).unwrap_err();
        assert_eq!(err.converter, "docx");
    }
}
