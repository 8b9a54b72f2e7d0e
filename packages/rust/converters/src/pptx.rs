//! PowerPoint (`.pptx`) → Markdown.
//!
//! Slides are read in order from `ppt/slides/slideN.xml`. Each slide starts
//! with a `<!-- Slide number: N -->` marker; title placeholders become
//! headings, other shapes become paragraphs, `a:tbl` frames become tables,
//! pictures become image references carrying their alt text, and speaker
//! notes follow under `### Notes:`.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use markitup_shared::{
    ConversionError, ConversionResult, DocumentConverter, ExtractedTable, ReadSeek, StreamInfo,
};

use crate::ooxml::{
    Package, has_zip_magic, open_package, package_title, read_member, relationships, resolve_target,
};

const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

pub struct PptxConverter;

impl DocumentConverter for PptxConverter {
    fn name(&self) -> &str {
        "pptx"
    }

    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        let labelled = info.mime_starts_with(&[PPTX_MIME]) || info.extension_in(&[".pptx"]);
        labelled && has_zip_magic(input)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let mut archive = open_package(self.name(), input)?;
        let paths = slide_paths(&archive);
        if paths.is_empty() && archive.by_name("ppt/presentation.xml").is_err() {
            return Err(ConversionError::malformed(self.name(), "missing ppt/presentation.xml"));
        }
        let core_title = package_title(&mut archive);

        let mut slides = Vec::with_capacity(paths.len());
        for (number, path) in paths {
            let xml = read_member(&mut archive, &path)
                .map_err(|e| ConversionError::malformed(self.name(), e))?
                .unwrap_or_default();
            let links = slide_links(&mut archive, &path);
            let shapes = parse_shapes(&xml).map_err(|e| ConversionError::malformed(self.name(), e))?;
            let notes = links.notes.as_deref().and_then(|notes_path| read_notes(&mut archive, notes_path));
            slides.push(Slide {
                number,
                shapes,
                images: links.images,
                notes,
            });
        }
        debug!(slides = slides.len(), "pptx slides parsed");
        Ok(render(slides, core_title))
    }
}

/// `ppt/slides/slideN.xml` entries sorted by `N`.
fn slide_paths(archive: &Package) -> Vec<(usize, String)> {
    let mut paths: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    paths.sort();
    paths
}

#[derive(Default)]
struct SlideLinks {
    notes: Option<String>,
    /// relationship id → media file name
    images: HashMap<String, String>,
}

fn slide_links(archive: &mut Package, slide_path: &str) -> SlideLinks {
    let (dir, file) = slide_path.rsplit_once('/').unwrap_or(("", slide_path));
    let rels_path = format!("{dir}/_rels/{file}.rels");
    let xml = match read_member(archive, &rels_path) {
        Ok(Some(xml)) => xml,
        Ok(None) => return SlideLinks::default(),
        Err(e) => {
            warn!(error = %e, "unreadable slide relationships, ignoring");
            return SlideLinks::default();
        }
    };
    let mut links = SlideLinks::default();
    for (id, kind, target) in relationships(&xml) {
        if kind.ends_with("/notesSlide") {
            links.notes = Some(resolve_target(dir, &target));
        } else if kind.ends_with("/image") {
            let name = target.rsplit('/').next().unwrap_or(&target).to_string();
            links.images.insert(id, name);
        }
    }
    links
}

fn read_notes(archive: &mut Package, path: &str) -> Option<String> {
    let xml = match read_member(archive, path) {
        Ok(xml) => xml?,
        Err(e) => {
            warn!(error = %e, "unreadable notes slide, ignoring");
            return None;
        }
    };
    let shapes = match parse_shapes(&xml) {
        Ok(shapes) => shapes,
        Err(e) => {
            warn!(error = %e, "malformed notes slide, ignoring");
            return None;
        }
    };
    let text = shapes
        .into_iter()
        .filter_map(|shape| match shape {
            Shape::Text { title: false, text } => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

// ---------------------------------------------------------------------------
// Slide model
// ---------------------------------------------------------------------------

struct Slide {
    number: usize,
    shapes: Vec<Shape>,
    images: HashMap<String, String>,
    notes: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Shape {
    Text { title: bool, text: String },
    Table(ExtractedTable),
    Picture { alt: String, embed: Option<String> },
}

#[derive(Default)]
struct TextShape {
    placeholder: Option<String>,
    paragraphs: Vec<String>,
}

impl TextShape {
    fn into_shape(self) -> Option<Shape> {
        // slide numbers, dates and footers repeat on every slide
        if matches!(self.placeholder.as_deref(), Some("sldNum" | "dt" | "ftr" | "sldImg")) {
            return None;
        }
        let text = self.paragraphs.join("\n").trim().to_string();
        if text.is_empty() {
            return None;
        }
        let title = matches!(self.placeholder.as_deref(), Some("title" | "ctrTitle"));
        Some(Shape::Text { title, text })
    }
}

#[derive(Default)]
struct Picture {
    alt: String,
    embed: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_shapes(xml: &str) -> Result<Vec<Shape>, String> {
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();
    let mut shape: Option<TextShape> = None;
    let mut picture: Option<Picture> = None;
    let mut table: Option<Vec<Vec<String>>> = None;
    let mut paragraph: Option<String> = None;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sp" => shape = Some(TextShape::default()),
                b"pic" => picture = Some(Picture::default()),
                b"tbl" => table = Some(Vec::new()),
                b"tr" => {
                    if let Some(rows) = table.as_mut() {
                        rows.push(Vec::new());
                    }
                }
                b"tc" => {
                    if let Some(row) = table.as_mut().and_then(|rows| rows.last_mut()) {
                        row.push(String::new());
                    }
                }
                b"p" => paragraph = Some(String::new()),
                b"t" => in_text = true,
                other => apply_empty(other, &e, shape.as_mut(), picture.as_mut(), paragraph.as_mut()),
            },
            Event::Empty(e) => apply_empty(
                e.local_name().as_ref(),
                &e,
                shape.as_mut(),
                picture.as_mut(),
                paragraph.as_mut(),
            ),
            Event::Text(t) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&t.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let Some(text) = paragraph.take() else { continue };
                    let cell = table.as_mut().and_then(|rows| rows.last_mut()).and_then(|row| row.last_mut());
                    match (cell, shape.as_mut()) {
                        (Some(cell), _) => {
                            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                            if !cell.is_empty() && !text.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(&text);
                        }
                        (None, Some(shape)) => shape.paragraphs.push(text),
                        (None, None) => {}
                    }
                }
                b"sp" => {
                    if let Some(done) = shape.take().and_then(TextShape::into_shape) {
                        shapes.push(done);
                    }
                }
                b"pic" => {
                    if let Some(done) = picture.take() {
                        shapes.push(Shape::Picture {
                            alt: done.alt,
                            embed: done.embed,
                        });
                    }
                }
                b"tbl" => {
                    if let Some(rows) = table.take().filter(|rows| !rows.is_empty()) {
                        shapes.push(Shape::Table(ExtractedTable { rows }));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(shapes)
}

/// Elements that matter whether written as `<x/>` or `<x>...</x>`.
fn apply_empty(
    name: &[u8],
    e: &BytesStart<'_>,
    shape: Option<&mut TextShape>,
    picture: Option<&mut Picture>,
    paragraph: Option<&mut String>,
) {
    match name {
        b"ph" => {
            if let Some(shape) = shape {
                // a placeholder without a type is a body placeholder
                shape.placeholder = Some(attribute(e, b"type").unwrap_or_else(|| "body".to_string()));
            }
        }
        b"cNvPr" => {
            if let Some(picture) = picture {
                picture.alt = attribute(e, b"descr")
                    .filter(|d| !d.trim().is_empty())
                    .or_else(|| attribute(e, b"name"))
                    .unwrap_or_default();
            }
        }
        b"blip" => {
            if let Some(picture) = picture {
                picture.embed = attribute(e, b"embed");
            }
        }
        b"br" => {
            if let Some(p) = paragraph {
                p.push('\n');
            }
        }
        _ => {}
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(slides: Vec<Slide>, core_title: Option<String>) -> ConversionResult {
    let mut sections = Vec::with_capacity(slides.len());
    let mut first_title = None;
    let mut tables = Vec::new();

    for slide in slides {
        let mut blocks = vec![format!("<!-- Slide number: {} -->", slide.number)];
        for shape in slide.shapes {
            match shape {
                Shape::Text { title: true, text } => {
                    let heading = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    blocks.push(format!("# {heading}"));
                    first_title.get_or_insert(heading);
                }
                Shape::Text { title: false, text } => blocks.push(text),
                Shape::Table(table) => {
                    blocks.push(table.to_markdown());
                    tables.push(table);
                }
                Shape::Picture { alt, embed } => {
                    let target = embed
                        .and_then(|id| slide.images.get(&id).cloned())
                        .unwrap_or_else(|| format!("{}.jpg", alt.replace(char::is_whitespace, "")));
                    blocks.push(format!("![{}]({target})", alt.replace(['\n', '\r'], " ")));
                }
            }
        }
        if let Some(notes) = slide.notes {
            blocks.push(format!("### Notes:\n{notes}"));
        }
        sections.push(blocks.join("\n\n"));
    }

    let mut result = ConversionResult::new(sections.join("\n\n"));
    if let Some(title) = core_title.or(first_title) {
        result = result.with_title(title);
    }
    for table in tables {
        result = result.with_table(table);
    }
    result
}
