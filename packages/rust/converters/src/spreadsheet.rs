//! Excel workbooks (`.xlsx`, `.xls`) → Markdown.
//!
//! Both formats go through `calamine`; every worksheet becomes a `## name`
//! section followed by a table whose first row is the header.

use std::fmt::Display;
use std::io::{Cursor, Read, Seek};

use calamine::{Data, Reader, Xls, Xlsx};
use tracing::{debug, warn};

use markitup_shared::{
    ConversionError, ConversionResult, DocumentConverter, ExtractedTable, ReadSeek, StreamInfo,
    read_all, read_prefix,
};

use crate::ooxml::has_zip_magic;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIMES: &[&str] = &["application/vnd.ms-excel", "application/excel"];
/// Compound File Binary header used by pre-2007 Office files.
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub struct XlsxConverter;

impl DocumentConverter for XlsxConverter {
    fn name(&self) -> &str {
        "xlsx"
    }

    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        let labelled = info.mime_starts_with(&[XLSX_MIME]) || info.extension_in(&[".xlsx"]);
        labelled && has_zip_magic(input)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;
        let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| ConversionError::malformed(self.name(), format!("unreadable workbook: {e}")))?;
        render_workbook(self.name(), workbook)
    }
}

pub struct XlsConverter;

impl DocumentConverter for XlsConverter {
    fn name(&self) -> &str {
        "xls"
    }

    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        let labelled = info.mime_starts_with(XLS_MIMES) || info.extension_in(&[".xls"]);
        labelled && read_prefix(input, CFB_MAGIC.len()).is_ok_and(|head| head == CFB_MAGIC)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;
        let workbook: Xls<_> = Xls::new(Cursor::new(bytes))
            .map_err(|e| ConversionError::malformed(self.name(), format!("unreadable workbook: {e}")))?;
        render_workbook(self.name(), workbook)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_workbook<RS, W>(converter: &str, mut workbook: W) -> Result<ConversionResult, ConversionError>
where
    RS: Read + Seek,
    W: Reader<RS>,
    W::Error: Display,
{
    let mut sections = Vec::new();
    let mut tables = Vec::new();

    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                // chart sheets and macro sheets have no cell range
                warn!(sheet = %name, error = %e, "skipping unreadable sheet");
                continue;
            }
        };
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        let mut section = format!("## {name}");
        if !rows.is_empty() {
            let table = ExtractedTable { rows };
            section.push_str("\n\n");
            section.push_str(&table.to_markdown());
            tables.push(table);
        }
        sections.push(section);
    }

    if sections.is_empty() {
        return Err(ConversionError::malformed(converter, "workbook has no readable sheets"));
    }
    debug!(sheets = sections.len(), tables = tables.len(), "workbook rendered");

    let mut result = ConversionResult::new(sections.join("\n\n"));
    for table in tables {
        result = result.with_table(table);
    }
    Ok(result)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => String::from(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => dt.to_string(),
        Data::Error(e) => format!("#{e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const MAIN_NS: &str = r#"xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#;
    const REL_NS: &str = r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    fn stored() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    }

    /// A workbook whose sheets are `(name, sheetData rows)` pairs.
    fn xlsx(shared: &[&str], sheets: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let entries: String = sheets
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#, n = i + 1))
            .collect();
        zip.start_file("xl/workbook.xml", stored()).unwrap();
        write!(zip, r#"<?xml version="1.0"?><workbook {MAIN_NS} {REL_NS}><sheets>{entries}</sheets></workbook>"#).unwrap();

        let rels: String = (1..=sheets.len())
            .map(|n| {
                format!(
                    r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
                )
            })
            .collect();
        zip.start_file("xl/_rels/workbook.xml.rels", stored()).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        )
        .unwrap();

        let strings: String = shared.iter().map(|s| format!("<si><t>{s}</t></si>")).collect();
        zip.start_file("xl/sharedStrings.xml", stored()).unwrap();
        write!(
            zip,
            r#"<?xml version="1.0"?><sst {MAIN_NS} count="{n}" uniqueCount="{n}">{strings}</sst>"#,
            n = shared.len()
        )
        .unwrap();

        for (i, (_, data)) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), stored()).unwrap();
            write!(zip, r#"<?xml version="1.0"?><worksheet {MAIN_NS}><sheetData>{data}</sheetData></worksheet>"#).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn convert(bytes: Vec<u8>) -> Result<ConversionResult, ConversionError> {
        let info = StreamInfo::default().with_extension(".xlsx");
        XlsxConverter.convert(&mut Cursor::new(bytes), &info)
    }

    #[test]
    fn sheets_become_sections_with_tables() {
        let sales = concat!(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>"#,
            r#"<row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>12</v></c></row>"#,
            r#"<row r="3"><c r="A3" t="s"><v>3</v></c><c r="B3"><v>7.5</v></c></row>"#,
        );
        let notes = r#"<row r="1"><c r="A1" t="s"><v>4</v></c></row>"#;
        let bytes = xlsx(
            &["Region", "Sales", "North", "South", "Draft figures"],
            &[("Sales", sales), ("Notes", notes)],
        );
        let result = convert(bytes).unwrap();
        assert_eq!(
            result.markdown,
            "## Sales\n\n| Region | Sales |\n| --- | --- |\n| North | 12 |\n| South | 7.5 |\n\n\
             ## Notes\n\n| Draft figures |\n| --- |"
        );
        assert_eq!(result.metadata.tables.len(), 2);
    }

    #[test]
    fn empty_sheet_keeps_its_heading() {
        let bytes = xlsx(&[], &[("Blank", "")]);
        let result = convert(bytes).unwrap();
        assert_eq!(result.markdown, "## Blank");
        assert!(result.metadata.tables.is_empty());
    }

    #[test]
    fn xlsx_accepts_requires_label_and_zip() {
        let info = StreamInfo::default().with_extension(".xlsx");
        let mut text = Cursor::new(b"a,b\n1,2\n".to_vec());
        assert!(!XlsxConverter.accepts(&mut text, &info));
        let mut real = Cursor::new(xlsx(&[], &[("Blank", "")]));
        assert!(XlsxConverter.accepts(&mut real, &info));
        assert!(!XlsxConverter.accepts(&mut real, &StreamInfo::default()));
    }

    #[test]
    fn zip_without_workbook_is_malformed() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", stored()).unwrap();
        zip.write_all(b"<w:document/>").unwrap();
        let err = convert(zip.finish().unwrap().into_inner()).unwrap_err();
        assert_eq!(err.converter, "xlsx");
    }

    #[test]
    fn xls_accepts_requires_compound_file_header() {
        let mut legacy = CFB_MAGIC.to_vec();
        legacy.resize(512, 0);
        let info = StreamInfo::default().with_extension(".xls");
        assert!(XlsConverter.accepts(&mut Cursor::new(legacy.clone()), &info));
        assert!(!XlsConverter.accepts(&mut Cursor::new(b"Region,Sales".to_vec()), &info));
        assert!(!XlsConverter.accepts(&mut Cursor::new(legacy), &StreamInfo::default()));
    }

    #[test]
    fn truncated_xls_is_malformed() {
        let mut truncated = CFB_MAGIC.to_vec();
        truncated.extend_from_slice(b"cut");
        let info = StreamInfo::default().with_extension(".xls");
        let err = XlsConverter.convert(&mut Cursor::new(truncated), &info).unwrap_err();
        assert_eq!(err.converter, "xls");
    }

    #[test]
    fn cell_values_render_plainly() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Int(-4)), "-4");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_text(&Data::String("  padded ".into())), "padded");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
