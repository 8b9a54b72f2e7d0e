//! Comma-separated values → Markdown table.

use markitup_shared::{
    ConversionError, ConversionResult, DocumentConverter, ExtractedTable, ReadSeek, StreamInfo,
    read_all,
};

use crate::text::decode_text;

const ACCEPTED_MIME_PREFIXES: &[&str] = &["text/csv", "application/csv"];
const ACCEPTED_EXTENSIONS: &[&str] = &[".csv"];

pub struct CsvConverter;

impl DocumentConverter for CsvConverter {
    fn name(&self) -> &str {
        "csv"
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
        let text = decode_text(&bytes, info.charset.as_deref())
            .map_err(|detail| ConversionError::decode(self.name(), detail))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ConversionError::malformed(self.name(), e.to_string()))?;
            rows.push(record.iter().map(|field| field.trim().to_string()).collect());
        }

        let table = ExtractedTable { rows };
        Ok(ConversionResult::new(table.to_markdown()).with_table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn convert(bytes: &[u8]) -> Result<ConversionResult, ConversionError> {
        let info = StreamInfo::default().with_extension(".csv");
        CsvConverter.convert(&mut Cursor::new(bytes.to_vec()), &info)
    }

    #[test]
    fn renders_header_and_rows() {
        let result = convert(b"name,qty\napple,3\npear,5\n").unwrap();
        assert_eq!(
            result.markdown,
            "| name | qty |\n| --- | --- |\n| apple | 3 |\n| pear | 5 |"
        );
        assert_eq!(result.metadata.tables.len(), 1);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let result = convert(b"a,b,c\n1\n").unwrap();
        assert!(result.markdown.ends_with("| 1 |  |  |"));
    }

    #[test]
    fn quoted_pipes_are_escaped() {
        let result = convert(b"expr\n\"a|b\"\n").unwrap();
        assert!(result.markdown.contains("a\\|b"));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let result = convert(b"").unwrap();
        assert_eq!(result.markdown, "");
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let info = StreamInfo::default()
            .with_extension(".csv")
            .with_charset("utf-8");
        let err = CsvConverter
            .convert(&mut Cursor::new(b"a,\xff\n".to_vec()), &info)
            .unwrap_err();
        assert!(err.to_string().starts_with("csv: "));
    }
}
