//! Plain-text and catch-all text converters.

use markitup_probe::looks_like_text;
use markitup_shared::{
    ConversionError, ConversionResult, DocumentConverter, Priority, ReadSeek, StreamInfo, read_all,
    read_prefix,
};

use crate::text::{decode_text, decode_text_lossy};

const ACCEPTED_MIME_PREFIXES: &[&str] = &["text/", "application/json", "application/markdown"];
const ACCEPTED_EXTENSIONS: &[&str] = &[".txt", ".text", ".md", ".markdown", ".json", ".jsonl", ".log"];

/// Bytes inspected by the catch-all converter before accepting.
const SNIFF_LEN: usize = 8 * 1024;

/// Anything declared as text, or any guess that carries a charset.
pub struct PlainTextConverter;

impl DocumentConverter for PlainTextConverter {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn priority(&self) -> Priority {
        Priority::GENERIC_FILE_FORMAT
    }

    fn accepts(&self, _input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        info.charset.is_some()
            || info.mime_starts_with(ACCEPTED_MIME_PREFIXES)
            || info.extension_in(ACCEPTED_EXTENSIONS)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;
        let text = decode_text(&bytes, info.charset.as_deref())
            .map_err(|detail| ConversionError::decode(self.name(), detail))?;
        Ok(ConversionResult::new(text))
    }
}

/// Last resort: accepts empty streams and anything whose prefix looks like
/// text, regardless of the guess.
pub struct CatchAllTextConverter;

impl DocumentConverter for CatchAllTextConverter {
    fn name(&self) -> &str {
        "catch-all"
    }

    fn priority(&self) -> Priority {
        Priority::CATCH_ALL
    }

    fn accepts(&self, input: &mut dyn ReadSeek, _info: &StreamInfo) -> bool {
        read_prefix(input, SNIFF_LEN).is_ok_and(|head| looks_like_text(&head))
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;
        if bytes.is_empty() {
            return Ok(ConversionResult::new(String::new()));
        }
        Ok(ConversionResult::new(decode_text_lossy(
            &bytes,
            info.charset.as_deref(),
        )))
    }
}
