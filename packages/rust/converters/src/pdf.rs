//! PDF → Markdown (plain text).
//!
//! Text comes from `pdf-extract`, which can panic on malformed files, so the
//! call is isolated with `catch_unwind` and a panic becomes a conversion
//! failure. The title is read from the document information dictionary.

use std::panic::{AssertUnwindSafe, catch_unwind};

use lopdf::{Document, Object};
use tracing::debug;

use markitup_shared::{
    ConversionError, ConversionResult, DocumentConverter, ReadSeek, StreamInfo, read_all,
    read_prefix,
};

const PDF_MAGIC: &[u8] = b"%PDF-";

pub struct PdfConverter;

impl DocumentConverter for PdfConverter {
    fn name(&self) -> &str {
        "pdf"
    }

    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        let labelled =
            info.mime_starts_with(&["application/pdf", "application/x-pdf"]) || info.extension_in(&[".pdf"]);
        labelled && read_prefix(input, PDF_MAGIC.len()).is_ok_and(|head| head == PDF_MAGIC)
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(self.name(), e))?;

        let text = match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes))) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return Err(ConversionError::malformed(self.name(), format!("text extraction failed: {e}")));
            }
            Err(_) => {
                return Err(ConversionError::malformed(self.name(), "text extraction panicked on malformed PDF"));
            }
        };
        debug!(bytes = bytes.len(), chars = text.len(), "pdf text extracted");

        let mut result = ConversionResult::new(tidy(&text));
        if let Some(title) = info_title(&bytes) {
            result = result.with_title(title);
        }
        Ok(result)
    }
}

/// `/Title` from the trailer's `/Info` dictionary.
fn info_title(bytes: &[u8]) -> Option<String> {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "pdf metadata unreadable");
            return None;
        }
    };
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| info.as_reference().ok())
        .and_then(|id| doc.get_object(id).ok())?;
    let Object::Dictionary(info) = info else {
        return None;
    };
    let Ok(Object::String(raw, _)) = info.get(b"Title") else {
        return None;
    };
    let title = decode_text_string(raw);
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// PDF text strings are UTF-16BE with a BOM, else a single-byte encoding
/// (treated as Latin-1 when it is not valid UTF-8).
fn decode_text_string(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

/// Trailing spaces off each line, runs of blank lines down to one, and form
/// feeds between pages turned into paragraph breaks.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.replace('\u{c}', "\n\n").lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        blank_run = 0;
        out.push_str(line);
    }
    out
}
