//! Charset-aware text decoding shared by the text-based converters.
//!
//! Order: BOM → declared charset → UTF-8 → `chardetng` guess.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

/// Decode `bytes` strictly. Fails if the chosen encoding reports errors.
pub(crate) fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String, String> {
    let encoding = pick_encoding(bytes, charset);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(format!("invalid {} byte sequence", encoding.name()));
    }
    Ok(text.into_owned())
}

/// Decode `bytes`, replacing undecodable sequences instead of failing.
pub(crate) fn decode_text_lossy(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = pick_encoding(bytes, charset);
    encoding.decode(bytes).0.into_owned()
}

fn pick_encoding(bytes: &[u8], charset: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if let Some(label) = charset {
        // ASCII labels map to windows-1252; UTF-8 is the ASCII superset that
        // keeps non-ASCII bytes past a probed prefix intact.
        if is_ascii_label(label) && std::str::from_utf8(bytes).is_ok() {
            return UTF_8;
        }
        if let Some(enc) = Encoding::for_label(label.trim().as_bytes()) {
            return enc;
        }
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

fn is_ascii_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "ascii" | "us-ascii" | "ansi_x3.4-1968" | "iso646-us"
    )
}
