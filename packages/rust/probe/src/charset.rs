//! Text detection and charset guessing.
//!
//! Detection order:
//! 1. BOM (most reliable)
//! 2. UTF-8 validation; pure ASCII is reported as `UTF-8` too, since the
//!    bytes past the probe window may not stay ASCII
//! 3. `chardetng` statistical detection for legacy encodings

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Fraction of control bytes above which a buffer is treated as binary.
const MAX_CONTROL_RATIO: f64 = 0.10;

/// `true` if `buf` plausibly holds text. Empty input counts as text.
pub fn looks_like_text(buf: &[u8]) -> bool {
    if buf.is_empty() || Encoding::for_bom(buf).is_some() {
        return true;
    }
    if buf.contains(&0) {
        return false;
    }

    let control = buf
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c))
        .count();
    (control as f64) / (buf.len() as f64) < MAX_CONTROL_RATIO
}

/// Best guess at the charset of a textual buffer.
///
/// Returns `None` for empty input.
pub fn detect_charset(buf: &[u8]) -> Option<String> {
    if buf.is_empty() {
        return None;
    }
    if let Some((encoding, _)) = Encoding::for_bom(buf) {
        return Some(encoding.name().to_string());
    }
    if buf.is_ascii() || valid_utf8_prefix(buf) {
        return Some("UTF-8".to_string());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(buf, true);
    Some(detector.guess(None, true).name().to_string())
}

/// UTF-8 check that tolerates a multi-byte sequence cut off by the probe window.
fn valid_utf8_prefix(buf: &[u8]) -> bool {
    match std::str::from_utf8(buf) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && buf.len() - e.valid_up_to() < 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_utf8() {
        assert_eq!(detect_charset(b"plain words").as_deref(), Some("UTF-8"));
        assert_eq!(detect_charset("naïve café".as_bytes()).as_deref(), Some("UTF-8"));
        assert_eq!(detect_charset(b""), None);
    }

    #[test]
    fn bom_wins() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"hello");
        assert_eq!(detect_charset(&bytes).as_deref(), Some("UTF-8"));

        let utf16 = [0xFF, 0xFE, b'h', 0, b'i', 0];
        assert!(looks_like_text(&utf16));
        assert_eq!(detect_charset(&utf16).as_deref(), Some("UTF-16LE"));
    }

    #[test]
    fn legacy_encoding_is_guessed() {
        // "Café déjà vu" in windows-1252
        let bytes = b"Caf\xe9 d\xe9j\xe0 vu, tr\xe8s \xe9l\xe9gant";
        assert!(looks_like_text(bytes));
        let charset = detect_charset(bytes).unwrap();
        assert_ne!(charset, "UTF-8");
    }

    #[test]
    fn truncated_utf8_tail_is_still_text() {
        let mut bytes = "héllo".as_bytes().to_vec();
        bytes.push(0xC3);
        assert!(looks_like_text(&bytes));
        assert_eq!(detect_charset(&bytes).as_deref(), Some("UTF-8"));
    }

    #[test]
    fn binary_is_not_text() {
        assert!(!looks_like_text(&[0x89, b'P', b'N', b'G', 0, 0, 0, 13]));
        assert!(!looks_like_text(&[1, 2, 3, 4, 5, 6, 7, 8]));
    }
}
