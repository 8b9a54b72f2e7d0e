//! Stream probing: turns leading bytes plus caller hints into ordered
//! [`StreamInfo`] guesses.
//!
//! Guess order, most specific first:
//! 1. declared: the caller's MIME type and/or extension
//! 2. sniffed: magic bytes and text heuristics, independent of the file name
//! 3. filename: the extension of the declared name, path, or URL
//!
//! A detected charset refines every text-like guess; it never becomes a
//! guess of its own. Guesses with the same (MIME, extension) are collapsed,
//! keeping the first.

mod charset;
mod mime;
mod sniff;

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, instrument};

use markitup_shared::StreamInfo;

pub use charset::{detect_charset, looks_like_text};
pub use markitup_shared::normalize_extension;
pub use mime::{extension_for_mime, extension_of, is_textual_mime, mime_for_extension};
pub use sniff::sniff;

/// Number of leading bytes inspected when probing.
pub const PROBE_WINDOW: usize = 64 * 1024;

/// Probe `stream` and return the ordered guesses.
///
/// Reads at most [`PROBE_WINDOW`] bytes from the current position and seeks
/// back to that position before returning. Never returns an empty list.
#[instrument(skip_all)]
pub fn probe<R: Read + Seek + ?Sized>(
    stream: &mut R,
    hints: &StreamInfo,
) -> std::io::Result<Vec<StreamInfo>> {
    let start = stream.stream_position()?;
    let mut head = Vec::new();
    let read = (&mut *stream)
        .take(PROBE_WINDOW as u64)
        .read_to_end(&mut head);
    stream.seek(SeekFrom::Start(start))?;
    read?;

    let guesses = guesses_from_prefix(&head, hints);
    debug!(
        probed = head.len(),
        guesses = guesses.len(),
        first = ?guesses.first().map(StreamInfo::format_key),
        "stream probed"
    );
    Ok(guesses)
}

/// Build the guess list from an already-read prefix.
pub fn guesses_from_prefix(head: &[u8], hints: &StreamInfo) -> Vec<StreamInfo> {
    // Fields only the caller can know travel with every guess.
    let carried = StreamInfo {
        filename: hints.filename.clone(),
        local_path: hints.local_path.clone(),
        url: hints.url.clone(),
        ..StreamInfo::default()
    };

    let mut guesses = Vec::with_capacity(3);

    if hints.mime_type.is_some() || hints.extension.is_some() {
        guesses.push(complete(hints.clone()));
    }

    if let Some(sniffed) = sniff(head) {
        guesses.push(carried.merged_with(&sniffed));
    }

    if let Some(extension) = declared_name_extension(hints) {
        let mut by_name = carried.clone();
        by_name.mime_type = mime_for_extension(&extension).map(str::to_string);
        by_name.extension = Some(extension);
        guesses.push(by_name);
    }

    let charset = hints.charset.clone().or_else(|| {
        if !head.is_empty() && looks_like_text(head) {
            detect_charset(head)
        } else {
            None
        }
    });
    if let Some(charset) = charset {
        for guess in guesses.iter_mut().filter(|g| g.charset.is_none() && is_text_like(g)) {
            guess.charset = Some(charset.clone());
        }
    }

    let mut unique: Vec<StreamInfo> = Vec::with_capacity(guesses.len());
    for guess in guesses {
        if !unique.iter().any(|u| u.format_key() == guess.format_key()) {
            unique.push(guess);
        }
    }

    if unique.is_empty() {
        unique.push(hints.clone());
    }
    unique
}

/// Fill a missing MIME type from the extension and vice versa.
fn complete(mut info: StreamInfo) -> StreamInfo {
    if let Some(ext) = info.extension.take() {
        info.extension = normalize_extension(&ext);
    }
    if info.mime_type.is_none() {
        info.mime_type = info
            .extension
            .as_deref()
            .and_then(mime_for_extension)
            .map(str::to_string);
    }
    if info.extension.is_none() {
        info.extension = info
            .mime_type
            .as_deref()
            .and_then(extension_for_mime)
            .map(str::to_string);
    }
    info
}

fn declared_name_extension(hints: &StreamInfo) -> Option<String> {
    if let Some(name) = &hints.filename {
        return extension_of(name);
    }
    if let Some(path) = &hints.local_path {
        return path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(normalize_extension);
    }
    let url = url::Url::parse(hints.url.as_deref()?).ok()?;
    let last = url.path_segments()?.next_back()?.to_string();
    extension_of(&last)
}

fn is_text_like(info: &StreamInfo) -> bool {
    match info.mime_type.as_deref() {
        Some(mime) => is_textual_mime(mime),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DOCX_MIME: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    #[test]
    fn probe_restores_position() {
        let mut cursor = Cursor::new(b"prefix|Hello, world".to_vec());
        cursor.set_position(7);
        let guesses = probe(&mut cursor, &StreamInfo::default()).unwrap();
        assert_eq!(cursor.position(), 7);
        assert_eq!(guesses[0].mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn declared_hint_comes_first() {
        let hints = StreamInfo::default().with_extension("csv");
        let guesses = guesses_from_prefix(b"a,b\n1,2\n", &hints);
        assert_eq!(guesses[0].extension.as_deref(), Some(".csv"));
        assert_eq!(guesses[0].mime_type.as_deref(), Some("text/csv"));
        assert_eq!(guesses[1].mime_type.as_deref(), Some("text/plain"));
        // charset attached to both text guesses
        assert!(guesses.iter().all(|g| g.charset.as_deref() == Some("UTF-8")));
    }

    #[test]
    fn mislabeled_docx_sniffs_as_text_first() {
        let hints = StreamInfo::default().with_filename("report.docx");
        let guesses = guesses_from_prefix(b"Quarterly numbers look fine.", &hints);
        assert_eq!(guesses.len(), 2);
        assert_eq!(guesses[0].mime_type.as_deref(), Some("text/plain"));
        assert_eq!(guesses[0].filename.as_deref(), Some("report.docx"));
        assert_eq!(guesses[1].extension.as_deref(), Some(".docx"));
        assert_eq!(guesses[1].mime_type.as_deref(), Some(DOCX_MIME));
        assert_eq!(guesses[1].charset, None);
    }

    #[test]
    fn identical_guesses_are_collapsed() {
        let hints = StreamInfo::default()
            .with_mime_type("text/plain")
            .with_filename("notes.txt");
        let guesses = guesses_from_prefix(b"just text", &hints);
        assert_eq!(guesses.len(), 1);
        assert_eq!(guesses[0].extension.as_deref(), Some(".txt"));
    }

    #[test]
    fn empty_stream_without_hints_yields_one_empty_guess() {
        let guesses = guesses_from_prefix(b"", &StreamInfo::default());
        assert_eq!(guesses, vec![StreamInfo::default()]);
    }

    #[test]
    fn caller_charset_wins() {
        let hints = StreamInfo::default().with_charset("latin-1");
        let guesses = guesses_from_prefix(b"plain", &hints);
        assert_eq!(guesses[0].charset.as_deref(), Some("latin-1"));
    }

    #[test]
    fn url_path_supplies_extension() {
        let hints = StreamInfo::default().with_url("https://example.com/docs/page.html?x=1");
        let guesses = guesses_from_prefix(&[0x13, 0x37, 0x00, 0x42], &hints);
        assert_eq!(guesses[0].extension.as_deref(), Some(".html"));
        assert_eq!(guesses[0].url.as_deref(), Some("https://example.com/docs/page.html?x=1"));
    }

    #[test]
    fn binary_guess_gets_no_charset() {
        let head = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n";
        let guesses = guesses_from_prefix(head, &StreamInfo::default().with_filename("a.pdf"));
        assert_eq!(guesses.len(), 1);
        assert_eq!(guesses[0].mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(guesses[0].charset, None);
    }
}
