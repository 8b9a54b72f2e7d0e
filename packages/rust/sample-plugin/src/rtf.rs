//! RTF to plain text.
//!
//! Walks the control-word stream, keeping body text and dropping
//! destinations that carry no readable content (font tables, pictures,
//! `\*` groups). Formatting is not preserved.

use encoding_rs::WINDOWS_1252;
use tracing::debug;

use markitup_core::{
    ConversionError, ConversionResult, DocumentConverter, ReadSeek, StreamInfo, read_all,
    read_prefix,
};

const NAME: &str = "rtf";

const RTF_MIMES: &[&str] = &["application/rtf", "text/rtf"];

/// Destinations whose text never reaches the output.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "footer",
    "footerl",
    "footerr",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "xmlnstbl",
    "generator",
    "themedata",
    "colorschememapping",
    "datastore",
    "latentstyles",
    "filetbl",
    "revtbl",
];

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Converts RTF documents to plain markdown paragraphs.
#[derive(Debug, Default)]
pub struct RtfConverter;

impl RtfConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentConverter for RtfConverter {
    fn name(&self) -> &str {
        NAME
    }

    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool {
        let labelled = info.extension_in(&[".rtf"])
            || info.essence().is_some_and(|m| RTF_MIMES.contains(&m.as_str()));
        if labelled {
            return true;
        }
        // unlabelled streams still qualify on the header
        info.mime_type.is_none()
            && info.extension.is_none()
            && read_prefix(input, 5).is_ok_and(|head| head.eq_ignore_ascii_case(b"{\\rtf"))
    }

    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError> {
        let bytes = read_all(input).map_err(|e| ConversionError::io(NAME, e))?;
        let document = parse_rtf(&bytes).map_err(|detail| ConversionError::malformed(NAME, detail))?;
        debug!(chars = document.text.len(), "rtf parsed");

        let mut result = ConversionResult::new(document.text);
        if let Some(title) = document.title {
            result = result.with_title(title);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Text recovered from an RTF document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RtfDocument {
    pub text: String,
    /// `\title` from the `\info` group, if present.
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Group {
    skip: bool,
    in_title: bool,
    /// Fallback characters to drop after each `\u`.
    unicode_skip: usize,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            skip: false,
            in_title: false,
            unicode_skip: 1,
        }
    }
}

struct Sink {
    body: String,
    title: String,
    /// Fallback characters still to drop after a `\u`.
    pending_skip: usize,
}

impl Sink {
    fn push(&mut self, group: &Group, text: &str) {
        if self.pending_skip > 0 {
            self.pending_skip -= 1;
            return;
        }
        if group.in_title {
            self.title.push_str(text);
        } else if !group.skip {
            self.body.push_str(text);
        }
    }

    fn push_byte(&mut self, group: &Group, byte: u8) {
        if byte.is_ascii() {
            let mut buf = [0u8; 4];
            self.push(group, char::from(byte).encode_utf8(&mut buf));
        } else {
            let bytes = [byte];
            let (decoded, _, _) = WINDOWS_1252.decode(&bytes);
            self.push(group, &decoded);
        }
    }
}

/// Extract body text and title from raw RTF bytes.
///
/// Fails when the input does not open with `{\rtf` or a group is never
/// closed.
pub fn parse_rtf(bytes: &[u8]) -> Result<RtfDocument, String> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let bytes = &bytes[start..];
    if bytes.len() < 5 || !bytes[..5].eq_ignore_ascii_case(b"{\\rtf") {
        return Err("missing {\\rtf header".to_string());
    }

    let mut stack: Vec<Group> = Vec::new();
    let mut group = Group::default();
    let mut sink = Sink {
        body: String::new(),
        title: String::new(),
        pending_skip: 0,
    };
    let mut closed = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                stack.push(group);
                i += 1;
            }
            b'}' => {
                let Some(outer) = stack.pop() else {
                    return Err(format!("unbalanced '}}' at byte {}", start + i));
                };
                group = outer;
                i += 1;
                if stack.is_empty() {
                    closed = true;
                    break;
                }
            }
            b'\\' => {
                i = control(bytes, i + 1, &mut group, &mut sink);
            }
            b'\r' | b'\n' => i += 1,
            byte => {
                sink.push_byte(&group, byte);
                i += 1;
            }
        }
    }

    if !closed {
        return Err("unterminated group".to_string());
    }

    let title = sink.title.trim();
    Ok(RtfDocument {
        text: tidy(&sink.body),
        title: (!title.is_empty()).then(|| title.to_string()),
    })
}

/// Handle the control sequence starting at `i` (just past the backslash).
/// Returns the index after it.
fn control(bytes: &[u8], mut i: usize, group: &mut Group, sink: &mut Sink) -> usize {
    let Some(&first) = bytes.get(i) else {
        return i;
    };

    if !first.is_ascii_alphabetic() {
        i += 1;
        match first {
            b'\'' => {
                let hex = bytes.get(i..i + 2).and_then(|h| std::str::from_utf8(h).ok());
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    sink.push_byte(group, byte);
                    return i + 2;
                }
            }
            b'\\' | b'{' | b'}' => sink.push_byte(group, first),
            b'~' => sink.push(group, " "),
            b'_' => sink.push(group, "-"),
            b'*' => group.skip = true,
            b'\n' | b'\r' => sink.push(group, "\n"),
            _ => {}
        }
        return i;
    }

    let word_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        i += 1;
    }
    let word = std::str::from_utf8(&bytes[word_start..i]).unwrap_or_default();

    let param_start = i;
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let param: Option<i32> = std::str::from_utf8(&bytes[param_start..i])
        .ok()
        .and_then(|p| p.parse().ok());

    // a single space delimits the control word and is not text
    if bytes.get(i) == Some(&b' ') {
        i += 1;
    }

    match word {
        "par" | "line" | "sect" | "page" | "row" => sink.push(group, "\n"),
        "tab" | "cell" => sink.push(group, "\t"),
        "emdash" => sink.push(group, "\u{2014}"),
        "endash" => sink.push(group, "\u{2013}"),
        "bullet" => sink.push(group, "\u{2022}"),
        "lquote" | "rquote" => sink.push(group, "'"),
        "ldblquote" | "rdblquote" => sink.push(group, "\""),
        "uc" => group.unicode_skip = param.unwrap_or(1).max(0) as usize,
        "u" => {
            if let Some(code) = param {
                let code = if code < 0 { code + 0x10000 } else { code };
                let ch = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                let mut buf = [0u8; 4];
                sink.push(group, ch.encode_utf8(&mut buf));
                sink.pending_skip = group.unicode_skip;
            }
        }
        "title" if group.skip => group.in_title = true,
        w if SKIPPED_DESTINATIONS.contains(&w) => group.skip = true,
        _ => {}
    }
    i
}

/// Trim line ends and collapse runs of blank lines.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line.trim_start_matches(' '));
            out.push('\n');
        }
    }
    out.trim().to_string()
}
