//! The converter capability contract.
//!
//! Every format handler, built-in or plugin-supplied, implements
//! [`DocumentConverter`]. The dispatch engine only ever talks to converters
//! through this trait.

use std::io::{Read, Seek};

use crate::error::ConversionError;
use crate::types::{ConversionResult, Priority, StreamInfo};

/// A readable, seekable byte stream.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Trait for a unit that turns one or more related formats into markdown.
///
/// Converters hold only construction-time configuration and must be safe to
/// call from several threads at once, each with its own stream.
pub trait DocumentConverter: Send + Sync {
    /// Human-readable converter name for tracing and diagnostics.
    fn name(&self) -> &str;

    /// The tier this converter registers at when no explicit priority is given.
    fn priority(&self) -> Priority {
        Priority::SPECIFIC_FILE_FORMAT
    }

    /// Quick check whether this converter can plausibly handle the stream
    /// under `info`.
    ///
    /// Returns `false` for "not my format". May read from `input`; the caller
    /// rewinds before the next use.
    fn accepts(&self, input: &mut dyn ReadSeek, info: &StreamInfo) -> bool;

    /// Convert the stream to markdown.
    ///
    /// `input` is positioned at the start of the content. Implementations
    /// must not rely on `accepts` having been called first.
    fn convert(
        &self,
        input: &mut dyn ReadSeek,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConversionError>;
}

/// Read at most `limit` bytes from the current position.
pub fn read_prefix(input: &mut dyn ReadSeek, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit.min(8192));
    (&mut *input).take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read everything from the current position to the end of the stream.
pub fn read_all(input: &mut dyn ReadSeek) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    Ok(buf)
}
