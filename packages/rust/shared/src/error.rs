//! Error types for MarkItUp.
//!
//! Library crates use [`MarkItUpError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Three classes matter to callers:
//! - configuration errors (duplicate registration, incompatible plugin,
//!   unreadable config) are fatal at setup;
//! - [`ConversionError`] is raised by a single converter and recovered from by
//!   the dispatch engine;
//! - [`MarkItUpError::UnsupportedFormat`] is what the caller sees when every
//!   candidate declined or failed.

use std::fmt;
use std::path::PathBuf;

use crate::types::StreamInfo;

/// Top-level error type for all MarkItUp operations.
#[derive(Debug, thiserror::Error)]
pub enum MarkItUpError {
    /// The same converter instance was registered twice.
    #[error("configuration error: converter '{converter}' is already registered")]
    DuplicateRegistration { converter: String },

    /// A plugin declared an interface version this engine does not speak.
    #[error(
        "configuration error: plugin '{plugin}' declares interface version {declared}, \
         but only version {supported} is supported"
    )]
    IncompatiblePlugin {
        plugin: String,
        declared: u32,
        supported: u32,
    },

    /// Configuration loading or validation error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A converter recognized the input but could not convert it.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// No converter accepted the input, or every one that did failed.
    #[error("{}", summarize_attempts(.attempts))]
    UnsupportedFormat { attempts: Vec<FailedAttempt> },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading or seeking the input stream failed.
    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarkItUpError>;

impl MarkItUpError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors that can only happen while setting up a facade.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRegistration { .. } | Self::IncompatiblePlugin { .. } | Self::Config { .. }
        )
    }

    /// Per-converter failures, if this is an unsupported-format error.
    pub fn attempts(&self) -> &[FailedAttempt] {
        match self {
            Self::UnsupportedFormat { attempts } => attempts,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionError
// ---------------------------------------------------------------------------

/// Raised by a converter that recognized its format but failed to convert it.
#[derive(Debug, thiserror::Error)]
#[error("{converter}: {cause}")]
pub struct ConversionError {
    /// Name of the converter that failed.
    pub converter: String,
    /// What went wrong.
    #[source]
    pub cause: ConversionCause,
}

impl ConversionError {
    pub fn new(converter: impl Into<String>, cause: ConversionCause) -> Self {
        Self {
            converter: converter.into(),
            cause,
        }
    }

    /// Content is recognizably this format but structurally broken.
    pub fn malformed(converter: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(converter, ConversionCause::Malformed(detail.into()))
    }

    /// Bytes could not be decoded (charset, compression, ...).
    pub fn decode(converter: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(converter, ConversionCause::Decode(detail.into()))
    }

    /// A runtime capability the converter needs is switched off or missing.
    pub fn missing_capability(converter: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::new(
            converter,
            ConversionCause::MissingCapability {
                capability: capability.into(),
            },
        )
    }

    /// Reading the input failed.
    pub fn io(converter: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(converter, ConversionCause::Io(source))
    }
}

/// Underlying cause of a [`ConversionError`].
#[derive(Debug, thiserror::Error)]
pub enum ConversionCause {
    #[error("malformed content: {0}")]
    Malformed(String),

    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("missing capability '{capability}'")]
    MissingCapability { capability: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The converter panicked; the payload message is kept.
    #[error("converter panicked: {0}")]
    Panicked(String),
}

// ---------------------------------------------------------------------------
// Dispatch diagnostics
// ---------------------------------------------------------------------------

/// Why one converter did not produce a result.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// `accepts` returned `false` for every guess it saw.
    Declined,
    /// `accepts` panicked; the converter was skipped from then on.
    AcceptsPanicked { message: String },
    /// `convert` returned an error or panicked.
    ConvertFailed(ConversionError),
}

/// The dispatch record for one converter.
#[derive(Debug)]
pub struct FailedAttempt {
    /// Converter name.
    pub converter: String,
    /// How many guesses the converter was consulted with.
    pub guesses_tried: usize,
    /// The guess the recorded failure happened under (last guess for declines).
    pub stream_info: StreamInfo,
    /// First hard failure, or `Declined`.
    pub outcome: AttemptOutcome,
}

impl FailedAttempt {
    /// `true` if the converter never accepted any guess.
    pub fn declined(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Declined)
    }
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Declined => {
                let plural = if self.guesses_tried == 1 { "" } else { "es" };
                write!(
                    f,
                    "{} declined ({} guess{plural})",
                    self.converter, self.guesses_tried
                )
            }
            AttemptOutcome::AcceptsPanicked { message } => {
                write!(f, "{} panicked while probing: {message}", self.converter)
            }
            AttemptOutcome::ConvertFailed(err) => {
                write!(f, "{} failed: {}", self.converter, err.cause)
            }
        }
    }
}

fn summarize_attempts(attempts: &[FailedAttempt]) -> String {
    if attempts.is_empty() {
        return "unsupported format: no converters are registered".to_string();
    }
    let mut msg = format!(
        "unsupported format: no converter succeeded ({} candidates)",
        attempts.len()
    );
    for attempt in attempts {
        msg.push_str("\n - ");
        msg.push_str(&attempt.to_string());
    }
    if let Some(hint) = legacy_format_hint(attempts) {
        msg.push_str("\n");
        msg.push_str(hint);
    }
    msg
}

/// Binary Word and PowerPoint files have no converter; point at the modern format.
fn legacy_format_hint(attempts: &[FailedAttempt]) -> Option<&'static str> {
    const LEGACY: &[(&str, &str, &str)] = &[
        (
            "application/msword",
            ".doc",
            "legacy .doc files are not supported; save the document as .docx and try again",
        ),
        (
            "application/vnd.ms-powerpoint",
            ".ppt",
            "legacy .ppt files are not supported; save the presentation as .pptx and try again",
        ),
    ];

    attempts.iter().find_map(|attempt| {
        let info = &attempt.stream_info;
        let essence = info.essence();
        LEGACY
            .iter()
            .find(|(mime, ext, _)| {
                essence.as_deref() == Some(*mime) || info.extension.as_deref() == Some(*ext)
            })
            .map(|(_, _, hint)| *hint)
    })
}
