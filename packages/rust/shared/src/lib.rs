//! Shared types, converter contract, error model, and configuration for MarkItUp.
//!
//! This crate is the foundation depended on by all other MarkItUp crates.
//! It provides:
//! - [`MarkItUpError`]: the unified error type
//! - Domain types ([`StreamInfo`], [`ConversionResult`], [`Priority`])
//! - The [`DocumentConverter`] capability contract
//! - Configuration ([`AppConfig`], [`ConverterConfig`], config loading)

pub mod config;
pub mod converter;
pub mod error;
pub mod llm;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConverterConfig, ConvertersConfig, ModalitiesConfig, config_dir, config_file_path,
    load_config, load_config_from,
};
pub use converter::{DocumentConverter, ReadSeek, read_all, read_prefix};
pub use error::{
    AttemptOutcome, ConversionCause, ConversionError, FailedAttempt, MarkItUpError, Result,
};
pub use llm::{ImageUrl, LlmContentPart};
pub use types::{
    ConversionResult, DocumentMetadata, ExtractedTable, MediaAttachment, MediaReference, Priority,
    StreamInfo, normalize_extension,
};
