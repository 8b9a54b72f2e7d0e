//! Converter registry, dispatch engine, plugin interface and the
//! [`MarkItUp`] facade.
//!
//! Plugin crates only need this crate: the converter contract and data model
//! from `markitup-shared` are re-exported here.

pub mod dispatch;
pub mod markitup;
pub mod plugin;
pub mod registry;

pub use dispatch::dispatch;
pub use markitup::MarkItUp;
pub use plugin::{
    InventoryDiscovery, PLUGIN_INTERFACE_VERSION, Plugin, PluginDiscovery, PluginInfo,
    PluginRegistration, StaticDiscovery, inspect_plugins, load_plugins,
};
pub use registry::{ConverterRegistrar, ConverterRegistry, RegistryEntry};

pub use markitup_shared::{
    AttemptOutcome, ConversionCause, ConversionError, ConversionResult, ConverterConfig,
    DocumentConverter, DocumentMetadata, ExtractedTable, FailedAttempt, MarkItUpError,
    MediaAttachment, MediaReference, Priority, ReadSeek, Result, StreamInfo, read_all,
    read_prefix,
};
