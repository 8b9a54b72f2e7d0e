//! The `MarkItUp` facade: probe, then dispatch.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use markitup_converters::builtin_converters;
use markitup_probe::probe;
use markitup_shared::{
    ConversionResult, ConverterConfig, DocumentConverter, Priority, ReadSeek, Result, StreamInfo,
    MarkItUpError,
};

use crate::dispatch::dispatch;
use crate::plugin::{InventoryDiscovery, PluginDiscovery, PluginInfo, load_plugins};
use crate::registry::{ConverterRegistrar, ConverterRegistry};

/// Converts streams, byte buffers and files to markdown.
///
/// Shareable across threads once built; registering more converters needs
/// `&mut self`.
#[derive(Debug)]
pub struct MarkItUp {
    config: ConverterConfig,
    registry: ConverterRegistry,
    plugins: Vec<PluginInfo>,
}

impl MarkItUp {
    /// Built-in converters, plus link-time plugins when
    /// `config.enable_plugins` is set.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        let mut this = Self::builtins_only(config)?;
        if this.config.enable_plugins {
            this.plugins = load_plugins(&mut this.registry, &InventoryDiscovery, &this.config)?;
        }
        Ok(this)
    }

    /// Built-in converters plus every plugin `discovery` finds, regardless of
    /// `config.enable_plugins`.
    pub fn with_discovery(config: ConverterConfig, discovery: &dyn PluginDiscovery) -> Result<Self> {
        let mut this = Self::builtins_only(config)?;
        this.plugins = load_plugins(&mut this.registry, discovery, &this.config)?;
        Ok(this)
    }

    fn builtins_only(config: ConverterConfig) -> Result<Self> {
        let mut registry = ConverterRegistry::new();
        for converter in builtin_converters(&config) {
            registry.register(converter, None)?;
        }
        debug!(converters = registry.len(), "built-in converters registered");
        Ok(Self {
            config,
            registry,
            plugins: Vec::new(),
        })
    }

    /// Add a converter. `None` uses the converter's declared tier.
    pub fn register_converter(
        &mut self,
        converter: Arc<dyn DocumentConverter>,
        priority: Option<Priority>,
    ) -> Result<()> {
        self.registry.register(converter, priority)
    }

    /// Convert from the stream's current position.
    ///
    /// The result's `stream_info` is the guess that succeeded.
    #[instrument(skip_all)]
    pub fn convert_stream(
        &self,
        stream: &mut dyn ReadSeek,
        hints: &StreamInfo,
    ) -> Result<ConversionResult> {
        let guesses = probe(stream, hints)?;
        dispatch(&self.registry, stream, &guesses)
    }

    pub fn convert_bytes(&self, bytes: &[u8], hints: &StreamInfo) -> Result<ConversionResult> {
        self.convert_stream(&mut Cursor::new(bytes), hints)
    }

    /// Convert a local file.
    ///
    /// The file name and path become hints; the extension is left for the
    /// probe to derive so content sniffing still gets its say. Explicit
    /// `hints` override both.
    pub fn convert_path(&self, path: impl AsRef<Path>, hints: &StreamInfo) -> Result<ConversionResult> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MarkItUpError::io(path, e))?;

        let mut path_hints = StreamInfo::default().with_local_path(path);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            path_hints = path_hints.with_filename(name);
        }
        self.convert_stream(&mut BufReader::new(file), &path_hints.merged_with(hints))
    }

    /// The ordered guesses the probe would produce, without converting.
    pub fn stream_info_guesses(
        &self,
        stream: &mut dyn ReadSeek,
        hints: &StreamInfo,
    ) -> Result<Vec<StreamInfo>> {
        Ok(probe(stream, hints)?)
    }

    /// Plugins loaded at construction.
    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }

    /// Converter names in trial order.
    pub fn converter_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn facade_is_shareable() {
        assert_send_sync::<MarkItUp>();
    }

    #[test]
    fn default_facade_has_builtins() {
        let md = MarkItUp::new(ConverterConfig::default()).unwrap();
        assert_eq!(
            md.converter_names(),
            [
                "docx", "pptx", "xlsx", "xls", "pdf", "html", "csv", "image", "audio",
                "plain-text", "catch-all"
            ]
        );
        assert!(md.plugins().is_empty());
    }

    #[test]
    fn bytes_round_through_probe_and_dispatch() {
        let md = MarkItUp::new(ConverterConfig::default()).unwrap();
        let result = md
            .convert_bytes(b"name,qty\npear,2\n", &StreamInfo::default().with_extension("csv"))
            .unwrap();
        assert_eq!(result.markdown, "| name | qty |\n| --- | --- |\n| pear | 2 |");
        assert_eq!(result.stream_info.mime_type.as_deref(), Some("text/csv"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let md = MarkItUp::new(ConverterConfig::default()).unwrap();
        let err = md
            .convert_path("/definitely/not/here.txt", &StreamInfo::default())
            .unwrap_err();
        assert!(matches!(err, MarkItUpError::Io { .. }));
    }
}
