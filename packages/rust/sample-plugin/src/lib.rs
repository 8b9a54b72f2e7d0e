//! Sample MarkItUp plugin contributing an RTF converter.
//!
//! Linking this crate into a binary is enough for
//! [`markitup_core::InventoryDiscovery`] to find it; the converter is only
//! registered when plugins are enabled.

pub mod rtf;

use std::sync::Arc;

use markitup_core::{
    ConverterConfig, ConverterRegistrar, PLUGIN_INTERFACE_VERSION, Plugin, PluginRegistration,
    Result,
};

pub use rtf::{RtfConverter, RtfDocument, parse_rtf};

/// Registration name, also reported as the plugin name.
pub const PLUGIN_NAME: &str = "rtf";

#[derive(Debug, Default)]
pub struct SamplePlugin;

impl Plugin for SamplePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn interface_version(&self) -> u32 {
        PLUGIN_INTERFACE_VERSION
    }

    fn register_converters(
        &self,
        registrar: &mut dyn ConverterRegistrar,
        _config: &ConverterConfig,
    ) -> Result<()> {
        registrar.register(Arc::new(RtfConverter::new()), None)
    }
}

fn load() -> Box<dyn Plugin> {
    Box::new(SamplePlugin)
}

inventory::submit! {
    PluginRegistration::new(PLUGIN_NAME, load)
}
