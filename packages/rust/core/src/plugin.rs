//! Plugin interface and discovery.
//!
//! A plugin contributes converters through a [`ConverterRegistrar`]. Plugins
//! are found by a [`PluginDiscovery`] strategy:
//! - [`InventoryDiscovery`] collects plugins that linked themselves in with
//!   `inventory::submit!` and a [`PluginRegistration`]
//! - [`StaticDiscovery`] returns an explicit list
//!
//! Registration is all-or-nothing per plugin: converters are staged and only
//! committed once `register_converters` returns `Ok`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use markitup_shared::{ConverterConfig, DocumentConverter, MarkItUpError, Priority, Result};

use crate::registry::{ConverterRegistrar, ConverterRegistry, same_instance};

/// The plugin interface version this engine speaks.
pub const PLUGIN_INTERFACE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Plugin trait
// ---------------------------------------------------------------------------

/// A bundle of converters supplied from outside the engine.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Must equal [`PLUGIN_INTERFACE_VERSION`] for the plugin to load.
    fn interface_version(&self) -> u32;

    /// Register this plugin's converters.
    ///
    /// `config` is the same configuration the built-in converters were built
    /// from.
    fn register_converters(
        &self,
        registrar: &mut dyn ConverterRegistrar,
        config: &ConverterConfig,
    ) -> Result<()>;
}

/// What a loaded (or inspected) plugin looks like from the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub interface_version: u32,
    /// Whether the declared interface version is supported.
    pub compatible: bool,
    /// Names of the converters the plugin contributes.
    pub converters: Vec<String>,
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Strategy for finding plugins.
pub trait PluginDiscovery {
    fn discover(&self) -> Vec<Arc<dyn Plugin>>;
}

/// Link-time registration record. Plugin crates submit one of these:
///
/// ```ignore
/// fn load() -> Box<dyn Plugin> { Box::new(MyPlugin) }
/// inventory::submit! { PluginRegistration::new("my-plugin", load) }
/// ```
pub struct PluginRegistration {
    name: &'static str,
    load: fn() -> Box<dyn Plugin>,
}

impl PluginRegistration {
    pub const fn new(name: &'static str, load: fn() -> Box<dyn Plugin>) -> Self {
        Self { name, load }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Instantiate the plugin.
    pub fn load(&self) -> Box<dyn Plugin> {
        (self.load)()
    }
}

inventory::collect!(PluginRegistration);

/// Discovers every plugin registered with `inventory::submit!` in the
/// final binary, sorted by registration name.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryDiscovery;

impl PluginDiscovery for InventoryDiscovery {
    fn discover(&self) -> Vec<Arc<dyn Plugin>> {
        let mut registrations: Vec<&PluginRegistration> =
            inventory::iter::<PluginRegistration>.into_iter().collect();
        registrations.sort_by_key(|r| r.name());
        debug!(count = registrations.len(), "plugins discovered via inventory");
        registrations
            .into_iter()
            .map(|r| Arc::from(r.load()))
            .collect()
    }
}

/// An explicit plugin list.
#[derive(Default, Clone)]
pub struct StaticDiscovery {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl StaticDiscovery {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }
}

impl PluginDiscovery for StaticDiscovery {
    fn discover(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.clone()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Collects a plugin's registrations without touching the live registry.
struct StagingRegistrar<'a> {
    committed: &'a ConverterRegistry,
    staged: Vec<(Arc<dyn DocumentConverter>, Option<Priority>)>,
}

impl ConverterRegistrar for StagingRegistrar<'_> {
    fn register(
        &mut self,
        converter: Arc<dyn DocumentConverter>,
        priority: Option<Priority>,
    ) -> Result<()> {
        let duplicate = self.committed.contains(&converter)
            || self.staged.iter().any(|(c, _)| same_instance(c, &converter));
        if duplicate {
            return Err(MarkItUpError::DuplicateRegistration {
                converter: converter.name().to_string(),
            });
        }
        self.staged.push((converter, priority));
        Ok(())
    }
}

/// Load every discovered plugin into `registry`.
///
/// Stops at the first plugin that is incompatible or fails to register;
/// that plugin contributes nothing.
pub fn load_plugins(
    registry: &mut ConverterRegistry,
    discovery: &dyn PluginDiscovery,
    config: &ConverterConfig,
) -> Result<Vec<PluginInfo>> {
    let mut loaded = Vec::new();
    for plugin in discovery.discover() {
        loaded.push(load_plugin(registry, plugin.as_ref(), config)?);
    }
    Ok(loaded)
}

fn load_plugin(
    registry: &mut ConverterRegistry,
    plugin: &dyn Plugin,
    config: &ConverterConfig,
) -> Result<PluginInfo> {
    let name = plugin.name().to_string();
    let declared = plugin.interface_version();
    if declared != PLUGIN_INTERFACE_VERSION {
        warn!(plugin = %name, declared, "incompatible plugin interface version");
        return Err(MarkItUpError::IncompatiblePlugin {
            plugin: name,
            declared,
            supported: PLUGIN_INTERFACE_VERSION,
        });
    }

    let mut staging = StagingRegistrar {
        committed: registry,
        staged: Vec::new(),
    };
    plugin
        .register_converters(&mut staging, config)
        .map_err(|e| match e {
            MarkItUpError::DuplicateRegistration { .. } | MarkItUpError::IncompatiblePlugin { .. } => e,
            other => MarkItUpError::config(format!("plugin '{name}' failed to register: {other}")),
        })?;

    let staged = staging.staged;
    let converters: Vec<String> = staged.iter().map(|(c, _)| c.name().to_string()).collect();
    for (converter, priority) in staged {
        registry.register(converter, priority)?;
    }
    info!(plugin = %name, converters = ?converters, "plugin loaded");

    Ok(PluginInfo {
        name,
        interface_version: declared,
        compatible: true,
        converters,
    })
}

/// Describe discovered plugins without loading them into a live registry.
///
/// Incompatible plugins are listed with no converters; a plugin whose
/// registration fails is listed as compatible with no converters.
pub fn inspect_plugins(discovery: &dyn PluginDiscovery, config: &ConverterConfig) -> Vec<PluginInfo> {
    discovery
        .discover()
        .iter()
        .map(|plugin| {
            let interface_version = plugin.interface_version();
            let compatible = interface_version == PLUGIN_INTERFACE_VERSION;
            let converters = if compatible {
                let scratch = ConverterRegistry::new();
                let mut staging = StagingRegistrar {
                    committed: &scratch,
                    staged: Vec::new(),
                };
                match plugin.register_converters(&mut staging, config) {
                    Ok(()) => staging.staged.iter().map(|(c, _)| c.name().to_string()).collect(),
                    Err(e) => {
                        warn!(plugin = plugin.name(), error = %e, "plugin registration failed");
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };
            PluginInfo {
                name: plugin.name().to_string(),
                interface_version,
                compatible,
                converters,
            }
        })
        .collect()
}
