//! Application configuration for MarkItUp.
//!
//! User config lives at `~/.markitup/markitup.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MarkItUpError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "markitup.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".markitup";

// ---------------------------------------------------------------------------
// Config structs (matching markitup.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Converter set selection.
    #[serde(default)]
    pub converters: ConvertersConfig,

    /// Which non-text modalities converters may emit.
    #[serde(default)]
    pub modalities: ModalitiesConfig,
}

/// `[converters]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertersConfig {
    /// Load converters from discovered plugins.
    #[serde(default)]
    pub enable_plugins: bool,

    /// Register the catch-all text converter.
    #[serde(default = "default_true")]
    pub catch_all: bool,

    /// Keep inline `data:` URIs for images found inside documents.
    #[serde(default = "default_true")]
    pub keep_data_uris: bool,
}

impl Default for ConvertersConfig {
    fn default() -> Self {
        Self {
            enable_plugins: false,
            catch_all: true,
            keep_data_uris: true,
        }
    }
}

/// `[modalities]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalitiesConfig {
    /// Emit images as inline data URIs.
    #[serde(default = "default_true")]
    pub image: bool,

    /// Forward audio as a media attachment.
    #[serde(default = "default_true")]
    pub audio: bool,
}

impl Default for ModalitiesConfig {
    fn default() -> Self {
        Self {
            image: true,
            audio: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Converter config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration handed to every converter constructor and plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Load plugin-supplied converters at facade construction.
    pub enable_plugins: bool,
    /// Register the catch-all text converter.
    pub catch_all: bool,
    /// Keep inline `data:` URIs inside converted documents.
    pub keep_data_uris: bool,
    /// Image modality enabled.
    pub image: bool,
    /// Audio modality enabled.
    pub audio: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ConverterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enable_plugins: config.converters.enable_plugins,
            catch_all: config.converters.catch_all,
            keep_data_uris: config.converters.keep_data_uris,
            image: config.modalities.image,
            audio: config.modalities.audio,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.markitup/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MarkItUpError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.markitup/markitup.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MarkItUpError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MarkItUpError::config(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("catch_all"));
        assert!(toml_str.contains("[modalities]"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[converters]
enable_plugins = true

[modalities]
audio = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.converters.enable_plugins);
        assert!(config.converters.catch_all);
        assert!(config.modalities.image);
        assert!(!config.modalities.audio);
    }

    #[test]
    fn converter_config_from_app_config() {
        let mut app = AppConfig::default();
        app.modalities.image = false;
        let conv = ConverterConfig::from(&app);
        assert!(!conv.image);
        assert!(conv.audio);
        assert!(!conv.enable_plugins);
        assert!(ConverterConfig::default().catch_all);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markitup.toml");
        std::fs::write(&path, "[converters\nbroken").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config_from(Path::new("/nonexistent/markitup.toml")).unwrap_err();
        assert!(matches!(err, MarkItUpError::Io { .. }));
    }
}
