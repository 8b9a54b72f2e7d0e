//! CLI definition, tracing setup, and the convert / list-plugins commands.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use markitup_core::{
    ConversionResult, ConverterConfig, InventoryDiscovery, MarkItUp, PluginInfo, StreamInfo,
    inspect_plugins,
};
use markitup_shared::{AppConfig, load_config, load_config_from};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MarkItUp: convert documents to markdown.
#[derive(Parser, Debug)]
#[command(
    name = "markitup",
    version,
    about = "Convert documents (PDF, DOCX, PPTX, XLSX, HTML, CSV, images, audio, text) to markdown.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// File to convert. Reads stdin when omitted.
    pub input: Option<PathBuf>,

    /// Write output here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "markdown")]
    pub format: OutputFormat,

    /// MIME type hint for the input.
    #[arg(short, long)]
    pub mime_type: Option<String>,

    /// Extension hint for the input (e.g. `.csv`).
    #[arg(short = 'x', long)]
    pub extension: Option<String>,

    /// Charset hint for text input.
    #[arg(short, long)]
    pub charset: Option<String>,

    /// Load converters from linked plugins.
    #[arg(short = 'p', long)]
    pub use_plugins: bool,

    /// List discovered plugins and exit.
    #[arg(long)]
    pub list_plugins: bool,

    /// Config file (defaults to ~/.markitup/markitup.toml).
    #[arg(long, env = "MARKITUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// What gets written for a successful conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// The markdown text only.
    Markdown,
    /// The whole conversion result.
    Json,
    /// LLM chat content parts.
    Llm,
}

impl Cli {
    /// Caller-supplied hints from the flags.
    fn hints(&self) -> StreamInfo {
        let mut hints = StreamInfo::default();
        if let Some(mime_type) = &self.mime_type {
            hints = hints.with_mime_type(mime_type.as_str());
        }
        if let Some(extension) = &self.extension {
            hints = hints.with_extension(extension);
        }
        if let Some(charset) = &self.charset {
            hints = hints.with_charset(charset.as_str());
        }
        hints
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for the converted document.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "markitup=warn",
        1 => "markitup=info",
        2 => "markitup=debug",
        _ => "markitup=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = converter_config(&cli)?;

    if cli.list_plugins {
        return cmd_list_plugins(&cli, &config);
    }
    cmd_convert(&cli, config)
}

/// Config file values, then flag overrides.
fn converter_config(cli: &Cli) -> Result<ConverterConfig> {
    let app: AppConfig = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let mut config = ConverterConfig::from(&app);
    if cli.use_plugins {
        config.enable_plugins = true;
    }
    debug!(?config, "resolved converter config");
    Ok(config)
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

fn cmd_convert(cli: &Cli, config: ConverterConfig) -> Result<()> {
    let markitup = MarkItUp::new(config)?;
    for plugin in markitup.plugins() {
        info!(plugin = %plugin.name, converters = ?plugin.converters, "plugin active");
    }

    let hints = cli.hints();
    let result = match &cli.input {
        Some(path) => markitup
            .convert_path(path, &hints)
            .wrap_err_with(|| format!("could not convert {}", path.display()))?,
        None => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .wrap_err("failed to read stdin")?;
            markitup
                .convert_bytes(&bytes, &hints)
                .wrap_err("could not convert stdin")?
        }
    };

    let rendered = render(&result, cli.format)?;
    write_output(cli.output.as_deref(), &rendered)
}

fn render(result: &ConversionResult, format: OutputFormat) -> Result<String> {
    let mut out = match format {
        OutputFormat::Markdown => result.markdown.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Llm => serde_json::to_string_pretty(&result.to_llm_parts())?,
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .map_err(|e| eyre!("failed to write {}: {e}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// list-plugins
// ---------------------------------------------------------------------------

fn cmd_list_plugins(cli: &Cli, config: &ConverterConfig) -> Result<()> {
    let plugins = inspect_plugins(&InventoryDiscovery, config);
    let rendered = if cli.format == OutputFormat::Markdown {
        plugin_table(&plugins)
    } else {
        serde_json::to_string_pretty(&plugins)? + "\n"
    };
    write_output(cli.output.as_deref(), &rendered)
}

fn plugin_table(plugins: &[PluginInfo]) -> String {
    if plugins.is_empty() {
        return "No plugins found.\n".to_string();
    }
    let mut out = String::new();
    for plugin in plugins {
        let status = if plugin.compatible {
            "compatible"
        } else {
            "incompatible"
        };
        out.push_str(&format!(
            "{:<20} v{:<3} {:<13} {}\n",
            plugin.name,
            plugin.interface_version,
            status,
            plugin.converters.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_hints() {
        let cli = Cli::try_parse_from([
            "markitup",
            "report.bin",
            "--mime-type",
            "text/csv",
            "-x",
            "csv",
            "--charset",
            "latin1",
        ])
        .unwrap();
        let hints = cli.hints();
        assert_eq!(hints.mime_type.as_deref(), Some("text/csv"));
        assert_eq!(hints.extension.as_deref(), Some(".csv"));
        assert_eq!(hints.charset.as_deref(), Some("latin1"));
        assert_eq!(cli.input, Some(PathBuf::from("report.bin")));
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["markitup"]).unwrap();
        assert!(cli.input.is_none());
        assert_eq!(cli.format, OutputFormat::Markdown);
        assert!(!cli.use_plugins);
        assert!(cli.hints().is_empty());
    }

    #[test]
    fn output_formats() {
        let result = ConversionResult::new("# Hi");
        assert_eq!(render(&result, OutputFormat::Markdown).unwrap(), "# Hi\n");
        let json = render(&result, OutputFormat::Json).unwrap();
        assert!(json.contains("\"markdown\": \"# Hi\""));
        let llm = render(&result, OutputFormat::Llm).unwrap();
        assert!(llm.contains("\"type\": \"text\""));
    }

    #[test]
    fn plugin_listing() {
        assert_eq!(plugin_table(&[]), "No plugins found.\n");
        let table = plugin_table(&[PluginInfo {
            name: "rtf".into(),
            interface_version: 1,
            compatible: true,
            converters: vec!["rtf".into()],
        }]);
        assert!(table.starts_with("rtf"));
        assert!(table.contains("compatible"));
    }
}
