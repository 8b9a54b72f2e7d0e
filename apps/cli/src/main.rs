//! MarkItUp CLI: convert a file or stdin to markdown.
//!
//! Plugins linked into this binary are discovered at startup; they only
//! contribute converters when enabled by `--use-plugins` or the config file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

// The sample plugin registers itself with `inventory::submit!`; this alias
// keeps the crate linked into the binary.
#[allow(unused_imports)]
use markitup_sample_plugin as _sample_plugin_link;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
