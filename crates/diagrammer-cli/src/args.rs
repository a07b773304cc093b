//! Command-line argument definitions for the `diagrammer` command.

use clap::Parser;

/// Generate a diagram from a use case description
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Diagram type: flowchart, sequence, er or usecase
    pub diagram_type: String,

    /// File holding the use case text; reads stdin when omitted or `-`
    pub input: Option<String>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// LLM provider, overriding config and saved settings
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name, overriding config and saved settings
    #[arg(long)]
    pub model: Option<String>,

    /// Attempts per LLM task
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Skip the evaluate and regenerate pass
    #[arg(long)]
    pub no_evaluate: bool,

    /// Write the validated model as JSON instead of markup
    #[arg(long)]
    pub json: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
