//! Clap derive structures for the `netpulse` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept free
//! of workspace crates so `build.rs` can include it for man page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netpulse -- layered connectivity diagnostics and fleet slowdown analysis
#[derive(Debug, Parser)]
#[command(
    name = "netpulse",
    version,
    about = "Diagnose network health on this host and across a fleet",
    long_about = "Runs a seven-layer connectivity diagnostic on the local host,\n\
        scores call quality with the E-Model, and finds sustained speed-test\n\
        slowdowns in recorded fleet telemetry.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "NETPULSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CodecArg {
    G711,
    G729,
    Opus,
    #[value(name = "g723.1", alias = "g7231")]
    G7231,
    G722,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the seven-layer diagnostic against this host
    #[command(alias = "diag")]
    Diagnose(DiagnoseArgs),

    /// Estimate call quality (MOS) from latency, jitter and loss
    #[command(alias = "mos")]
    Quality(QualityArgs),

    /// Find and explain slowdown incidents for one host
    Incidents(IncidentsArgs),

    /// Analyze every host in a telemetry file
    Fleet(FleetArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Diagnose ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiagnoseArgs {
    /// Label recorded as the report's host
    #[arg(long)]
    pub host_label: Option<String>,

    /// Exit with a distinct code when the overall status is fail
    #[arg(long)]
    pub fail_on_unhealthy: bool,
}

// ── Quality ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct QualityArgs {
    /// One-way latency in milliseconds
    #[arg(long)]
    pub latency: f64,

    /// Jitter in milliseconds
    #[arg(long, default_value = "0")]
    pub jitter: f64,

    /// Packet loss in percent (0-100)
    #[arg(long, default_value = "0")]
    pub loss: f64,

    /// Voice codec [default: from config, else g711]
    #[arg(long, conflicts_with = "simple")]
    pub codec: Option<CodecArg>,

    /// Codec-agnostic linear model
    #[arg(long)]
    pub simple: bool,
}

// ── Telemetry analysis ───────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WindowArgs {
    /// Telemetry file (JSON lines) [default: store.data_file from config]
    #[arg(long, short = 'd')]
    pub data: Option<PathBuf>,

    /// Hours of telemetry to analyze [default: from config]
    #[arg(long)]
    pub hours: Option<u32>,

    /// End of the window as RFC 3339 [default: now]
    #[arg(long)]
    pub until: Option<String>,
}

#[derive(Debug, Args)]
pub struct IncidentsArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Host to analyze
    #[arg(long)]
    pub host: String,
}

#[derive(Debug, Args)]
pub struct FleetArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Restrict to these hosts (repeatable) [default: every host in the file]
    #[arg(long = "host")]
    pub hosts: Vec<String>,

    /// Overall analysis deadline in seconds
    #[arg(long)]
    pub deadline: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a config file populated with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
