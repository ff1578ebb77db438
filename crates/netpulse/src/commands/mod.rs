//! Command dispatch and the shared per-invocation context.

pub mod config_cmd;
pub mod diagnose;
pub mod fleet;
pub mod incidents;
pub mod quality;
pub mod util;

use clap::ValueEnum;

use netpulse_config::Config;

use crate::cli::{ColorMode, Command, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Painter};

/// Loaded config plus the resolved presentation settings.
pub struct Context {
    pub config: Config,
    pub output: OutputFormat,
    pub painter: Painter,
    pub quiet: bool,
}

impl Context {
    /// Flags win over the `[defaults]` section.
    pub fn new(config: Config, global: &GlobalOpts) -> Self {
        let output = global
            .output
            .or_else(|| OutputFormat::from_str(&config.defaults.output, true).ok())
            .unwrap_or(OutputFormat::Table);
        let color = global
            .color
            .or_else(|| ColorMode::from_str(&config.defaults.color, true).ok())
            .unwrap_or(ColorMode::Auto);
        Self {
            config,
            output,
            painter: Painter::new(output::should_color(color)),
            quiet: global.quiet,
        }
    }

    pub fn print(&self, rendered: &str) {
        output::print_output(rendered, self.quiet);
    }
}

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Diagnose(args) => diagnose::handle(args, ctx).await,
        Command::Quality(args) => quality::handle(&args, ctx),
        Command::Incidents(args) => incidents::handle(args, ctx),
        Command::Fleet(args) => fleet::handle(&args, ctx).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
