//! Shared helpers for command handlers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use netpulse_core::{MachineAnalyzer, MemoryStore, TimeWindow};

use crate::cli::WindowArgs;
use crate::error::CliError;

use super::Context;

/// The `--data` flag, else `[store] data_file`.
pub fn data_file(args: &WindowArgs, ctx: &Context) -> Result<PathBuf, CliError> {
    args.data
        .clone()
        .or_else(|| ctx.config.store.data_file.clone())
        .ok_or_else(|| CliError::NoDataFile {
            config_path: netpulse_config::config_path().display().to_string(),
        })
}

/// Load a JSON Lines telemetry file, reporting skipped records.
pub fn load_store(args: &WindowArgs, ctx: &Context) -> Result<(MemoryStore, PathBuf), CliError> {
    let path = data_file(args, ctx)?;
    let (store, stats) = MemoryStore::load_jsonl(&path)?;
    if stats.skipped > 0 {
        warn!(
            file = %path.display(),
            skipped = stats.skipped,
            "some telemetry records could not be parsed"
        );
    }
    info!(file = %path.display(), loaded = stats.loaded, hosts = store.len(), "telemetry loaded");
    Ok((store, path))
}

/// `--hours` ending at `--until` (or now).
pub fn window(args: &WindowArgs, ctx: &Context) -> Result<TimeWindow, CliError> {
    window_at(args, ctx.config.fleet.default_window_hours, Utc::now())
}

fn window_at(
    args: &WindowArgs,
    default_hours: u32,
    now: DateTime<Utc>,
) -> Result<TimeWindow, CliError> {
    let hours = args.hours.unwrap_or(default_hours);
    if hours == 0 {
        return Err(CliError::Validation {
            field: "hours".into(),
            reason: "must be at least 1".into(),
        });
    }
    let end = match args.until.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| CliError::Validation {
                field: "until".into(),
                reason: format!("expected an RFC 3339 timestamp ({e})"),
            })?
            .with_timezone(&Utc),
        None => now,
    };
    Ok(TimeWindow::ending_at(end, hours))
}

pub fn analyzer(ctx: &Context) -> MachineAnalyzer {
    MachineAnalyzer::new(ctx.config.detector.clone(), ctx.config.correlator.clone())
}
