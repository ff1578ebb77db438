//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use netpulse_config::ConfigError;
use netpulse_core::CoreError;
use netpulse_probe::ProbeError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const DATA: i32 = 4;
    pub const TIMEOUT: i32 = 5;
    pub const UNHEALTHY: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(netpulse::validation))]
    Validation { field: String, reason: String },

    // ── Telemetry data ───────────────────────────────────────────────
    #[error("No telemetry file given")]
    #[diagnostic(
        code(netpulse::no_data_file),
        help(
            "Pass --data FILE, or set data_file under [store] in the config.\n\
             Config file: {config_path}"
        )
    )]
    NoDataFile { config_path: String },

    #[error("Host '{host}' has no records in {file}")]
    #[diagnostic(
        code(netpulse::unknown_host),
        help("Hosts present: {available}")
    )]
    UnknownHost {
        host: String,
        file: String,
        available: String,
    },

    #[error(transparent)]
    #[diagnostic(
        code(netpulse::data),
        help("Check that the telemetry file exists and is readable.")
    )]
    Core(#[from] CoreError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(netpulse::config_exists),
        help("Use --force to overwrite it, or edit it directly.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(netpulse::config),
        help("Run: netpulse config show  to inspect the effective configuration")
    )]
    Config(#[from] ConfigError),

    // ── Probe ────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(netpulse::probe))]
    Probe(#[from] ProbeError),

    // ── Diagnostic outcome ───────────────────────────────────────────
    #[error("Host '{host}' is unhealthy (health score {health_score})")]
    #[diagnostic(
        code(netpulse::unhealthy),
        help("The lowest failing layer is listed in the report above.")
    )]
    Unhealthy { host: String, health_score: u8 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(netpulse::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    #[diagnostic(code(netpulse::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NoDataFile { .. } => exit_code::USAGE,
            Self::ConfigExists { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::UnknownHost { .. } | Self::Core(_) => exit_code::DATA,
            Self::Probe(e) if e.is_timeout() => exit_code::TIMEOUT,
            Self::Unhealthy { .. } => exit_code::UNHEALTHY,
            Self::Probe(_) | Self::Io(_) | Self::Json(_) | Self::Yaml(_) => exit_code::GENERAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let usage = CliError::NoDataFile {
            config_path: "/tmp/x".into(),
        };
        assert_eq!(usage.exit_code(), exit_code::USAGE);

        let timeout = CliError::Probe(ProbeError::Timeout {
            operation: "tcp connect".into(),
            timeout_ms: 500,
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let unhealthy = CliError::Unhealthy {
            host: "lab".into(),
            health_score: 35,
        };
        assert_eq!(unhealthy.exit_code(), exit_code::UNHEALTHY);

        let store = CliError::Core(CoreError::Store {
            message: "gone".into(),
        });
        assert_eq!(store.exit_code(), exit_code::DATA);
    }
}
