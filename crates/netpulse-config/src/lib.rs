//! Shared configuration for the netpulse tools.
//!
//! One TOML file with a section per component, layered as serialized
//! defaults < file < `NETPULSE_*` environment (nested keys split on `__`,
//! e.g. `NETPULSE_DIAGNOSTIC__PING_COUNT=5`). The analysis sections
//! deserialize straight into the `netpulse_core` config types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use netpulse_core::{
    CorrelatorConfig, DetectorConfig, DiagnosticConfig, FleetConfig, QualityConfig,
};
use netpulse_probe::ProbeConfig;

pub const ENV_PREFIX: &str = "NETPULSE_";

pub const OUTPUT_FORMATS: [&str; 5] = ["table", "json", "json-compact", "yaml", "plain"];
pub const COLOR_MODES: [&str; 3] = ["auto", "always", "never"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub probe: ProbeSection,
    pub diagnostic: DiagnosticConfig,
    pub detector: DetectorConfig,
    pub correlator: CorrelatorConfig,
    pub fleet: FleetConfig,
    pub quality: QualityConfig,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// OS tools and HTTP client settings for the system probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeSection {
    pub ping_program: String,
    pub ip_program: String,
    pub iw_program: String,
    pub http_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for ProbeSection {
    fn default() -> Self {
        let probe = ProbeConfig::default();
        Self {
            ping_program: probe.ping_program,
            ip_program: probe.ip_program,
            iw_program: probe.iw_program,
            http_timeout_secs: probe.http_timeout.as_secs(),
            user_agent: None,
        }
    }
}

/// Where historical telemetry is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSection {
    /// JSON Lines file used when a command gets no `--data` flag.
    pub data_file: Option<PathBuf>,
}

impl Config {
    /// Translate the `[probe]` section into a `ProbeConfig`.
    pub fn probe_config(&self) -> ProbeConfig {
        let mut probe = ProbeConfig {
            http_timeout: Duration::from_secs(self.probe.http_timeout_secs.max(1)),
            ping_program: self.probe.ping_program.clone(),
            ip_program: self.probe.ip_program.clone(),
            iw_program: self.probe.iw_program.clone(),
            ..ProbeConfig::default()
        };
        if let Some(ref agent) = self.probe.user_agent {
            probe.user_agent.clone_from(agent);
        }
        probe
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !OUTPUT_FORMATS.contains(&self.defaults.output.as_str()) {
            return Err(ConfigError::validation(
                "defaults.output",
                format!(
                    "expected one of {}, got '{}'",
                    OUTPUT_FORMATS.join(", "),
                    self.defaults.output
                ),
            ));
        }
        if !COLOR_MODES.contains(&self.defaults.color.as_str()) {
            return Err(ConfigError::validation(
                "defaults.color",
                format!("expected auto, always or never, got '{}'", self.defaults.color),
            ));
        }

        let diag = &self.diagnostic;
        check_url("diagnostic.http_url", &diag.http_url)?;
        check_url("diagnostic.captive_portal_url", &diag.captive_portal_url)?;
        if diag.ping_count == 0 {
            return Err(ConfigError::validation("diagnostic.ping_count", "must be at least 1"));
        }
        if diag.session_attempts == 0 {
            return Err(ConfigError::validation(
                "diagnostic.session_attempts",
                "must be at least 1",
            ));
        }
        if diag.thresholds.rssi_fail_dbm > diag.thresholds.rssi_warn_dbm {
            return Err(ConfigError::validation(
                "diagnostic.thresholds.rssi_fail_dbm",
                "must not exceed rssi_warn_dbm",
            ));
        }

        for (field, value) in [
            ("detector.download_threshold_mbps", self.detector.download_threshold_mbps),
            ("detector.upload_threshold_mbps", self.detector.upload_threshold_mbps),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::validation(field, "must be a positive number"));
            }
        }

        let corr = &self.correlator;
        if corr.before_gap_mins >= corr.before_window_mins {
            return Err(ConfigError::validation(
                "correlator.before_gap_mins",
                "must be smaller than before_window_mins",
            ));
        }

        if !(0.0..=20.0).contains(&self.quality.advantage_factor) {
            return Err(ConfigError::validation(
                "quality.advantage_factor",
                "must be between 0 and 20",
            ));
        }
        Ok(())
    }
}

fn check_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(raw)
        .map_err(|e| ConfigError::validation(field, format!("invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::validation(
            field,
            format!("unsupported scheme '{other}', expected http or https"),
        )),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "netpulse", "netpulse").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("netpulse");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered provider stack for `path`.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate the config at `path` (missing files are fine).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Load from `explicit` or the platform config path.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file {} not found", path.display()),
                )));
            }
            load_config_from(path)
        }
        None => load_config_from(&config_path()),
    }
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config(None).unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_toml(cfg)?)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use netpulse_core::{Codec, TcpTarget};
    use pretty_assertions::assert_eq;

    fn to_figment(e: ConfigError) -> figment::Error {
        figment::Error::from(e.to_string())
    }

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn file_overrides_defaults_and_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "netpulse.toml",
                r#"
                [defaults]
                output = "json"

                [diagnostic]
                ping_count = 5
                dns_names = ["example.com"]
                tcp_targets = [{ host = "10.0.0.1", port = 22 }]

                [diagnostic.thresholds]
                rssi_warn_dbm = -65.0

                [quality]
                codec = "opus"
                "#,
            )?;
            jail.set_env("NETPULSE_DIAGNOSTIC__PING_COUNT", "7");
            jail.set_env("NETPULSE_DETECTOR__MIN_STREAK", "4");

            let cfg = load_config_from(Path::new("netpulse.toml")).map_err(to_figment)?;
            assert_eq!(cfg.defaults.output, "json");
            assert_eq!(cfg.defaults.color, "auto");
            assert_eq!(cfg.diagnostic.ping_count, 7);
            assert_eq!(cfg.diagnostic.dns_names, vec!["example.com"]);
            assert_eq!(cfg.diagnostic.tcp_targets, vec![TcpTarget::new("10.0.0.1", 22)]);
            assert!((cfg.diagnostic.thresholds.rssi_warn_dbm + 65.0).abs() < f64::EPSILON);
            assert!((cfg.diagnostic.thresholds.rssi_fail_dbm + 80.0).abs() < f64::EPSILON);
            assert_eq!(cfg.detector.min_streak, 4);
            assert_eq!(cfg.quality.codec, Codec::Opus);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("absent.toml")).map_err(to_figment)?;
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/netpulse.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn validation_names_the_field() {
        let mut cfg = Config::default();
        cfg.defaults.output = "xml".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("defaults.output"));

        let mut cfg = Config::default();
        cfg.diagnostic.captive_portal_url = "ftp://example.com/".into();
        assert!(cfg.validate().unwrap_err().to_string().contains("unsupported scheme"));

        let mut cfg = Config::default();
        cfg.correlator.before_gap_mins = 30;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation { .. })));

        let mut cfg = Config::default();
        cfg.detector.download_threshold_mbps = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_type_in_file_is_figment_error() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[diagnostic]\nping_count = \"lots\"\n")?;
            let err = load_config_from(Path::new("bad.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Figment(_)));
            Ok(())
        });
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.fleet.deadline_secs = None;
        cfg.store.data_file = Some("/var/lib/netpulse/telemetry.jsonl".into());
        cfg.quality.codec = Codec::G729;

        save_config(&cfg, &path).unwrap();
        let loaded: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();

        assert_eq!(loaded.store, cfg.store);
        assert_eq!(loaded.quality.codec, Codec::G729);
        assert_eq!(loaded.diagnostic, cfg.diagnostic);
    }

    #[test]
    fn probe_section_maps_to_probe_config() {
        let mut cfg = Config::default();
        cfg.probe.ping_program = "/usr/local/bin/ping".into();
        cfg.probe.http_timeout_secs = 0;
        cfg.probe.user_agent = Some("lab-agent/1".into());

        let probe = cfg.probe_config();
        assert_eq!(probe.ping_program, "/usr/local/bin/ping");
        assert_eq!(probe.http_timeout, Duration::from_secs(1));
        assert_eq!(probe.user_agent, "lab-agent/1");
    }
}
