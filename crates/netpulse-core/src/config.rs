// ── Runtime analysis configuration ──
//
// Every tunable heuristic lives here as a named, serde-defaulted field.
// These types never touch disk; `netpulse-config` deserializes them from
// its TOML sections and hands them in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::Codec;

// ── Diagnostic engine ───────────────────────────────────────────────

/// One TCP endpoint probed by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpTarget {
    pub host: String,
    pub port: u16,
}

impl TcpTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn test_name(&self) -> String {
        format!("tcp_{}", self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticThresholds {
    pub rssi_fail_dbm: f64,
    pub rssi_warn_dbm: f64,
    pub ping_loss_warn_percent: f64,
    pub gateway_rtt_warn_ms: f64,
    pub external_rtt_warn_ms: f64,
    pub tcp_connect_warn_ms: f64,
    pub session_setup_warn_ms: f64,
    pub cert_expiry_warn_days: i64,
    pub dns_slow_ms: f64,
    pub http_slow_ms: f64,
}

impl Default for DiagnosticThresholds {
    fn default() -> Self {
        Self {
            rssi_fail_dbm: -80.0,
            rssi_warn_dbm: -70.0,
            ping_loss_warn_percent: 5.0,
            gateway_rtt_warn_ms: 20.0,
            external_rtt_warn_ms: 100.0,
            tcp_connect_warn_ms: 300.0,
            session_setup_warn_ms: 300.0,
            cert_expiry_warn_days: 14,
            dns_slow_ms: 500.0,
            http_slow_ms: 2000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    /// Label recorded in the report.
    pub host_label: String,
    pub external_ping_host: String,
    pub ping_count: u32,
    /// ICMP payload for the path-MTU probe (1472 + 28 header bytes = 1500).
    pub mtu_probe_payload: u16,
    pub tcp_targets: Vec<TcpTarget>,
    pub ipv6_target: TcpTarget,
    pub session_target: TcpTarget,
    pub session_attempts: u32,
    pub tls_host: String,
    pub tls_port: u16,
    pub dns_names: Vec<String>,
    pub http_url: String,
    /// Endpoint expected to answer `204 No Content` when no portal intercepts.
    pub captive_portal_url: String,
    pub subtest_timeout_ms: u64,
    pub run_deadline_ms: u64,
    pub wifi_cache_max_age_secs: i64,
    pub ping_cache_max_age_secs: i64,
    pub thresholds: DiagnosticThresholds,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            host_label: "localhost".into(),
            external_ping_host: "1.1.1.1".into(),
            ping_count: 3,
            mtu_probe_payload: 1472,
            tcp_targets: vec![TcpTarget::new("1.1.1.1", 443), TcpTarget::new("8.8.8.8", 53)],
            ipv6_target: TcpTarget::new("2606:4700:4700::1111", 443),
            session_target: TcpTarget::new("1.1.1.1", 443),
            session_attempts: 3,
            tls_host: "cloudflare.com".into(),
            tls_port: 443,
            dns_names: vec!["cloudflare.com".into(), "google.com".into()],
            http_url: "https://www.cloudflare.com/cdn-cgi/trace".into(),
            captive_portal_url: "http://connectivitycheck.gstatic.com/generate_204".into(),
            subtest_timeout_ms: 5_000,
            run_deadline_ms: 30_000,
            wifi_cache_max_age_secs: 300,
            ping_cache_max_age_secs: 15,
            thresholds: DiagnosticThresholds::default(),
        }
    }
}

impl DiagnosticConfig {
    pub const MIN_SUBTEST_TIMEOUT: Duration = Duration::from_secs(1);
    pub const MAX_SUBTEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Per-sub-test budget, clamped into 1..=10 s.
    pub fn subtest_timeout(&self) -> Duration {
        Duration::from_millis(self.subtest_timeout_ms)
            .clamp(Self::MIN_SUBTEST_TIMEOUT, Self::MAX_SUBTEST_TIMEOUT)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_millis(self.run_deadline_ms.max(1))
    }
}

// ── Incident detection ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub download_threshold_mbps: f64,
    pub upload_threshold_mbps: f64,
    pub min_streak: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            download_threshold_mbps: 20.0,
            upload_threshold_mbps: 5.0,
            min_streak: 3,
        }
    }
}

impl DetectorConfig {
    pub fn effective_min_streak(&self) -> usize {
        self.min_streak.max(1)
    }
}

// ── Incident correlation ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Widening of the incident window when collecting factors.
    pub factor_margin_mins: i64,
    /// BEFORE window is `[start - before_window, start - before_gap]`.
    pub before_window_mins: i64,
    pub before_gap_mins: i64,

    pub rssi_critical_dbm: f64,
    pub rssi_warning_dbm: f64,
    pub quality_warning: f64,
    pub snr_warning_db: f64,
    pub internet_latency_critical_ms: f64,
    pub internet_latency_warning_ms: f64,
    /// Lower bound of the informational gateway-latency band; the upper
    /// bound is `internet_latency_warning_ms`.
    pub gateway_latency_info_ms: f64,
    pub loss_critical_percent: f64,
    pub loss_warning_percent: f64,

    pub rssi_drop_significant_dbm: f64,
    pub quality_drop_significant_percent: f64,
    pub latency_increase_significant_ms: f64,
    pub loss_increase_significant_pp: f64,

    pub rssi_deadband_dbm: f64,
    pub quality_deadband: f64,
    pub latency_deadband_ms: f64,
    pub loss_deadband_pp: f64,

    /// Case-insensitive SSID substrings that mark a wired connection.
    pub wired_labels: Vec<String>,
    /// Case-insensitive message substrings that mark a WiFi event.
    pub event_keywords: Vec<String>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            factor_margin_mins: 5,
            before_window_mins: 15,
            before_gap_mins: 1,
            rssi_critical_dbm: -80.0,
            rssi_warning_dbm: -70.0,
            quality_warning: 50.0,
            snr_warning_db: 20.0,
            internet_latency_critical_ms: 200.0,
            internet_latency_warning_ms: 100.0,
            gateway_latency_info_ms: 20.0,
            loss_critical_percent: 20.0,
            loss_warning_percent: 5.0,
            rssi_drop_significant_dbm: 5.0,
            quality_drop_significant_percent: 15.0,
            latency_increase_significant_ms: 20.0,
            loss_increase_significant_pp: 2.0,
            rssi_deadband_dbm: 2.0,
            quality_deadband: 2.0,
            latency_deadband_ms: 5.0,
            loss_deadband_pp: 0.5,
            wired_labels: vec!["ethernet".into(), "wired".into()],
            event_keywords: vec!["disconnect".into(), "roam".into(), "switch".into()],
        }
    }
}

// ── Fleet rollup ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub default_window_hours: u32,
    /// Analysis deadline; `None` or `0` waits for every host.
    pub deadline_secs: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            default_window_hours: 24,
            deadline_secs: Some(60),
        }
    }
}

impl FleetConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

// ── Quality scoring ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub codec: Codec,
    /// E-Model advantage factor `A`.
    pub advantage_factor: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            codec: Codec::G711,
            advantage_factor: 0.0,
        }
    }
}
