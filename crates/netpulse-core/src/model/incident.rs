// ── Slowdown incident types ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::telemetry::SpeedTestSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionType {
    Wifi,
    Ethernet,
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// What a correlated factor or metric change points at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FactorCategory {
    WifiSignal,
    WifiQuality,
    Interference,
    WifiEvent,
    InternetLatency,
    GatewayLatency,
    PacketLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Increased,
    Decreased,
    Stable,
}

/// Dominant access point seen during an incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub channel: Option<u32>,
    pub avg_rssi: Option<f64>,
    pub avg_snr: Option<f64>,
    pub tx_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedFactor {
    pub category: FactorCategory,
    pub description: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
}

/// Before/during comparison of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric_name: String,
    pub category: FactorCategory,
    pub before_value: f64,
    pub during_value: f64,
    pub change_amount: f64,
    /// Relative to `before_value`; 0 when the baseline is 0.
    pub change_percent: f64,
    pub direction: Direction,
    pub is_significant: bool,
    pub description: String,
}

/// A sustained slow streak, before correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIncident {
    pub host_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub samples: Vec<SpeedTestSample>,
    pub avg_download: f64,
    pub avg_upload: f64,
    pub avg_ping: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowdownIncident {
    pub host_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub samples: Vec<SpeedTestSample>,
    pub avg_download: f64,
    pub avg_upload: f64,
    pub avg_ping: Option<f64>,
    pub connection_type: ConnectionType,
    pub access_point: Option<AccessPoint>,
    pub factors: Vec<CorrelatedFactor>,
    pub metric_changes: Vec<MetricChange>,
    pub trigger_factors: Vec<String>,
    pub summary: String,
    pub recommendations: Vec<String>,
}

impl SlowdownIncident {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}
