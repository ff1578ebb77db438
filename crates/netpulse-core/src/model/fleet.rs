// ── Fleet rollup types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::incident::SlowdownIncident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MachineStatus {
    /// Speed tests present, no incidents.
    Ok,
    /// At least one incident.
    Degraded,
    /// No speed tests in the window.
    NoData,
    /// Analysis did not finish before the fleet deadline.
    TimedOut,
    /// The store could not be queried for this host.
    Error,
}

impl MachineStatus {
    /// Whether the host counts towards the fleet rollup.
    pub fn is_analyzed(self) -> bool {
        matches!(self, Self::Ok | Self::Degraded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineReport {
    pub host_id: String,
    pub status: MachineStatus,
    pub samples_analyzed: usize,
    pub avg_download: Option<f64>,
    pub avg_upload: Option<f64>,
    pub avg_ping: Option<f64>,
    pub incident_count: usize,
    pub incidents: Vec<SlowdownIncident>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MachineReport {
    /// A report carrying only a status marker.
    pub fn marker(host_id: impl Into<String>, status: MachineStatus) -> Self {
        Self {
            host_id: host_id.into(),
            status,
            samples_analyzed: 0,
            avg_download: None,
            avg_upload: None,
            avg_ping: None,
            incident_count: 0,
            incidents: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub avg_download: Option<f64>,
    pub avg_upload: Option<f64>,
    pub avg_ping: Option<f64>,
    pub health_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    pub analysis_time: DateTime<Utc>,
    pub period_hours: f64,
    pub total_machines: usize,
    pub machines_analyzed: usize,
    pub machines_with_issues: usize,
    pub total_incidents: usize,
    pub machine_reports: Vec<MachineReport>,
    pub fleet_summary: FleetSummary,
}
