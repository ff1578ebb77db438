// ── Diagnostic report types ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outcome of a sub-test or a whole layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Pass,
    Warning,
    Fail,
    Blocked,
    Unknown,
}

impl Status {
    /// Share of a layer's weight earned towards the health score.
    pub fn contribution(self) -> f64 {
        match self {
            Self::Pass => 1.0,
            Self::Warning => 0.6,
            Self::Fail | Self::Blocked | Self::Unknown => 0.0,
        }
    }
}

/// The seven diagnostic layers, bottom-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Physical,
    DataLink,
    Network,
    Transport,
    Session,
    Presentation,
    Application,
}

impl Layer {
    pub const ALL: [Self; 7] = [
        Self::Physical,
        Self::DataLink,
        Self::Network,
        Self::Transport,
        Self::Session,
        Self::Presentation,
        Self::Application,
    ];

    pub fn number(self) -> u8 {
        match self {
            Self::Physical => 1,
            Self::DataLink => 2,
            Self::Network => 3,
            Self::Transport => 4,
            Self::Session => 5,
            Self::Presentation => 6,
            Self::Application => 7,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.number() == number)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Physical => "Physical",
            Self::DataLink => "Data Link",
            Self::Network => "Network",
            Self::Transport => "Transport",
            Self::Session => "Session",
            Self::Presentation => "Presentation",
            Self::Application => "Application",
        }
    }

    /// Health-score weight; the seven weights sum to 100.
    pub fn weight(self) -> u32 {
        match self {
            Self::Physical | Self::Network => 20,
            Self::DataLink | Self::Transport | Self::Application => 15,
            Self::Session => 5,
            Self::Presentation => 10,
        }
    }
}

/// One named sub-test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl TestResult {
    pub fn new(name: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            latency_ms: None,
            error: None,
            details: BTreeMap::new(),
        }
    }

    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Pass, message)
    }

    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Warning, message)
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Fail, message)
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_error(mut self, error: impl std::fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer_number: u8,
    pub layer_name: String,
    pub status: Status,
    pub tests: Vec<TestResult>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

/// Graded result of one diagnostic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub host: String,
    pub timestamp: DateTime<Utc>,
    pub overall_status: Status,
    pub health_score: u8,
    pub layers: Vec<LayerResult>,
    pub blocked_above: Option<u8>,
    pub duration_ms: u64,
}

impl DiagnosticReport {
    pub fn layer(&self, layer: Layer) -> Option<&LayerResult> {
        self.layers.iter().find(|l| l.layer_number == layer.number())
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status != Status::Fail
    }
}
