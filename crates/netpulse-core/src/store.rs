// ── Telemetry store ──
//
// The store is the boundary to wherever raw samples live. `MemoryStore`
// keeps them in a `DashMap` keyed by host and can be loaded from JSON
// Lines; persistent backends implement `TelemetryStore` elsewhere.

use std::io::BufRead;
use std::path::Path;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{HostTelemetry, TelemetrySample, TimeWindow};

/// Read access to historical telemetry.
pub trait TelemetryStore: Send + Sync + 'static {
    /// Every host with at least one record, sorted.
    fn hosts(&self) -> Result<Vec<String>, CoreError>;

    /// Samples for `host_id` inside `window`, each series ordered by time.
    /// Unknown hosts yield empty telemetry.
    fn query(&self, host_id: &str, window: &TimeWindow) -> Result<HostTelemetry, CoreError>;
}

/// Counters from a JSON Lines load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    hosts: DashMap<String, HostTelemetry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, host_id: &str, sample: TelemetrySample) {
        self.hosts
            .entry(host_id.to_owned())
            .or_default()
            .push(sample);
    }

    pub fn extend(&self, host_id: &str, samples: impl IntoIterator<Item = TelemetrySample>) {
        let mut entry = self.hosts.entry(host_id.to_owned()).or_default();
        for sample in samples {
            entry.push(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a JSON Lines file: one `{"host_id", "type", "timestamp", ...}`
    /// record per line.
    pub fn load_jsonl(path: &Path) -> Result<(Self, LoadStats), CoreError> {
        let file = std::fs::File::open(path).map_err(|e| CoreError::Store {
            message: format!("cannot open {}: {e}", path.display()),
        })?;
        let store = Self::new();
        let stats = store.ingest(std::io::BufReader::new(file))?;
        debug!(
            path = %path.display(),
            loaded = stats.loaded,
            skipped = stats.skipped,
            "telemetry file read"
        );
        Ok((store, stats))
    }

    /// Ingest JSON Lines records. Malformed records are skipped with a
    /// warning; only read failures abort.
    pub fn ingest(&self, reader: impl BufRead) -> Result<LoadStats, CoreError> {
        let mut stats = LoadStats::default();
        for (index, raw) in reader.split(b'\n').enumerate() {
            let raw = raw?;
            let Ok(line) = std::str::from_utf8(&raw) else {
                warn!(line = index + 1, "skipping telemetry record with invalid UTF-8");
                stats.skipped += 1;
                continue;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_record(trimmed) {
                Ok((host_id, sample)) => {
                    self.insert(&host_id, sample);
                    stats.loaded += 1;
                }
                Err(reason) => {
                    warn!(line = index + 1, %reason, "skipping malformed telemetry record");
                    stats.skipped += 1;
                }
            }
        }
        Ok(stats)
    }
}

fn parse_record(line: &str) -> Result<(String, TelemetrySample), String> {
    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let host_id = value
        .get("host_id")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| "missing host_id".to_owned())?
        .to_owned();
    let sample = serde_json::from_value(value).map_err(|e| e.to_string())?;
    Ok((host_id, sample))
}

impl TelemetryStore for MemoryStore {
    fn hosts(&self) -> Result<Vec<String>, CoreError> {
        let mut hosts: Vec<String> = self.hosts.iter().map(|e| e.key().clone()).collect();
        hosts.sort();
        Ok(hosts)
    }

    fn query(&self, host_id: &str, window: &TimeWindow) -> Result<HostTelemetry, CoreError> {
        Ok(self
            .hosts
            .get(host_id)
            .map(|entry| entry.value().within(window))
            .unwrap_or_default())
    }
}
