// ── Incident summary and recommendation templates ──
//
// Deterministic text keyed by connection type and the set of categories
// present on an incident. Rule order is fixed, so identical inputs always
// produce identical output.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::model::{AccessPoint, CandidateIncident, ConnectionType, FactorCategory};

pub fn recommendations(
    connection: ConnectionType,
    categories: &BTreeSet<FactorCategory>,
) -> Vec<String> {
    let wifi = connection == ConnectionType::Wifi;
    let has = |c: FactorCategory| categories.contains(&c);
    let mut out = Vec::new();

    if wifi && has(FactorCategory::WifiSignal) {
        out.push(
            "Weak WiFi signal: move closer / reduce obstructions between the device and the access point"
                .to_owned(),
        );
    }
    if wifi && has(FactorCategory::WifiQuality) {
        out.push(
            "Degraded link quality: check interference from neighbouring networks, microwaves and Bluetooth devices"
                .to_owned(),
        );
    }
    if has(FactorCategory::Interference) {
        out.push(
            "Low signal-to-noise ratio: change channel to a less congested one".to_owned(),
        );
    }
    if has(FactorCategory::WifiEvent) {
        out.push(
            "Disconnects or roaming during the slowdown: investigate stability of the access point and roaming settings"
                .to_owned(),
        );
    }
    if has(FactorCategory::InternetLatency) {
        out.push(
            "Elevated internet latency: check congestion on the local network and the upstream link"
                .to_owned(),
        );
        if wifi {
            out.push(
                "For latency-sensitive work, consider wired Ethernet instead of WiFi".to_owned(),
            );
        }
    }
    if has(FactorCategory::GatewayLatency) {
        out.push(
            "Slow gateway responses: router overloaded, restart it or reduce the load on it"
                .to_owned(),
        );
    }
    if has(FactorCategory::PacketLoss) {
        out.push(
            "Packet loss detected: check cabling/hardware, contact ISP if loss persists".to_owned(),
        );
    }

    // Nothing actionable, including WiFi-only factors on a non-WiFi link.
    if out.is_empty() {
        if connection == ConnectionType::Ethernet {
            out.push(
                "Wired connection with no local cause: check cable/port/switch".to_owned(),
            );
        }
        out.push(
            "No correlated cause found: monitor, may be transient ISP issue".to_owned(),
        );
    }
    out
}

pub fn summary(
    candidate: &CandidateIncident,
    connection: ConnectionType,
    access_point: Option<&AccessPoint>,
    categories: &BTreeSet<FactorCategory>,
) -> String {
    let minutes = (candidate.end_time - candidate.start_time).num_minutes();
    let mut text = format!(
        "Slowdown on {} for {} min ({} speed tests, avg {:.1} Mbps down / {:.1} Mbps up) over {}",
        candidate.host_id,
        minutes,
        candidate.samples.len(),
        candidate.avg_download,
        candidate.avg_upload,
        connection,
    );
    if let Some(ssid) = access_point.and_then(|ap| ap.ssid.as_deref()) {
        let _ = write!(text, " ({ssid})");
    }
    if categories.is_empty() {
        text.push_str(". No correlated cause found.");
    } else {
        let names: Vec<String> = categories.iter().map(ToString::to_string).collect();
        let _ = write!(text, ". Likely causes: {}.", names.join(", "));
    }
    text
}
