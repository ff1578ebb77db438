// ── Probe outcome types ──
//
// Plain data returned by `Probe` implementations. Timings are wall-clock
// milliseconds measured around the operation.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of the host's primary network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub interface: String,
    pub is_up: bool,
    pub is_wireless: bool,
    pub mac: Option<String>,
    pub mtu: Option<u32>,
    pub ipv4: Vec<Ipv4Addr>,
    /// Global-scope IPv6 addresses only (link-local is excluded).
    pub ipv6_global: Vec<Ipv6Addr>,
    pub gateway: Option<IpAddr>,
    pub gateway_mac: Option<String>,
}

/// Point-in-time WiFi association state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSnapshot {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<f64>,
    pub snr: Option<f64>,
    pub channel: Option<u32>,
    /// Transmit bitrate in Mbit/s.
    pub tx_rate: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Latest latency reading published by a sibling ping collector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingSnapshot {
    pub latency_ms: f64,
    pub packet_loss_percent: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TcpOutcome {
    pub peer: SocketAddr,
    pub connect_ms: f64,
}

/// Negotiated TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
    Unknown,
}

impl TlsVersion {
    /// TLS 1.2 or newer.
    pub fn is_modern(self) -> bool {
        matches!(self, Self::Tls12 | Self::Tls13)
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Tls10 => "TLSv1.0",
            Self::Tls11 => "TLSv1.1",
            Self::Tls12 => "TLSv1.2",
            Self::Tls13 => "TLSv1.3",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsOutcome {
    pub version: TlsVersion,
    pub cipher: Option<String>,
    /// Leaf certificate `notAfter`, when it could be read.
    pub not_after: Option<DateTime<Utc>>,
    pub handshake_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsOutcome {
    pub name: String,
    pub addresses: Vec<Ipv4Addr>,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpOutcome {
    pub url: String,
    pub status: u16,
    pub elapsed_ms: f64,
}

/// Parameters for one ICMP echo run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    pub host: String,
    pub count: u32,
    /// Budget for the whole run, not per echo.
    pub timeout: Duration,
    pub payload_bytes: Option<u16>,
    pub dont_fragment: bool,
}

impl PingRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            count: 3,
            timeout: Duration::from_secs(5),
            payload_bytes: None,
            dont_fragment: false,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `payload` bytes with the don't-fragment bit set.
    pub fn path_mtu(mut self, payload: u16) -> Self {
        self.payload_bytes = Some(payload);
        self.dont_fragment = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingOutcome {
    pub host: String,
    pub transmitted: u32,
    pub received: u32,
    pub loss_percent: f64,
    pub rtt_min_ms: Option<f64>,
    pub rtt_avg_ms: Option<f64>,
    pub rtt_max_ms: Option<f64>,
}

impl PingOutcome {
    pub fn all_lost(&self) -> bool {
        self.received == 0
    }
}
