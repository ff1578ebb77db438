//! Connectivity probes for netpulse host diagnostics.
//!
//! - **[`Probe`]**: the collaborator trait consumed by the diagnostic
//!   engine. Every method is a single bounded operation; implementations
//!   translate failures into [`ProbeError`] instead of panicking.
//!
//! - **[`SystemProbe`]**: the production implementation. TCP via tokio,
//!   TLS via tokio-rustls, DNS via the system resolver, HTTP via reqwest,
//!   ICMP and link state via OS utilities (`ping`, `ip -j`, `iw`).
//!
//! - **[`SnapshotCache`]**: latest WiFi / ping readings from sibling
//!   collectors, served through [`Probe::cached_wifi`] and
//!   [`Probe::cached_ping`].
//!
//! Output parsers for the OS utilities live in [`ping`] and [`link`] and
//! are pure functions.

pub mod cache;
pub mod error;
pub mod link;
pub mod ping;
pub mod system;
pub mod tls;
pub mod transport;
pub mod types;

use std::future::Future;
use std::time::Duration;

pub use cache::SnapshotCache;
pub use error::ProbeError;
pub use system::SystemProbe;
pub use transport::ProbeConfig;
pub use types::{
    DnsOutcome, HttpOutcome, LinkInfo, PingOutcome, PingRequest, PingSnapshot, TcpOutcome,
    TlsOutcome, TlsVersion, WifiSnapshot,
};

/// The probe collaborator.
///
/// `timeout` arguments are hard budgets: an implementation must return
/// (usually with [`ProbeError::Timeout`]) once they elapse.
pub trait Probe: Send + Sync {
    /// State of the primary interface (default route, addresses, gateway).
    fn link_info(&self) -> impl Future<Output = Result<LinkInfo, ProbeError>> + Send;

    /// Live WiFi association state. `Ok(None)` for wired or unassociated interfaces.
    fn wifi_status(
        &self,
        interface: &str,
    ) -> impl Future<Output = Result<Option<WifiSnapshot>, ProbeError>> + Send;

    fn tcp_connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<TcpOutcome, ProbeError>> + Send;

    fn tls_handshake(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<TlsOutcome, ProbeError>> + Send;

    /// Resolve IPv4 (A) records.
    fn resolve(
        &self,
        name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<DnsOutcome, ProbeError>> + Send;

    /// Single GET without following redirects.
    fn http_get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpOutcome, ProbeError>> + Send;

    fn ping(
        &self,
        request: &PingRequest,
    ) -> impl Future<Output = Result<PingOutcome, ProbeError>> + Send;

    /// Latest WiFi reading from a sibling collector, if any.
    fn cached_wifi(&self) -> Option<WifiSnapshot>;

    /// Latest ping reading from a sibling collector, if any.
    fn cached_ping(&self) -> Option<PingSnapshot>;
}
