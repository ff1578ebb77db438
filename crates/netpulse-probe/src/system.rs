// ── Production probe ──
//
// Talks to the real network stack and OS utilities. Every operation is
// bounded by the caller's timeout; spawned tools are killed when their
// future is dropped.

use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

use crate::cache::SnapshotCache;
use crate::error::ProbeError;
use crate::link::{parse_interfaces, parse_iw_link, parse_neighbors, parse_routes, select_link};
use crate::ping::{PingFlavor, parse_ping_output, ping_args};
use crate::transport::ProbeConfig;
use crate::types::{
    DnsOutcome, HttpOutcome, LinkInfo, PingOutcome, PingRequest, PingSnapshot, TcpOutcome,
    TlsOutcome, WifiSnapshot,
};
use crate::{Probe, tls};

/// Budget for local link-state tools (`ip`, `iw`).
const TOOL_TIMEOUT: Duration = Duration::from_secs(5);
/// Extra time granted to `ping` beyond its own deadline flag.
const PING_GRACE: Duration = Duration::from_secs(2);

/// [`Probe`] backed by the host's network stack.
///
/// Cheap to share behind an `Arc`; the HTTP client and TLS config are
/// built once in [`SystemProbe::new`].
pub struct SystemProbe {
    config: ProbeConfig,
    http: reqwest::Client,
    tls: Arc<ClientConfig>,
    cache: Arc<SnapshotCache>,
    flavor: PingFlavor,
}

impl SystemProbe {
    pub fn new(config: ProbeConfig) -> Result<Self, ProbeError> {
        let http = config.build_http_client()?;
        let tls = config.build_tls_config()?;
        Ok(Self {
            config,
            http,
            tls,
            cache: Arc::new(SnapshotCache::new()),
            flavor: PingFlavor::host(),
        })
    }

    /// Share a cache that sibling collectors write into.
    pub fn with_cache(mut self, cache: Arc<SnapshotCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    async fn run_tool(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, ProbeError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program, ?args, "running tool");
        tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| ProbeError::timeout(format!("`{program}`"), timeout))?
            .map_err(|e| ProbeError::Command {
                command: program.into(),
                reason: e.to_string(),
            })
    }

    /// Run a tool that must exit successfully; returns its stdout.
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        let output = self.run_tool(program, &args, TOOL_TIMEOUT).await?;
        if !output.status.success() {
            return Err(ProbeError::Command {
                command: format!("{program} {}", args.join(" ")),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Probe for SystemProbe {
    async fn link_info(&self) -> Result<LinkInfo, ProbeError> {
        let ip = self.config.ip_program.as_str();
        let routes =
            parse_routes(&self.run_checked(ip, &["-j", "route", "show", "default"]).await?)?;
        let interfaces = parse_interfaces(&self.run_checked(ip, &["-j", "addr", "show"]).await?)?;
        // The neighbour table only feeds the optional gateway MAC.
        let neighbors = match self.run_checked(ip, &["-j", "neigh", "show"]).await {
            Ok(out) => parse_neighbors(&out).unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "neighbour table unavailable");
                Vec::new()
            }
        };

        let mut link = select_link(&routes, &interfaces, &neighbors)
            .ok_or_else(|| ProbeError::parse("ip addr output", "no usable network interface"))?;
        let wireless_marker = self.config.sysfs_net.join(&link.interface).join("wireless");
        link.is_wireless = tokio::fs::try_exists(&wireless_marker).await.unwrap_or(false);
        Ok(link)
    }

    async fn wifi_status(&self, interface: &str) -> Result<Option<WifiSnapshot>, ProbeError> {
        let out = self
            .run_checked(&self.config.iw_program, &["dev", interface, "link"])
            .await?;
        parse_iw_link(&out, Utc::now())
    }

    async fn tcp_connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<TcpOutcome, ProbeError> {
        let started = Instant::now();
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ProbeError::timeout(format!("TCP connect to {host}:{port}"), timeout))?
            .map_err(|e| ProbeError::Connect {
                target: format!("{host}:{port}"),
                reason: e.to_string(),
            })?;
        let connect_ms = started.elapsed().as_secs_f64() * 1000.0;
        Ok(TcpOutcome {
            peer: stream.peer_addr()?,
            connect_ms,
        })
    }

    async fn tls_handshake(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<TlsOutcome, ProbeError> {
        tls::handshake(Arc::clone(&self.tls), host, port, timeout).await
    }

    async fn resolve(&self, name: &str, timeout: Duration) -> Result<DnsOutcome, ProbeError> {
        let started = Instant::now();
        let addrs = tokio::time::timeout(timeout, tokio::net::lookup_host((name, 0)))
            .await
            .map_err(|_| ProbeError::timeout(format!("DNS lookup for {name}"), timeout))?
            .map_err(|e| ProbeError::Dns {
                name: name.into(),
                reason: e.to_string(),
            })?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut addresses = Vec::new();
        for addr in addrs {
            if let std::net::IpAddr::V4(v4) = addr.ip() {
                if !addresses.contains(&v4) {
                    addresses.push(v4);
                }
            }
        }
        if addresses.is_empty() {
            return Err(ProbeError::Dns {
                name: name.into(),
                reason: "no A records".into(),
            });
        }

        Ok(DnsOutcome {
            name: name.into(),
            addresses,
            elapsed_ms,
        })
    }

    async fn http_get(&self, url: &str, timeout: Duration) -> Result<HttpOutcome, ProbeError> {
        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::timeout(format!("GET {url}"), timeout)
                } else {
                    ProbeError::Http(e)
                }
            })?;
        Ok(HttpOutcome {
            url: url.into(),
            status: response.status().as_u16(),
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    async fn ping(&self, request: &PingRequest) -> Result<PingOutcome, ProbeError> {
        let args = ping_args(request, self.flavor);
        let output = self
            .run_tool(&self.config.ping_program, &args, request.timeout + PING_GRACE)
            .await?;

        // ping exits non-zero when replies are lost; the summary is still valid.
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ping_output(&request.host, &stdout).map_err(|parse_err| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                parse_err
            } else {
                ProbeError::Command {
                    command: self.config.ping_program.clone(),
                    reason: stderr.to_owned(),
                }
            }
        })
    }

    fn cached_wifi(&self) -> Option<WifiSnapshot> {
        self.cache.wifi()
    }

    fn cached_ping(&self) -> Option<PingSnapshot> {
        self.cache.ping()
    }
}
