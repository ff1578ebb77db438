// ── Sub-tests, layer by layer ──
//
// Each layer function runs its sub-tests concurrently through
// `RunContext::guard` and returns them in a fixed order. Sub-test bodies
// only grade probe outcomes; timeouts and cancellation are the guard's job.

use chrono::Utc;
use futures_util::future::join_all;
use netpulse_probe::{PingOutcome, PingRequest, Probe};

use super::context::{RunContext, elapsed_ms};
use crate::config::TcpTarget;
use crate::model::{Layer, Status, TestResult};

// ── Layer 1: Physical ───────────────────────────────────────────────

pub(crate) async fn physical<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::Physical;
    let (up, signal) = tokio::join!(
        ctx.guard(layer, "interface_up", false, interface_up(ctx)),
        ctx.guard(layer, "link_signal", false, link_signal(ctx)),
    );
    vec![up, signal]
}

async fn interface_up<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "interface_up";
    match ctx.link().await {
        Ok(link) if link.is_up => {
            TestResult::pass(NAME, format!("Interface {} is up", link.interface))
                .with_detail("interface", link.interface.as_str())
                .with_detail("wireless", link.is_wireless)
                .with_detail("mtu", link.mtu)
        }
        Ok(link) => TestResult::fail(NAME, format!("Interface {} is down", link.interface))
            .with_detail("interface", link.interface.as_str()),
        Err(e) => TestResult::fail(NAME, "Could not read interface state").with_error(e),
    }
}

async fn link_signal<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "link_signal";
    let thresholds = &ctx.config.thresholds;
    let reading = match ctx.wifi().await {
        Ok(reading) => reading,
        Err(e) => return TestResult::fail(NAME, "Could not read link signal").with_error(e),
    };
    let Some(reading) = reading else {
        return match ctx.link().await {
            Ok(link) if !link.is_wireless => TestResult::pass(NAME, "Wired link"),
            _ => TestResult::fail(NAME, "Wireless interface is not associated"),
        };
    };
    let Some(rssi) = reading.snapshot.rssi else {
        return TestResult::warning(NAME, "Signal strength not reported")
            .with_detail("cached", reading.cached);
    };

    let (status, message) = if rssi < thresholds.rssi_fail_dbm {
        (Status::Fail, format!("Very weak signal ({rssi:.0} dBm)"))
    } else if rssi < thresholds.rssi_warn_dbm {
        (Status::Warning, format!("Weak signal ({rssi:.0} dBm)"))
    } else {
        (Status::Pass, format!("Signal {rssi:.0} dBm"))
    };
    let mut result = TestResult::new(NAME, status, message)
        .with_detail("rssi_dbm", rssi)
        .with_detail("cached", reading.cached);
    if let Some(snr) = reading.snapshot.snr {
        result = result.with_detail("snr_db", snr);
    }
    result
}

// ── Layer 2: Data Link ──────────────────────────────────────────────

pub(crate) async fn data_link<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::DataLink;
    let (mac, association, arp) = tokio::join!(
        ctx.guard(layer, "mac_address", false, mac_address(ctx)),
        ctx.guard(layer, "wifi_association", false, wifi_association(ctx)),
        ctx.guard(layer, "gateway_arp", false, gateway_arp(ctx)),
    );
    vec![mac, association, arp]
}

async fn mac_address<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "mac_address";
    match ctx.link().await {
        Ok(link) => match &link.mac {
            Some(mac) => TestResult::pass(NAME, format!("Hardware address {mac}"))
                .with_detail("mac", mac.as_str()),
            None => TestResult::warning(
                NAME,
                format!("Interface {} has no hardware address", link.interface),
            ),
        },
        Err(e) => TestResult::fail(NAME, "Could not read interface state").with_error(e),
    }
}

async fn wifi_association<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "wifi_association";
    if let Ok(link) = ctx.link().await {
        if !link.is_wireless {
            return TestResult::pass(NAME, "Wired interface, no association needed");
        }
    }
    match ctx.wifi().await {
        Ok(Some(reading)) => {
            let snapshot = &reading.snapshot;
            let ssid = snapshot.ssid.as_deref().unwrap_or("<hidden>");
            let mut result = TestResult::pass(NAME, format!("Associated with {ssid}"))
                .with_detail("ssid", ssid)
                .with_detail("cached", reading.cached);
            if let Some(bssid) = &snapshot.bssid {
                result = result.with_detail("bssid", bssid.as_str());
            }
            if let Some(channel) = snapshot.channel {
                result = result.with_detail("channel", channel);
            }
            if let Some(rate) = snapshot.tx_rate {
                result = result.with_detail("tx_rate_mbps", rate);
            }
            result
        }
        Ok(None) => TestResult::fail(NAME, "Not associated with any access point"),
        Err(e) => TestResult::fail(NAME, "Could not read WiFi state").with_error(e),
    }
}

async fn gateway_arp<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "gateway_arp";
    let link = match ctx.link().await {
        Ok(link) => link,
        Err(e) => return TestResult::fail(NAME, "Could not read neighbour table").with_error(e),
    };
    let Some(gateway) = link.gateway else {
        return TestResult::fail(NAME, "No default gateway");
    };
    match &link.gateway_mac {
        Some(mac) => TestResult::pass(NAME, format!("Gateway {gateway} is at {mac}"))
            .with_detail("gateway", gateway.to_string())
            .with_detail("gateway_mac", mac.as_str()),
        None => TestResult::warning(NAME, format!("No neighbour entry for gateway {gateway}"))
            .with_detail("gateway", gateway.to_string()),
    }
}

// ── Layer 3: Network ────────────────────────────────────────────────

pub(crate) async fn network<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::Network;
    let (ip, gateway, external, ipv6, mtu) = tokio::join!(
        ctx.guard(layer, "ip_config", false, ip_config(ctx)),
        ctx.guard(layer, "gateway_ping", false, gateway_ping(ctx)),
        ctx.guard(layer, "external_ping", false, external_ping(ctx)),
        ctx.guard(layer, "ipv6", true, ipv6(ctx)),
        ctx.guard(layer, "path_mtu", true, path_mtu(ctx)),
    );
    vec![ip, gateway, external, ipv6, mtu]
}

async fn ip_config<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "ip_config";
    let link = match ctx.link().await {
        Ok(link) => link,
        Err(e) => return TestResult::fail(NAME, "Could not read addresses").with_error(e),
    };
    let Some(address) = link.ipv4.first() else {
        return TestResult::fail(NAME, format!("No IPv4 address on {}", link.interface));
    };
    let Some(gateway) = link.gateway else {
        return TestResult::fail(NAME, format!("{address} has no default route"));
    };
    TestResult::pass(NAME, format!("{address} via {gateway}"))
        .with_detail("ipv4", address.to_string())
        .with_detail("gateway", gateway.to_string())
}

/// Loss and RTT grading shared by the two reachability pings.
fn grade_ping(
    name: &str,
    target: &str,
    outcome: &PingOutcome,
    rtt_warn_ms: f64,
    loss_warn: f64,
) -> TestResult {
    if outcome.all_lost() {
        return TestResult::fail(name, format!("{target} unreachable (100% packet loss)"))
            .with_detail("loss_percent", outcome.loss_percent);
    }
    let avg = outcome.rtt_avg_ms.unwrap_or_default();
    let (status, message) = if outcome.loss_percent > loss_warn {
        (
            Status::Warning,
            format!("{target}: {:.0}% packet loss", outcome.loss_percent),
        )
    } else if avg > rtt_warn_ms {
        (Status::Warning, format!("{target}: high latency ({avg:.1} ms)"))
    } else {
        (Status::Pass, format!("{target} reachable ({avg:.1} ms)"))
    };
    let mut result = TestResult::new(name, status, message)
        .with_detail("loss_percent", outcome.loss_percent)
        .with_detail("received", outcome.received);
    if let Some(avg) = outcome.rtt_avg_ms {
        result = result.with_latency(avg);
    }
    result
}

async fn gateway_ping<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "gateway_ping";
    let gateway = match ctx.link().await {
        Ok(link) => link.gateway,
        Err(e) => return TestResult::fail(NAME, "Could not determine gateway").with_error(e),
    };
    let Some(gateway) = gateway else {
        return TestResult::fail(NAME, "No gateway to ping");
    };
    let target = gateway.to_string();
    let request = PingRequest::new(target.as_str())
        .count(ctx.config.ping_count)
        .timeout(ctx.limit);
    let thresholds = &ctx.config.thresholds;
    match ctx.probe.ping(&request).await {
        Ok(outcome) => grade_ping(
            NAME,
            &format!("Gateway {target}"),
            &outcome,
            thresholds.gateway_rtt_warn_ms,
            thresholds.ping_loss_warn_percent,
        ),
        Err(e) => {
            TestResult::fail(NAME, format!("Could not ping gateway {target}")).with_error(e)
        }
    }
}

async fn external_ping<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "external_ping";
    let thresholds = &ctx.config.thresholds;
    let host = ctx.config.external_ping_host.as_str();

    let max_age = chrono::Duration::seconds(ctx.config.ping_cache_max_age_secs);
    if let Some(snapshot) = ctx.probe.cached_ping() {
        if Utc::now() - snapshot.timestamp <= max_age {
            let loss = snapshot.packet_loss_percent.unwrap_or_default();
            let outcome = PingOutcome {
                host: host.to_owned(),
                transmitted: 0,
                received: u32::from(loss < 100.0),
                loss_percent: loss,
                rtt_min_ms: None,
                rtt_avg_ms: Some(snapshot.latency_ms),
                rtt_max_ms: None,
            };
            return grade_ping(
                NAME,
                host,
                &outcome,
                thresholds.external_rtt_warn_ms,
                thresholds.ping_loss_warn_percent,
            )
            .with_detail("cached", true);
        }
    }

    let request = PingRequest::new(host)
        .count(ctx.config.ping_count)
        .timeout(ctx.limit);
    match ctx.probe.ping(&request).await {
        Ok(outcome) => grade_ping(
            NAME,
            host,
            &outcome,
            thresholds.external_rtt_warn_ms,
            thresholds.ping_loss_warn_percent,
        )
        .with_detail("cached", false),
        Err(e) => TestResult::fail(NAME, format!("Could not ping {host}")).with_error(e),
    }
}

async fn ipv6<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "ipv6";
    let link = match ctx.link().await {
        Ok(link) => link,
        Err(e) => return TestResult::warning(NAME, "Could not read addresses").with_error(e),
    };
    let Some(address) = link.ipv6_global.first() else {
        return TestResult::pass(NAME, "IPv4-only (no global IPv6 address)");
    };
    let target = &ctx.config.ipv6_target;
    match ctx.probe.tcp_connect(&target.host, target.port, ctx.limit).await {
        Ok(outcome) => TestResult::pass(NAME, format!("IPv6 reachable from {address}"))
            .with_latency(outcome.connect_ms)
            .with_detail("address", address.to_string()),
        Err(e) => TestResult::warning(
            NAME,
            format!("Global IPv6 address {address} but no IPv6 connectivity"),
        )
        .with_error(e),
    }
}

async fn path_mtu<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "path_mtu";
    let payload = ctx.config.mtu_probe_payload;
    let mtu = u32::from(payload) + 28;
    let request = PingRequest::new(ctx.config.external_ping_host.as_str())
        .count(2)
        .timeout(ctx.limit)
        .path_mtu(payload);
    match ctx.probe.ping(&request).await {
        Ok(outcome) if !outcome.all_lost() => {
            TestResult::pass(NAME, format!("Path MTU >= {mtu}")).with_detail("mtu", mtu)
        }
        Ok(_) => TestResult::warning(
            NAME,
            format!("{mtu}-byte unfragmented packets do not get through"),
        )
        .with_detail("mtu", mtu),
        Err(e) => TestResult::warning(NAME, "Path MTU probe failed").with_error(e),
    }
}

// ── Layer 4: Transport ──────────────────────────────────────────────

pub(crate) async fn transport<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::Transport;
    let checks = ctx.config.tcp_targets.iter().map(|target| {
        let name = target.test_name();
        async move {
            ctx.guard(layer, &name, false, tcp_check(ctx, &name, target))
                .await
        }
    });
    join_all(checks).await
}

async fn tcp_check<P: Probe>(
    ctx: &RunContext<'_, P>,
    name: &str,
    target: &TcpTarget,
) -> TestResult {
    let endpoint = format!("{}:{}", target.host, target.port);
    match ctx.probe.tcp_connect(&target.host, target.port, ctx.limit).await {
        Ok(outcome) => {
            let status = if outcome.connect_ms > ctx.config.thresholds.tcp_connect_warn_ms {
                Status::Warning
            } else {
                Status::Pass
            };
            TestResult::new(
                name,
                status,
                format!("Connected to {endpoint} in {:.1} ms", outcome.connect_ms),
            )
            .with_latency(outcome.connect_ms)
            .with_detail("peer", outcome.peer.to_string())
        }
        Err(e) => TestResult::fail(name, format!("Cannot connect to {endpoint}")).with_error(e),
    }
}

// ── Layer 5: Session ────────────────────────────────────────────────

pub(crate) async fn session<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::Session;
    let (stability, setup) = tokio::join!(
        ctx.guard(layer, "session_stability", false, session_stability(ctx)),
        ctx.guard(layer, "session_setup_time", false, session_setup_time(ctx)),
    );
    vec![stability, setup]
}

async fn session_stability<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "session_stability";
    let attempts = ctx.sessions().await;
    let ok = attempts.iter().filter(|a| a.is_ok()).count();
    let total = attempts.len();
    let status = match ok {
        0 => Status::Fail,
        n if n == total => Status::Pass,
        _ => Status::Warning,
    };
    let mut result = TestResult::new(NAME, status, format!("{ok}/{total} connections succeeded"))
        .with_detail("attempts", total)
        .with_detail("succeeded", ok);
    if let Some(Err(e)) = attempts.iter().find(|a| a.is_err()) {
        result = result.with_error(e);
    }
    result
}

async fn session_setup_time<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "session_setup_time";
    let times: Vec<f64> = ctx
        .sessions()
        .await
        .iter()
        .filter_map(|a| a.as_ref().ok().map(|o| o.connect_ms))
        .collect();
    if times.is_empty() {
        return TestResult::fail(NAME, "No session could be established");
    }
    let avg = times.iter().sum::<f64>() / times.len() as f64;
    let status = if avg > ctx.config.thresholds.session_setup_warn_ms {
        Status::Warning
    } else {
        Status::Pass
    };
    TestResult::new(NAME, status, format!("Average setup time {avg:.1} ms")).with_latency(avg)
}

// ── Layer 6: Presentation ───────────────────────────────────────────

pub(crate) async fn presentation<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::Presentation;
    let (handshake, certificate) = tokio::join!(
        ctx.guard(layer, "tls_handshake", false, tls_handshake(ctx)),
        ctx.guard(layer, "certificate_validity", true, certificate_validity(ctx)),
    );
    vec![handshake, certificate]
}

async fn tls_handshake<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "tls_handshake";
    let server = format!("{}:{}", ctx.config.tls_host, ctx.config.tls_port);
    match ctx.tls().await {
        Ok(outcome) => {
            let cipher = outcome.cipher.as_deref().unwrap_or("unknown cipher");
            let result = if outcome.version.is_modern() {
                TestResult::pass(NAME, format!("{} with {cipher}", outcome.version))
            } else {
                TestResult::warning(
                    NAME,
                    format!("{server} negotiated {}, older than TLS 1.2", outcome.version),
                )
            };
            result
                .with_latency(outcome.handshake_ms)
                .with_detail("version", outcome.version.to_string())
                .with_detail("cipher", cipher)
        }
        Err(e) => {
            TestResult::fail(NAME, format!("TLS handshake with {server} failed")).with_error(e)
        }
    }
}

async fn certificate_validity<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "certificate_validity";
    let outcome = match ctx.tls().await {
        Ok(outcome) => outcome,
        Err(e) => {
            return TestResult::warning(NAME, "Certificate not checked: handshake failed")
                .with_error(e);
        }
    };
    let Some(not_after) = outcome.not_after else {
        return TestResult::warning(NAME, "Certificate expiry could not be read");
    };
    let remaining = not_after - Utc::now();
    let days = remaining.num_days();
    let result = if remaining <= chrono::Duration::zero() {
        TestResult::fail(NAME, format!("Certificate expired on {}", not_after.date_naive()))
    } else if days < ctx.config.thresholds.cert_expiry_warn_days {
        TestResult::warning(NAME, format!("Certificate expires in {days} days"))
    } else {
        TestResult::pass(NAME, format!("Certificate valid for {days} more days"))
    };
    result
        .with_detail("not_after", not_after.to_rfc3339())
        .with_detail("days_remaining", days)
}

// ── Layer 7: Application ────────────────────────────────────────────

pub(crate) async fn application<P: Probe>(ctx: &RunContext<'_, P>) -> Vec<TestResult> {
    let layer = Layer::Application;
    let dns = async {
        if ctx.config.dns_names.is_empty() {
            None
        } else {
            Some(
                ctx.guard(layer, "dns_resolution", false, dns_resolution(ctx))
                    .await,
            )
        }
    };
    let (dns, http, portal) = tokio::join!(
        dns,
        ctx.guard(layer, "http_reachability", false, http_reachability(ctx)),
        ctx.guard(layer, "captive_portal", true, captive_portal(ctx)),
    );
    dns.into_iter().chain([http, portal]).collect()
}

async fn dns_resolution<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "dns_resolution";
    let names = &ctx.config.dns_names;
    let lookups = join_all(names.iter().map(|name| ctx.probe.resolve(name, ctx.limit))).await;

    let mut failed = Vec::new();
    let mut slowest: Option<f64> = None;
    let mut first_error = None;
    let mut result_details = serde_json::Map::new();
    for (name, lookup) in names.iter().zip(&lookups) {
        match lookup {
            Ok(outcome) => {
                let ms = outcome.elapsed_ms;
                slowest = Some(slowest.map_or(ms, |s| s.max(ms)));
                result_details.insert(name.clone(), outcome.addresses.len().into());
            }
            Err(e) => {
                failed.push(name.as_str());
                if first_error.is_none() {
                    first_error = Some(e);
                }
                result_details.insert(name.clone(), serde_json::Value::Null);
            }
        }
    }

    let slow_ms = ctx.config.thresholds.dns_slow_ms;
    let mut result = if failed.len() == names.len() {
        TestResult::fail(NAME, "No name could be resolved")
    } else if !failed.is_empty() {
        TestResult::warning(NAME, format!("Could not resolve {}", failed.join(", ")))
    } else if slowest.is_some_and(|s| s > slow_ms) {
        TestResult::warning(
            NAME,
            format!("Slow resolution ({:.0} ms)", slowest.unwrap_or_default()),
        )
    } else {
        TestResult::pass(NAME, format!("Resolved {} names", names.len()))
    };
    if let Some(slowest) = slowest {
        result = result.with_latency(slowest);
    }
    if let Some(e) = first_error {
        result = result.with_error(e);
    }
    result.with_detail("answers", serde_json::Value::Object(result_details))
}

async fn http_reachability<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "http_reachability";
    let url = ctx.config.http_url.as_str();
    let started = tokio::time::Instant::now();
    match ctx.probe.http_get(url, ctx.limit).await {
        Ok(outcome) => {
            let status = outcome.status;
            let result = if status >= 500 {
                TestResult::fail(NAME, format!("Server error {status} from {url}"))
            } else if status >= 400 {
                TestResult::warning(NAME, format!("Client error {status} from {url}"))
            } else if outcome.elapsed_ms > ctx.config.thresholds.http_slow_ms {
                TestResult::warning(NAME, format!("Slow response ({:.0} ms)", outcome.elapsed_ms))
            } else {
                TestResult::pass(NAME, format!("HTTP {status} in {:.0} ms", outcome.elapsed_ms))
            };
            result
                .with_latency(outcome.elapsed_ms)
                .with_detail("status", status)
        }
        Err(e) => TestResult::fail(NAME, format!("Request to {url} failed"))
            .with_latency(elapsed_ms(started))
            .with_error(e),
    }
}

async fn captive_portal<P: Probe>(ctx: &RunContext<'_, P>) -> TestResult {
    const NAME: &str = "captive_portal";
    let url = ctx.config.captive_portal_url.as_str();
    match ctx.probe.http_get(url, ctx.limit).await {
        Ok(outcome) if outcome.status == 204 => {
            TestResult::pass(NAME, "No captive portal detected").with_latency(outcome.elapsed_ms)
        }
        Ok(outcome) => TestResult::warning(
            NAME,
            format!("Expected 204, got {}: captive portal likely", outcome.status),
        )
        .with_latency(outcome.elapsed_ms)
        .with_detail("status", outcome.status),
        Err(e) => TestResult::warning(NAME, "Captive portal check failed").with_error(e),
    }
}
