// ── ICMP echo via the OS `ping` utility ──
//
// Argument construction and output parsing are separate pure functions so
// both can be tested without spawning anything.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ProbeError;
use crate::types::{PingOutcome, PingRequest};

static TRANSMITTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received").expect("static regex")
});
static LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)% packet loss").expect("static regex"));
static RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"= ([\d.]+)/([\d.]+)/([\d.]+)(?:/[\d.]+)? ms").expect("static regex")
});

/// Target flavour of the `ping` command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// iputils / busybox.
    Linux,
    /// BSD-derived ping shipped with macOS.
    Bsd,
}

impl PingFlavor {
    pub fn host() -> Self {
        if cfg!(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd")) {
            Self::Bsd
        } else {
            Self::Linux
        }
    }
}

/// Build the argument vector for one ping run.
pub fn ping_args(request: &PingRequest, flavor: PingFlavor) -> Vec<String> {
    let deadline_secs = request.timeout.as_secs().max(1).to_string();
    let mut args = vec!["-n".to_owned(), "-c".to_owned(), request.count.to_string()];

    match flavor {
        PingFlavor::Linux => {
            args.extend(["-w".to_owned(), deadline_secs]);
            if request.dont_fragment {
                args.extend(["-M".to_owned(), "do".to_owned()]);
            }
        }
        PingFlavor::Bsd => {
            args.extend(["-t".to_owned(), deadline_secs]);
            if request.dont_fragment {
                args.push("-D".to_owned());
            }
        }
    }

    if let Some(size) = request.payload_bytes {
        args.extend(["-s".to_owned(), size.to_string()]);
    }

    args.push(request.host.clone());
    args
}

/// Parse the summary block printed by `ping`.
///
/// Works for iputils, busybox and BSD output. RTT fields are `None` when
/// no reply arrived.
pub fn parse_ping_output(host: &str, output: &str) -> Result<PingOutcome, ProbeError> {
    let counts = TRANSMITTED
        .captures(output)
        .ok_or_else(|| ProbeError::parse("ping output", "no packet summary line"))?;
    let transmitted: u32 = counts[1]
        .parse()
        .map_err(|e| ProbeError::parse("ping transmitted count", e))?;
    let received: u32 = counts[2]
        .parse()
        .map_err(|e| ProbeError::parse("ping received count", e))?;

    let loss_percent = match LOSS.captures(output) {
        Some(caps) => caps[1]
            .parse::<f64>()
            .map_err(|e| ProbeError::parse("ping loss percentage", e))?,
        None if transmitted == 0 => 100.0,
        None => f64::from(transmitted - received.min(transmitted)) * 100.0 / f64::from(transmitted),
    };

    let (rtt_min_ms, rtt_avg_ms, rtt_max_ms) = match RTT.captures(output) {
        Some(caps) if received > 0 => (
            caps[1].parse().ok(),
            caps[2].parse().ok(),
            caps[3].parse().ok(),
        ),
        _ => (None, None, None),
    };

    Ok(PingOutcome {
        host: host.to_owned(),
        transmitted,
        received,
        loss_percent,
        rtt_min_ms,
        rtt_avg_ms,
        rtt_max_ms,
    })
}
