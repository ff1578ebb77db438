// ── Link and WiFi state parsers ──
//
// `ip -j` emits JSON, so routes, addresses and neighbours deserialize
// straight into typed rows. `iw dev <if> link` has no structured mode and
// gets a small line parser instead.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ProbeError;
use crate::types::{LinkInfo, WifiSnapshot};

#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub dst: String,
    pub gateway: Option<IpAddr>,
    pub dev: Option<String>,
    pub metric: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddrInfo {
    pub family: String,
    pub local: Option<IpAddr>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceEntry {
    pub ifname: String,
    #[serde(default)]
    pub flags: Vec<String>,
    pub mtu: Option<u32>,
    pub operstate: Option<String>,
    pub link_type: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub addr_info: Vec<AddrInfo>,
}

impl InterfaceEntry {
    fn is_loopback(&self) -> bool {
        self.link_type.as_deref() == Some("loopback") || self.flags.iter().any(|f| f == "LOOPBACK")
    }

    fn is_up(&self) -> bool {
        self.operstate.as_deref() == Some("UP") || self.flags.iter().any(|f| f == "LOWER_UP")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeighborEntry {
    pub dst: IpAddr,
    pub lladdr: Option<String>,
    #[serde(default)]
    pub state: Vec<String>,
}

pub fn parse_routes(json: &str) -> Result<Vec<RouteEntry>, ProbeError> {
    parse_json_rows(json, "ip route output")
}

pub fn parse_interfaces(json: &str) -> Result<Vec<InterfaceEntry>, ProbeError> {
    parse_json_rows(json, "ip addr output")
}

pub fn parse_neighbors(json: &str) -> Result<Vec<NeighborEntry>, ProbeError> {
    parse_json_rows(json, "ip neigh output")
}

fn parse_json_rows<T: for<'de> Deserialize<'de>>(
    json: &str,
    what: &str,
) -> Result<Vec<T>, ProbeError> {
    // `ip -j` prints nothing at all when the table is empty.
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|e| ProbeError::parse(what, e))
}

/// Pick the interface carrying the default route (lowest metric), falling
/// back to the first non-loopback interface that is up.
pub fn select_link(
    routes: &[RouteEntry],
    interfaces: &[InterfaceEntry],
    neighbors: &[NeighborEntry],
) -> Option<LinkInfo> {
    let default_route = routes
        .iter()
        .filter(|r| r.dst == "default" && r.dev.is_some())
        .min_by_key(|r| r.metric.unwrap_or(u32::MAX));

    let iface = default_route
        .and_then(|r| r.dev.as_deref())
        .and_then(|dev| interfaces.iter().find(|i| i.ifname == dev))
        .or_else(|| interfaces.iter().find(|i| !i.is_loopback() && i.is_up()))?;

    let gateway = default_route
        .filter(|r| r.dev.as_deref() == Some(iface.ifname.as_str()))
        .and_then(|r| r.gateway);
    let gateway_mac = gateway.and_then(|gw| {
        neighbors
            .iter()
            .find(|n| n.dst == gw && !n.state.iter().any(|s| s == "FAILED"))
            .and_then(|n| n.lladdr.clone())
    });

    let mut ipv4 = Vec::new();
    let mut ipv6_global = Vec::new();
    for info in &iface.addr_info {
        match info.local {
            Some(IpAddr::V4(addr)) if info.family == "inet" => ipv4.push(addr),
            Some(IpAddr::V6(addr))
                if info.family == "inet6" && info.scope.as_deref() == Some("global") =>
            {
                ipv6_global.push(addr);
            }
            _ => {}
        }
    }

    Some(LinkInfo {
        interface: iface.ifname.clone(),
        is_up: iface.is_up(),
        is_wireless: false,
        mac: iface.address.clone(),
        mtu: iface.mtu,
        ipv4,
        ipv6_global,
        gateway,
        gateway_mac,
    })
}

/// Parse `iw dev <if> link`. Returns `Ok(None)` when not associated.
pub fn parse_iw_link(output: &str, now: DateTime<Utc>) -> Result<Option<WifiSnapshot>, ProbeError> {
    let trimmed = output.trim();
    if trimmed.starts_with("Not connected") {
        return Ok(None);
    }
    let Some(first) = trimmed.lines().next() else {
        return Err(ProbeError::parse("iw link output", "empty output"));
    };
    let Some(rest) = first.strip_prefix("Connected to ") else {
        return Err(ProbeError::parse(
            "iw link output",
            format!("unexpected header '{first}'"),
        ));
    };

    let bssid = rest.split_whitespace().next().map(str::to_owned);
    let mut snapshot = WifiSnapshot {
        ssid: None,
        bssid,
        rssi: None,
        snr: None,
        channel: None,
        tx_rate: None,
        timestamp: now,
    };

    for line in trimmed.lines().skip(1) {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "SSID" => snapshot.ssid = Some(value.to_owned()),
            "freq" => {
                snapshot.channel = leading_number(value)
                    .and_then(|mhz| frequency_to_channel(mhz.round() as u32));
            }
            "signal" => snapshot.rssi = leading_number(value),
            "tx bitrate" => snapshot.tx_rate = leading_number(value),
            _ => {}
        }
    }

    Ok(Some(snapshot))
}

fn leading_number(value: &str) -> Option<f64> {
    value.split_whitespace().next()?.parse().ok()
}

/// Map a centre frequency in MHz to an 802.11 channel number.
pub fn frequency_to_channel(mhz: u32) -> Option<u32> {
    match mhz {
        2484 => Some(14),
        2412..=2472 => Some((mhz - 2407) / 5),
        5160..=5885 => Some((mhz - 5000) / 5),
        5955..=7115 => Some((mhz - 5950) / 5),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROUTES: &str = r#"[
        {"dst":"default","gateway":"192.168.1.1","dev":"wlan0","protocol":"dhcp","metric":600,"flags":[]},
        {"dst":"default","gateway":"10.0.0.1","dev":"eth0","protocol":"dhcp","metric":100,"flags":[]}
    ]"#;

    const ADDRS: &str = r#"[
        {"ifindex":1,"ifname":"lo","flags":["LOOPBACK","UP","LOWER_UP"],"mtu":65536,"operstate":"UNKNOWN","link_type":"loopback","address":"00:00:00:00:00:00",
         "addr_info":[{"family":"inet","local":"127.0.0.1","prefixlen":8,"scope":"host"}]},
        {"ifindex":2,"ifname":"eth0","flags":["BROADCAST","MULTICAST","UP","LOWER_UP"],"mtu":1500,"operstate":"UP","link_type":"ether","address":"aa:bb:cc:00:11:22",
         "addr_info":[
            {"family":"inet","local":"10.0.0.23","prefixlen":24,"scope":"global"},
            {"family":"inet6","local":"2001:db8::23","prefixlen":64,"scope":"global"},
            {"family":"inet6","local":"fe80::1","prefixlen":64,"scope":"link"}]},
        {"ifindex":3,"ifname":"wlan0","flags":["BROADCAST","MULTICAST","UP"],"mtu":1500,"operstate":"DOWN","link_type":"ether","address":"aa:bb:cc:33:44:55","addr_info":[]}
    ]"#;

    const NEIGH: &str = r#"[{"dst":"10.0.0.1","dev":"eth0","lladdr":"de:ad:be:ef:00:01","state":["REACHABLE"]}]"#;

    #[test]
    fn selects_lowest_metric_default_route() {
        let link = select_link(
            &parse_routes(ROUTES).unwrap(),
            &parse_interfaces(ADDRS).unwrap(),
            &parse_neighbors(NEIGH).unwrap(),
        )
        .unwrap();

        assert_eq!(link.interface, "eth0");
        assert!(link.is_up);
        assert_eq!(link.mtu, Some(1500));
        assert_eq!(link.ipv4, vec!["10.0.0.23".parse::<std::net::Ipv4Addr>().unwrap()]);
        assert_eq!(link.ipv6_global.len(), 1);
        assert_eq!(link.gateway, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(link.gateway_mac.as_deref(), Some("de:ad:be:ef:00:01"));
    }

    #[test]
    fn falls_back_to_first_up_interface_without_routes() {
        let link = select_link(&[], &parse_interfaces(ADDRS).unwrap(), &[]).unwrap();
        assert_eq!(link.interface, "eth0");
        assert_eq!(link.gateway, None);
    }

    #[test]
    fn empty_ip_output_is_empty_table() {
        assert!(parse_routes("").unwrap().is_empty());
        assert!(parse_routes("not json").is_err());
    }

    #[test]
    fn parses_iw_link() {
        let output = "Connected to 11:22:33:44:55:66 (on wlan0)
\tSSID: HomeNet
\tfreq: 5180
\tRX: 123456 bytes (789 packets)
\tsignal: -61 dBm
\trx bitrate: 866.7 MBit/s VHT-MCS 9 80MHz short GI VHT-NSS 2
\ttx bitrate: 780.0 MBit/s VHT-MCS 8 80MHz short GI VHT-NSS 2
";
        let snap = parse_iw_link(output, Utc::now()).unwrap().unwrap();
        assert_eq!(snap.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(snap.bssid.as_deref(), Some("11:22:33:44:55:66"));
        assert_eq!(snap.rssi, Some(-61.0));
        assert_eq!(snap.channel, Some(36));
        assert_eq!(snap.tx_rate, Some(780.0));
    }

    #[test]
    fn iw_not_connected_is_none() {
        assert_eq!(parse_iw_link("Not connected.\n", Utc::now()).unwrap(), None);
        assert!(parse_iw_link("garbage", Utc::now()).is_err());
    }

    #[test]
    fn channel_mapping_covers_all_bands() {
        assert_eq!(frequency_to_channel(2437), Some(6));
        assert_eq!(frequency_to_channel(2484), Some(14));
        assert_eq!(frequency_to_channel(5745), Some(149));
        assert_eq!(frequency_to_channel(5975), Some(5));
        assert_eq!(frequency_to_channel(900), None);
    }
}
