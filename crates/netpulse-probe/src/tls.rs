// ── TLS handshake probe ──
//
// Connects, completes a rustls handshake, and reports the negotiated
// protocol, cipher suite and leaf certificate expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};
use rustls::{ClientConfig, ProtocolVersion};
use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::ProbeError;
use crate::types::{TlsOutcome, TlsVersion};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_EXPLICIT_VERSION: u8 = 0xa0;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_GENERALIZED_TIME: u8 = 0x18;

pub(crate) async fn handshake(
    config: Arc<ClientConfig>,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TlsOutcome, ProbeError> {
    let server_name = ServerName::try_from(host.to_owned()).map_err(|e| ProbeError::Tls {
        server: host.into(),
        reason: format!("invalid server name: {e}"),
    })?;

    let started = Instant::now();
    let connect = async {
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| ProbeError::Connect {
                target: format!("{host}:{port}"),
                reason: e.to_string(),
            })?;
        TlsConnector::from(config)
            .connect(server_name, tcp)
            .await
            .map_err(|e| ProbeError::Tls {
                server: host.into(),
                reason: e.to_string(),
            })
    };

    let stream = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| ProbeError::timeout(format!("TLS handshake with {host}:{port}"), timeout))??;
    let handshake_ms = started.elapsed().as_secs_f64() * 1000.0;

    let (_, conn) = stream.get_ref();
    let version = conn
        .protocol_version()
        .map_or(TlsVersion::Unknown, map_protocol_version);
    let cipher = conn
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()));
    let not_after = conn
        .peer_certificates()
        .and_then(|chain| chain.first())
        .and_then(|leaf| leaf_not_after(leaf.as_ref()));

    debug!(host, port, %version, handshake_ms, "TLS handshake complete");

    Ok(TlsOutcome {
        version,
        cipher,
        not_after,
        handshake_ms,
    })
}

fn map_protocol_version(version: ProtocolVersion) -> TlsVersion {
    match version {
        ProtocolVersion::TLSv1_0 => TlsVersion::Tls10,
        ProtocolVersion::TLSv1_1 => TlsVersion::Tls11,
        ProtocolVersion::TLSv1_2 => TlsVersion::Tls12,
        ProtocolVersion::TLSv1_3 => TlsVersion::Tls13,
        _ => TlsVersion::Unknown,
    }
}

// ── Certificate expiry ───────────────────────────────────────────────

/// Read `tbsCertificate.validity.notAfter` from a DER-encoded X.509 certificate.
///
/// Returns `None` for anything that does not walk like a certificate.
pub fn leaf_not_after(der: &[u8]) -> Option<DateTime<Utc>> {
    let (tag, certificate, _) = read_tlv(der)?;
    if tag != TAG_SEQUENCE {
        return None;
    }
    let (tag, tbs, _) = read_tlv(certificate)?;
    if tag != TAG_SEQUENCE {
        return None;
    }

    let mut rest = tbs;
    let (tag, _, after_version) = read_tlv(rest)?;
    if tag == TAG_EXPLICIT_VERSION {
        rest = after_version;
    }
    // serialNumber, signature, issuer
    for _ in 0..3 {
        let (_, _, after) = read_tlv(rest)?;
        rest = after;
    }

    let (tag, validity, _) = read_tlv(rest)?;
    if tag != TAG_SEQUENCE {
        return None;
    }
    let (_, _, after_not_before) = read_tlv(validity)?;
    let (tag, time, _) = read_tlv(after_not_before)?;
    parse_asn1_time(tag, time)
}

/// Split one DER tag-length-value off the front of `buf`.
fn read_tlv(buf: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let (&tag, rest) = buf.split_first()?;
    let (&first, rest) = rest.split_first()?;

    let (len, rest) = if first & 0x80 == 0 {
        (usize::from(first), rest)
    } else {
        let width = usize::from(first & 0x7f);
        if width == 0 || width > 4 || rest.len() < width {
            return None;
        }
        let (bytes, rest) = rest.split_at(width);
        let len = bytes
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
        (len, rest)
    };

    if rest.len() < len {
        return None;
    }
    let (content, rest) = rest.split_at(len);
    Some((tag, content, rest))
}

fn parse_asn1_time(tag: u8, raw: &[u8]) -> Option<DateTime<Utc>> {
    let text = std::str::from_utf8(raw).ok()?;
    let full = match tag {
        // YYMMDDHHMMSSZ; RFC 5280 pivots at 50.
        TAG_UTC_TIME => {
            let yy: u32 = text.get(0..2)?.parse().ok()?;
            let century = if yy < 50 { "20" } else { "19" };
            format!("{century}{text}")
        }
        TAG_GENERALIZED_TIME => text.to_owned(),
        _ => return None,
    };
    NaiveDateTime::parse_from_str(&full, "%Y%m%d%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        if content.len() < 0x80 {
            out.push(u8::try_from(content.len()).expect("short length"));
        } else {
            let len = u16::try_from(content.len()).expect("test lengths fit u16");
            out.push(0x82);
            out.extend_from_slice(&len.to_be_bytes());
        }
        out.extend_from_slice(content);
        out
    }

    fn fake_certificate(not_after: (u8, &str), with_version: bool) -> Vec<u8> {
        let mut tbs = Vec::new();
        if with_version {
            tbs.extend(tlv(TAG_EXPLICIT_VERSION, &tlv(0x02, &[2])));
        }
        tbs.extend(tlv(0x02, &[0x01, 0x23]));
        tbs.extend(tlv(TAG_SEQUENCE, &tlv(0x06, &[0x2a, 0x86, 0x48])));
        tbs.extend(tlv(TAG_SEQUENCE, &[0u8; 150]));
        let mut validity = tlv(TAG_UTC_TIME, b"240101000000Z");
        validity.extend(tlv(not_after.0, not_after.1.as_bytes()));
        tbs.extend(tlv(TAG_SEQUENCE, &validity));
        tbs.extend(tlv(TAG_SEQUENCE, &[]));

        let mut cert = tlv(TAG_SEQUENCE, &tbs);
        cert = tlv(TAG_SEQUENCE, &cert);
        cert
    }

    #[test]
    fn reads_utc_time_not_after() {
        let der = fake_certificate((TAG_UTC_TIME, "300615120000Z"), true);
        assert_eq!(
            leaf_not_after(&der),
            Some(Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn reads_generalized_time_without_version() {
        let der = fake_certificate((TAG_GENERALIZED_TIME, "20551231235959Z"), false);
        assert_eq!(
            leaf_not_after(&der),
            Some(Utc.with_ymd_and_hms(2055, 12, 31, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn utc_time_pivots_to_previous_century() {
        let der = fake_certificate((TAG_UTC_TIME, "990101000000Z"), true);
        assert_eq!(
            leaf_not_after(&der),
            Some(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        let der = fake_certificate((TAG_UTC_TIME, "300615120000Z"), true);
        assert_eq!(leaf_not_after(&der[..der.len() / 2]), None);
        assert_eq!(leaf_not_after(&[]), None);
        assert_eq!(leaf_not_after(&[0x30, 0x85, 0, 0, 0, 0, 1]), None);
    }

    #[test]
    fn protocol_versions_map() {
        assert_eq!(map_protocol_version(ProtocolVersion::TLSv1_3), TlsVersion::Tls13);
        assert_eq!(map_protocol_version(ProtocolVersion::TLSv1_0), TlsVersion::Tls10);
        assert!(!TlsVersion::Tls11.is_modern());
        assert!(TlsVersion::Tls12.is_modern());
    }
}
