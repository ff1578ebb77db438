// Shared transport configuration for building probe clients.
//
// The HTTP client and the TLS client config are built once per
// `SystemProbe` from this module, so every probe shares trust roots,
// user agent and tool paths.

use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::CertificateDer;

use crate::error::ProbeError;

const USER_AGENT: &str = concat!("netpulse/", env!("CARGO_PKG_VERSION"));

/// Shared configuration for a [`SystemProbe`](crate::SystemProbe).
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Fallback timeout for HTTP requests that do not set their own.
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Additional trust anchors (private CAs, test certificates).
    pub extra_roots: Vec<CertificateDer<'static>>,
    /// Skip the bundled webpki roots, trusting only `extra_roots`.
    pub disable_builtin_roots: bool,
    pub ping_program: String,
    pub ip_program: String,
    pub iw_program: String,
    /// Root of the sysfs net class tree, used for wireless detection.
    pub sysfs_net: std::path::PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            user_agent: USER_AGENT.into(),
            extra_roots: Vec::new(),
            disable_builtin_roots: false,
            ping_program: "ping".into(),
            ip_program: "ip".into(),
            iw_program: "iw".into(),
            sysfs_net: "/sys/class/net".into(),
        }
    }
}

impl ProbeConfig {
    /// Build the `reqwest::Client` used for HTTP probes.
    ///
    /// Redirects are never followed: a 3xx is itself an answer, and the
    /// captive-portal check depends on seeing the raw status.
    pub fn build_http_client(&self) -> Result<reqwest::Client, ProbeError> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(self.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none());

        for der in &self.extra_roots {
            let cert = reqwest::Certificate::from_der(der.as_ref())?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(builder.build()?)
    }

    /// Build the rustls client config used for TLS handshake probes.
    pub fn build_tls_config(&self) -> Result<Arc<ClientConfig>, ProbeError> {
        let mut roots = RootCertStore::empty();
        if !self.disable_builtin_roots {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        for der in &self.extra_roots {
            roots.add(der.clone()).map_err(|e| ProbeError::Tls {
                server: "<config>".into(),
                reason: format!("invalid extra root certificate: {e}"),
            })?;
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::Tls {
                server: "<config>".into(),
                reason: format!("failed to build TLS config: {e}"),
            })?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Arc::new(config))
    }
}
