use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;

use crate::common::config::ResolverConfig;
use crate::net::conn::{connect_with_timeout, BoundedConnection};
use crate::probe::response::HttpResponse;
use crate::probe::{Probe, ProbeError, ProbeResult, ProxyEndpoint};

const HTTPS_PORT: u16 = 443;

/// Probes the reference endpoint over TLS.
///
/// When a proxy is given the TCP connection goes to the proxy's address, but
/// SNI, certificate validation and the `Host` header all use the reference
/// hostname. A proxy that cannot relay to the real origin, or that tampers
/// with the session, fails the handshake.
pub struct TlsProbe {
    host: String,
    path: String,
    user_agent: String,
    connector: TlsConnector,
    io_timeout: Duration,
    max_response_bytes: usize,
}

impl TlsProbe {
    pub fn new(
        resolver: &ResolverConfig,
        io_timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, ProbeError> {
        let connector = native_tls::TlsConnector::new()?;
        Ok(TlsProbe {
            host: resolver.host.clone(),
            path: resolver.path.clone(),
            user_agent: resolver.user_agent.clone(),
            connector: TlsConnector::from(connector),
            io_timeout,
            max_response_bytes,
        })
    }

    fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n\r\n",
            self.path, self.host, self.user_agent
        )
    }

    fn dial_target(&self, proxy: Option<&ProxyEndpoint>) -> ProxyEndpoint {
        match proxy {
            Some(endpoint) => endpoint.clone(),
            None => ProxyEndpoint::new(self.host.clone(), HTTPS_PORT),
        }
    }

    async fn fetch(&self, target: &ProxyEndpoint) -> Result<ProbeResult, ProbeError> {
        let tcp = connect_with_timeout(&target.address, target.port, self.io_timeout).await?;

        let tls = timeout(self.io_timeout, self.connector.connect(&self.host, tcp))
            .await
            .map_err(|_| ProbeError::HandshakeTimeout)??;

        let mut conn = BoundedConnection::new(tls, self.io_timeout, self.max_response_bytes);
        conn.write(self.request().as_bytes()).await?;
        let raw = conn.read_to_close().await?;

        let response = HttpResponse::parse(&raw)?;
        debug!("{} answered {:?}", target, response.status_line);
        response.into_probe_result()
    }
}

#[async_trait]
impl Probe for TlsProbe {
    async fn probe(&self, proxy: Option<&ProxyEndpoint>) -> Result<ProbeResult, ProbeError> {
        let target = self.dial_target(proxy);
        let result = self.fetch(&target).await;
        if let Err(e) = &result {
            if e.is_parse_error() {
                warn!("Error parsing response from {}: {}", target, e);
            } else {
                warn!("Connection error to {}: {}", target, e);
            }
        }
        result
    }
}
