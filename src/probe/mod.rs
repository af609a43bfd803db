pub mod response;
pub mod tls;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::net::conn::ConnError;

pub use response::ProbeResult;
pub use tls::TlsProbe;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0}")]
    Connection(#[from] ConnError),
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("TLS handshake timed out")]
    HandshakeTimeout,
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON object, got {0}")]
    UnexpectedJson(&'static str),
}

impl ProbeError {
    /// True when the peer answered but the answer could not be understood.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ProbeError::MalformedResponse(_) | ProbeError::Json(_) | ProbeError::UnexpectedJson(_)
        )
    }
}

/// Address dialled instead of the reference host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub address: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        ProxyEndpoint {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// One request to the reference endpoint, either direct (`proxy` is `None`)
/// or by dialling `proxy` while still presenting the reference hostname.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, proxy: Option<&ProxyEndpoint>) -> Result<ProbeResult, ProbeError>;
}

#[async_trait]
impl<T: Probe + ?Sized> Probe for Arc<T> {
    async fn probe(&self, proxy: Option<&ProxyEndpoint>) -> Result<ProbeResult, ProbeError> {
        (**self).probe(proxy).await
    }
}
