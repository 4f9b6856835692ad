use crate::cluster::Endpoint;
use bytes::Bytes;
use std::io;
use std::sync::Arc;

/// InboundHandler is called with the sender's endpoint and the raw payload of every message the
/// transport receives.
pub type InboundHandler = Arc<dyn Fn(Endpoint, Bytes) + Send + Sync>;

/// Transport moves opaque bytes between endpoints. It knows nothing about what the bytes mean.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn listen(&self, endpoint: &Endpoint, handler: InboundHandler) -> Result<(), TransportError>;

    async fn send(&self, endpoint: &Endpoint, payload: Bytes) -> Result<(), TransportError>;

    /// Stops listening and drops outbound connections. Closing twice is fine.
    async fn close(&self) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is already listening on {0}")]
    AlreadyListening(Endpoint),
    #[error("Transport must listen before it can send")]
    NotListening,
    #[error("Endpoint {0} is unreachable")]
    Unreachable(Endpoint),
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(Endpoint),
    #[error("IO error talking to {endpoint}")]
    Io {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
