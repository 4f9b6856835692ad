use crate::cluster::Endpoint;
use crate::transport::{InboundHandler, Transport, TransportError};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use prost::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

#[derive(Clone, PartialEq, ::prost::Message)]
struct ProtoFrame {
    #[prost(string, tag = "1")]
    from_id: std::string::String,
    #[prost(string, tag = "2")]
    from_host: std::string::String,
    #[prost(uint32, tag = "3")]
    from_port: u32,
    #[prost(bytes, tag = "4")]
    payload: std::vec::Vec<u8>,
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

type Connection = Arc<tokio::sync::Mutex<Option<FramedWrite<TcpStream, LengthDelimitedCodec>>>>;

/// TcpTransport sends every message as one length-delimited frame over a per-destination
/// connection. Connections are one-way: replies travel over the peer's own connection back to us.
pub struct TcpTransport {
    logger: slog::Logger,
    // Sends to one destination queue behind its connect, so a black-holed peer must not hang it.
    connect_timeout: Duration,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    local: Option<Endpoint>,
    connections: HashMap<Endpoint, Connection>,
    // Dropping the sender stops the accept loop and every read loop.
    shutdown: Option<watch::Sender<()>>,
}

impl TcpTransport {
    pub fn new(logger: slog::Logger) -> Self {
        Self::with_connect_timeout(logger, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(logger: slog::Logger, connect_timeout: Duration) -> Self {
        TcpTransport {
            logger,
            connect_timeout,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn write_frame(
        connection: &Connection,
        endpoint: &Endpoint,
        frame: Bytes,
        connect_timeout: Duration,
    ) -> Result<(), TransportError> {
        let io_error = |source| TransportError::Io {
            endpoint: endpoint.clone(),
            source,
        };

        let mut slot = connection.lock().await;
        if slot.is_none() {
            let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(endpoint.address()))
                .await
                .map_err(|_| TransportError::ConnectTimeout(endpoint.clone()))?
                .map_err(io_error)?;
            stream.set_nodelay(true).map_err(io_error)?;
            *slot = Some(FramedWrite::new(stream, LengthDelimitedCodec::new()));
        }

        if let Some(writer) = slot.as_mut() {
            if let Err(e) = writer.send(frame).await {
                // Reconnect on the next send.
                *slot = None;
                return Err(io_error(e));
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn listen(&self, endpoint: &Endpoint, handler: InboundHandler) -> Result<(), TransportError> {
        let already_listening = self.lock().local.clone();
        if let Some(existing) = already_listening {
            return Err(TransportError::AlreadyListening(existing));
        }

        let listener = TcpListener::bind(endpoint.address())
            .await
            .map_err(|source| TransportError::Io {
                endpoint: endpoint.clone(),
                source,
            })?;
        slog::info!(self.logger, "Listening on '{}'", endpoint.address());

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        {
            let mut inner = self.lock();
            if let Some(existing) = inner.local.as_ref() {
                return Err(TransportError::AlreadyListening(existing.clone()));
            }
            inner.local = Some(endpoint.clone());
            inner.shutdown = Some(shutdown_tx);
        }

        tokio::spawn(accept_loop(self.logger.clone(), listener, handler, shutdown_rx));

        Ok(())
    }

    async fn send(&self, endpoint: &Endpoint, payload: Bytes) -> Result<(), TransportError> {
        let (from, connection) = {
            let mut inner = self.lock();
            let from = inner.local.clone().ok_or(TransportError::NotListening)?;
            let connection = inner.connections.entry(endpoint.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
                .clone();
            (from, connection)
        };

        let frame = ProtoFrame {
            from_id: from.id().as_str().to_string(),
            from_host: from.host().to_string(),
            from_port: from.port() as u32,
            payload: payload.to_vec(),
        };
        let mut buf = Vec::with_capacity(frame.encoded_len());
        frame
            .encode(&mut buf)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;

        Self::write_frame(&connection, endpoint, Bytes::from(buf), self.connect_timeout).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if let Some(local) = inner.local.take() {
            slog::info!(self.logger, "Closing listener on '{}'", local.address());
        }
        inner.shutdown = None;
        inner.connections.clear();

        Ok(())
    }
}

async fn accept_loop(
    logger: slog::Logger,
    listener: TcpListener,
    handler: InboundHandler,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    slog::debug!(logger, "Accepted connection from {}", addr);
                    tokio::spawn(read_loop(logger.clone(), stream, handler.clone(), shutdown.clone()));
                }
                Err(e) => slog::warn!(logger, "Failed to accept connection: {:?}", e),
            },
        }
    }
}

async fn read_loop(logger: slog::Logger, stream: TcpStream, handler: InboundHandler, mut shutdown: watch::Receiver<()>) {
    let mut frames = FramedRead::new(stream, LengthDelimitedCodec::new());
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            frame = frames.next() => match frame {
                Some(Ok(bytes)) => match decode_frame(&bytes) {
                    Ok((from, payload)) => handler(from, payload),
                    Err(e) => slog::warn!(logger, "Dropping frame: {}", e),
                },
                Some(Err(e)) => {
                    slog::warn!(logger, "Connection failed: {:?}", e);
                    return;
                }
                None => return,
            },
        }
    }
}

fn decode_frame(bytes: &[u8]) -> Result<(Endpoint, Bytes), TransportError> {
    let frame = ProtoFrame::decode(bytes).map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
    if frame.from_id.is_empty() || frame.from_port > u16::MAX as u32 {
        return Err(TransportError::MalformedFrame(format!(
            "bad sender '{}@{}:{}'",
            frame.from_id, frame.from_host, frame.from_port
        )));
    }

    let from = Endpoint::new(frame.from_id, frame.from_host, frame.from_port as u16);
    Ok((from, Bytes::from(frame.payload)))
}
