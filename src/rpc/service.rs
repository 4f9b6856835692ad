use crate::cluster::Endpoint;
use crate::rpc::registry::{self, ReceiverRegistry, SharedRegistry};
use crate::rpc::{CallType, Codec, Inbound, Procedure, ProstCodec, ReceiverKey, RpcError, RpcMessage, RpcReceiver};
use crate::transport::{InboundHandler, Transport, TransportError};
use bytes::Bytes;
use std::sync::Arc;

/// RpcService encodes and sends messages, and decodes and dispatches what comes back in. It knows
/// the message shapes but nothing about the protocol.
pub struct RpcService<T, C = ProstCodec> {
    logger: slog::Logger,
    transport: Arc<T>,
    codec: Arc<C>,
    registry: SharedRegistry,
    listening: bool,
}

/// SendOutcome is the result of sending to one destination.
#[derive(Debug)]
pub struct SendOutcome {
    pub endpoint: Endpoint,
    pub result: Result<(), TransportError>,
}

/// PreparedSend is an already encoded message waiting to be delivered. It owns everything it
/// needs, so it can be moved onto another task.
pub struct PreparedSend<T> {
    logger: slog::Logger,
    transport: Arc<T>,
    endpoints: Vec<Endpoint>,
    payload: Bytes,
}

impl<T: Transport> RpcService<T, ProstCodec> {
    pub fn new(logger: slog::Logger, transport: T) -> Self {
        Self::with_codec(logger, transport, ProstCodec)
    }
}

impl<T: Transport, C: Codec> RpcService<T, C> {
    pub fn with_codec(logger: slog::Logger, transport: T, codec: C) -> Self {
        RpcService {
            logger,
            transport: Arc::new(transport),
            codec: Arc::new(codec),
            registry: Default::default(),
            listening: false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub async fn listen(&mut self, endpoint: &Endpoint) -> Result<(), RpcError> {
        if self.listening {
            return Err(RpcError::AlreadyListening);
        }

        self.transport.listen(endpoint, self.inbound_handler()).await?;
        self.listening = true;

        Ok(())
    }

    fn inbound_handler(&self) -> InboundHandler {
        let logger = self.logger.clone();
        let codec = self.codec.clone();
        let registry = self.registry.clone();

        Arc::new(move |from: Endpoint, payload: Bytes| match codec.decode(&payload) {
            Ok(message) => {
                slog::debug!(logger, "ServerWire - {:?} from {}", message, from);
                let delivered = registry::lock(&registry).dispatch(Inbound { from, message });
                if delivered == 0 {
                    slog::debug!(logger, "No receiver registered for message");
                }
            }
            Err(e) => {
                slog::warn!(logger, "Dropping undecodable message from {}: {:?}", from, e);
            }
        })
    }

    /// Registers a receiver for one (procedure, call type) pair.
    pub fn on_receive(&self, procedure: Procedure, call_type: CallType) -> RpcReceiver {
        ReceiverRegistry::register(&self.registry, &[ReceiverKey::new(procedure, call_type)])
    }

    /// Registers a receiver for every message.
    pub fn on_receive_any(&self) -> RpcReceiver {
        ReceiverRegistry::register(&self.registry, &ReceiverKey::ALL)
    }

    /// Encodes `message` once for all `endpoints`. Nothing is sent until the returned
    /// `PreparedSend` is delivered.
    pub fn prepare(&self, endpoints: Vec<Endpoint>, message: &RpcMessage) -> Result<PreparedSend<T>, RpcError> {
        let payload = self.codec.encode(message)?;
        for endpoint in endpoints.iter() {
            slog::debug!(self.logger, "ClientWire - {:?} to {}", message, endpoint);
        }

        Ok(PreparedSend {
            logger: self.logger.clone(),
            transport: self.transport.clone(),
            endpoints,
            payload,
        })
    }

    /// Sends to every endpoint. A failed destination never affects its siblings. Failures are
    /// logged and reported per endpoint, not returned as an error.
    pub async fn send(&self, endpoints: Vec<Endpoint>, message: &RpcMessage) -> Result<Vec<SendOutcome>, RpcError> {
        Ok(self.prepare(endpoints, message)?.deliver().await)
    }

    /// Closes the transport. Receivers stay registered until their owners drop them.
    pub async fn close(&mut self) -> Result<(), RpcError> {
        self.transport.close().await?;
        self.listening = false;

        Ok(())
    }
}

impl<T: Transport> PreparedSend<T> {
    pub async fn deliver(self) -> Vec<SendOutcome> {
        let PreparedSend {
            logger,
            transport,
            endpoints,
            payload,
        } = self;

        let sends = endpoints.into_iter().map(|endpoint| {
            let transport = transport.clone();
            let payload = payload.clone();
            async move {
                let result = transport.send(&endpoint, payload).await;
                SendOutcome { endpoint, result }
            }
        });
        let outcomes = futures::future::join_all(sends).await;

        for outcome in outcomes.iter() {
            if let Err(e) = &outcome.result {
                slog::error!(logger, "Failed to send to {}: {}", outcome.endpoint, e);
            }
        }

        outcomes
    }
}
