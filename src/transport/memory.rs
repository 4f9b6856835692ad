use crate::cluster::{Endpoint, ServerId};
use crate::transport::{InboundHandler, Transport, TransportError};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// MemoryNetwork connects `MemoryTransport`s living in the same process. Delivery is immediate,
/// and a server can be cut off from everyone to simulate a partition.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<Endpoint, InboundHandler>,
    disconnected: HashSet<ServerId>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            local: Mutex::new(None),
        }
    }

    /// Messages to and from `id` fail with `Unreachable` until `reconnect`.
    pub fn disconnect(&self, id: &ServerId) {
        self.lock().disconnected.insert(id.clone());
    }

    pub fn reconnect(&self, id: &ServerId) {
        self.lock().disconnected.remove(id);
    }

    pub fn is_listening(&self, endpoint: &Endpoint) -> bool {
        self.lock().nodes.contains_key(endpoint)
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct MemoryTransport {
    network: MemoryNetwork,
    local: Mutex<Option<Endpoint>>,
}

impl MemoryTransport {
    fn local(&self) -> MutexGuard<'_, Option<Endpoint>> {
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, endpoint: &Endpoint, handler: InboundHandler) -> Result<(), TransportError> {
        let mut local = self.local();
        if let Some(existing) = local.as_ref() {
            return Err(TransportError::AlreadyListening(existing.clone()));
        }

        let mut network = self.network.lock();
        if network.nodes.contains_key(endpoint) {
            return Err(TransportError::AlreadyListening(endpoint.clone()));
        }
        network.nodes.insert(endpoint.clone(), handler);
        *local = Some(endpoint.clone());

        Ok(())
    }

    async fn send(&self, endpoint: &Endpoint, payload: Bytes) -> Result<(), TransportError> {
        let from = self.local().clone().ok_or(TransportError::NotListening)?;

        let handler = {
            let network = self.network.lock();
            if network.disconnected.contains(from.id()) || network.disconnected.contains(endpoint.id()) {
                return Err(TransportError::Unreachable(endpoint.clone()));
            }
            network
                .nodes
                .get(endpoint)
                .cloned()
                .ok_or_else(|| TransportError::Unreachable(endpoint.clone()))?
        };

        // Network lock is released, the handler may take its own locks.
        handler(from, payload);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(endpoint) = self.local().take() {
            self.network.lock().nodes.remove(&endpoint);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn endpoint(id: &str, port: u16) -> Endpoint {
        Endpoint::new(id, "127.0.0.1", port)
    }

    fn channel_handler() -> (InboundHandler, mpsc::UnboundedReceiver<(Endpoint, Bytes)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: InboundHandler = Arc::new(move |from: Endpoint, bytes: Bytes| {
            let _ = tx.send((from, bytes));
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn delivers_with_sender_endpoint() {
        let network = MemoryNetwork::new();
        let (a, b) = (network.transport(), network.transport());
        let (handler_a, _rx_a) = channel_handler();
        let (handler_b, mut rx_b) = channel_handler();
        a.listen(&endpoint("a", 1), handler_a).await.unwrap();
        b.listen(&endpoint("b", 2), handler_b).await.unwrap();

        a.send(&endpoint("b", 2), Bytes::from_static(b"hi")).await.unwrap();

        let (from, bytes) = rx_b.recv().await.unwrap();
        assert_eq!(from, endpoint("a", 1));
        assert_eq!(bytes, Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn listen_twice_fails() {
        let network = MemoryNetwork::new();
        let a = network.transport();
        let (handler, _rx) = channel_handler();
        a.listen(&endpoint("a", 1), handler.clone()).await.unwrap();

        let result = a.listen(&endpoint("a", 1), handler.clone()).await;
        assert!(matches!(result, Err(TransportError::AlreadyListening(_))));

        let other = network.transport();
        let result = other.listen(&endpoint("a", 1), handler).await;
        assert!(matches!(result, Err(TransportError::AlreadyListening(_))));
    }

    #[tokio::test]
    async fn disconnected_and_closed_endpoints_are_unreachable() {
        let network = MemoryNetwork::new();
        let (a, b) = (network.transport(), network.transport());
        let (handler_a, _rx_a) = channel_handler();
        let (handler_b, _rx_b) = channel_handler();
        a.listen(&endpoint("a", 1), handler_a).await.unwrap();
        b.listen(&endpoint("b", 2), handler_b).await.unwrap();

        network.disconnect(&ServerId::new("b"));
        let result = a.send(&endpoint("b", 2), Bytes::new()).await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));

        network.reconnect(&ServerId::new("b"));
        a.send(&endpoint("b", 2), Bytes::new()).await.unwrap();

        b.close().await.unwrap();
        b.close().await.unwrap();
        assert!(!network.is_listening(&endpoint("b", 2)));
        let result = a.send(&endpoint("b", 2), Bytes::new()).await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }

    #[tokio::test]
    async fn send_before_listen_fails() {
        let network = MemoryNetwork::new();
        let result = network.transport().send(&endpoint("b", 2), Bytes::new()).await;
        assert!(matches!(result, Err(TransportError::NotListening)));
    }
}
