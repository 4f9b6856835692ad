#![allow(dead_code)]

use raft_election::{
    CallType, Endpoint, Inbound, MemoryDisk, MemoryLog, MemoryNetwork, MemoryTransport, MemoryValue, Procedure,
    RpcMessage, RpcReceiver, RpcService, ServerConfig, ServerHandle, ServerId, ServerOptions, ServerStatus,
    StorageConfig, Term,
};
use tokio::time::Duration;

pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub fn members(num_members: u16) -> Vec<Endpoint> {
    (1..=num_members)
        .map(|i| Endpoint::new(format!("server-{}", i), "127.0.0.1", 7000 + i))
        .collect()
}

pub fn options(min_timeout_ms: u64, max_timeout_ms: u64, heartbeat_ms: u64) -> ServerOptions {
    ServerOptions {
        election_timeout_min: Some(Duration::from_millis(min_timeout_ms)),
        election_timeout_max: Some(Duration::from_millis(max_timeout_ms)),
        heartbeat_interval: Some(Duration::from_millis(heartbeat_ms)),
    }
}

/// Storage as if a previous run had reached `term`.
pub fn storage_at_term(term: u64) -> StorageConfig {
    StorageConfig::Provided {
        current_term: Box::new(MemoryValue::with_disk(
            "current-term",
            MemoryDisk::with_value(Term::new(term)),
        )),
        voted_for: Box::new(MemoryValue::<Option<ServerId>>::new("voted-for")),
        log: Box::new(MemoryLog::new()),
    }
}

pub async fn start_server(
    network: &MemoryNetwork,
    members: &[Endpoint],
    id: &str,
    storage: StorageConfig,
    options: ServerOptions,
) -> ServerHandle {
    let config = ServerConfig {
        logger: test_logger(),
        server_id: id.to_string(),
        members: members.to_vec(),
        storage,
        options,
    };
    let server = raft_election::create_server(config, network.transport())
        .await
        .expect("Failed to create server");

    raft_election::spawn_server(server).await.expect("Failed to start server")
}

pub async fn wait_for_status<F>(handle: &ServerHandle, timeout: Duration, predicate: F) -> ServerStatus
where
    F: FnMut(&ServerStatus) -> bool,
{
    let mut listener = handle.status_listener();
    tokio::time::timeout(timeout, listener.wait_for(predicate))
        .await
        .expect("Timeout waiting for status")
        .expect("Server exited")
}

/// FakePeer is a member of the cluster with no server behind it. Tests drive it by hand.
pub struct FakePeer {
    pub endpoint: Endpoint,
    pub rpc: RpcService<MemoryTransport>,
    requests: RpcReceiver,
    responses: RpcReceiver,
}

impl FakePeer {
    pub async fn listen(network: &MemoryNetwork, endpoint: Endpoint, procedure: Procedure) -> Self {
        let mut rpc = RpcService::new(test_logger(), network.transport());
        let requests = rpc.on_receive(procedure, CallType::Request);
        let responses = rpc.on_receive(procedure, CallType::Response);
        rpc.listen(&endpoint).await.expect("Failed to listen");

        FakePeer {
            endpoint,
            rpc,
            requests,
            responses,
        }
    }

    pub async fn next_request(&mut self) -> Inbound {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("Timeout waiting for request")
            .expect("Receiver detached")
    }

    pub async fn next_response(&mut self) -> Inbound {
        tokio::time::timeout(Duration::from_secs(5), self.responses.recv())
            .await
            .expect("Timeout waiting for response")
            .expect("Receiver detached")
    }

    pub async fn send(&self, to: &Endpoint, message: RpcMessage) {
        let outcomes = self.rpc.send(vec![to.clone()], &message).await.expect("Failed to send");
        for outcome in outcomes {
            outcome.result.expect("Failed to deliver");
        }
    }
}
