use crate::cluster::{Cluster, Endpoint, ServerId};
use crate::rpc::{AppendEntriesArgs, Codec, Inbound, ProstCodec, RpcMessage, RpcService};
use crate::server::{Server, ServerEvent, ServerStorage};
use crate::storage::{Index, LogEntry, MemoryDisk, MemoryLog, MemoryValue, Term};
use crate::timer::ElectionTimer;
use crate::transport::{InboundHandler, MemoryNetwork, MemoryTransport, Transport, TransportError};
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub(super) const MIN_TIMEOUT: Duration = Duration::from_millis(150);
pub(super) const MAX_TIMEOUT: Duration = Duration::from_millis(300);
pub(super) const HEARTBEAT: Duration = Duration::from_millis(50);

pub(super) fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub(super) fn append_entries_args(leader: &str, term: u64) -> AppendEntriesArgs {
    AppendEntriesArgs {
        term: Term::new(term),
        leader_id: ServerId::new(leader),
        prev_log_index: Index::new(0),
        prev_log_term: Term::new(0),
        entries: vec![],
        leader_commit: Index::new(0),
    }
}

pub(super) fn heartbeat(leader: &str, term: u64) -> RpcMessage {
    RpcMessage::AppendEntriesRequest(append_entries_args(leader, term))
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(super) struct DiskWrites {
    pub(super) term: usize,
    pub(super) vote: usize,
    pub(super) log: usize,
}

#[derive(Clone)]
pub(super) struct Disks {
    pub(super) term: MemoryDisk<Term>,
    pub(super) vote: MemoryDisk<Option<ServerId>>,
    pub(super) log: MemoryDisk<Vec<LogEntry>>,
}

impl Disks {
    fn writes(&self) -> DiskWrites {
        DiskWrites {
            term: self.term.write_count(),
            vote: self.vote.write_count(),
            log: self.log.write_count(),
        }
    }
}

#[derive(Clone, Debug)]
pub(super) struct SentMessage {
    pub(super) to: Endpoint,
    pub(super) message: RpcMessage,
    pub(super) disk_writes_at_send: DiskWrites,
}

/// Spy sees every message the server under test hands to its transport, along with how many
/// disk writes had completed at that moment.
#[derive(Clone, Default)]
pub(super) struct Spy {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl Spy {
    pub(super) fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(super) fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Waits until at least `count` messages went out, then returns all of them.
    pub(super) async fn wait_for_sends(&self, count: usize) -> Vec<SentMessage> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("Unexpected timeout")
    }

    pub(super) async fn assert_no_sends(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(self.sent().is_empty(), "Unexpected sends: {:?}", self.sent());
    }
}

pub(super) struct SpyTransport {
    inner: MemoryTransport,
    spy: Spy,
    disks: Disks,
}

#[async_trait::async_trait]
impl Transport for SpyTransport {
    async fn listen(&self, endpoint: &Endpoint, handler: InboundHandler) -> Result<(), TransportError> {
        self.inner.listen(endpoint, handler).await
    }

    async fn send(&self, endpoint: &Endpoint, payload: Bytes) -> Result<(), TransportError> {
        let message = ProstCodec.decode(&payload).expect("server sent garbage");
        self.spy.sent.lock().unwrap().push(SentMessage {
            to: endpoint.clone(),
            message,
            disk_writes_at_send: self.disks.writes(),
        });

        self.inner.send(endpoint, payload).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

/// TestCluster builds servers whose persistent state lives in `disks` and whose outbound
/// messages are recorded by `spy`. Peers are not running unless a test starts them.
pub(super) struct TestCluster {
    pub(super) members: Vec<Endpoint>,
    pub(super) network: MemoryNetwork,
    pub(super) disks: Disks,
    pub(super) spy: Spy,
}

impl TestCluster {
    pub(super) fn new(size: usize) -> Self {
        Self::with_persisted_state(size, Term::new(0), None)
    }

    /// Disks already hold state, as if from a previous run, so starting a server writes nothing.
    pub(super) fn with_persisted_state(size: usize, term: Term, voted_for: Option<&str>) -> Self {
        let members = (1..=size)
            .map(|i| Endpoint::new(format!("server-{}", i), "127.0.0.1", 7000 + i as u16))
            .collect();

        TestCluster {
            members,
            network: MemoryNetwork::new(),
            disks: Disks {
                term: MemoryDisk::with_value(term),
                vote: MemoryDisk::with_value(voted_for.map(ServerId::new)),
                log: MemoryDisk::with_value(vec![]),
            },
            spy: Spy::default(),
        }
    }

    pub(super) fn endpoint(&self, id: &str) -> Endpoint {
        self.members
            .iter()
            .find(|m| m.id().as_str() == id)
            .cloned()
            .expect("not a member")
    }

    pub(super) fn server(&self, id: &str) -> Server<SpyTransport> {
        self.server_with_timeouts(id, MIN_TIMEOUT, MAX_TIMEOUT)
    }

    pub(super) fn server_with_timeouts(&self, id: &str, min: Duration, max: Duration) -> Server<SpyTransport> {
        let cluster = Cluster::new(ServerId::new(id), self.members.clone()).unwrap();
        let storage = ServerStorage {
            current_term: Box::new(MemoryValue::with_disk("current-term", self.disks.term.clone())),
            voted_for: Box::new(MemoryValue::with_disk("voted-for", self.disks.vote.clone())),
            log: Box::new(MemoryLog::with_disk(self.disks.log.clone())),
        };
        let transport = SpyTransport {
            inner: self.network.transport(),
            spy: self.spy.clone(),
            disks: self.disks.clone(),
        };
        let rpc = RpcService::new(test_logger(), transport);

        Server::new(
            test_logger(),
            cluster,
            storage,
            ElectionTimer::new(min, max).unwrap(),
            HEARTBEAT,
            rpc,
        )
    }

    /// A bare RPC service listening as `id`, standing in for a peer.
    pub(super) async fn fake_peer(&self, id: &str) -> RpcService<MemoryTransport> {
        let mut rpc = RpcService::new(test_logger(), self.network.transport());
        rpc.listen(&self.endpoint(id)).await.unwrap();
        rpc
    }

    pub(super) fn inbound(&self, from: &str, message: RpcMessage) -> ServerEvent {
        ServerEvent::Inbound(Inbound {
            from: self.endpoint(from),
            message,
        })
    }
}
