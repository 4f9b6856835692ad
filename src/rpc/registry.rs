use crate::rpc::{CallType, Inbound, Procedure, RpcMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;

/// ReceiverKey is the (procedure, call type) pair a message is dispatched on.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct ReceiverKey {
    pub procedure: Procedure,
    pub call_type: CallType,
}

impl ReceiverKey {
    pub const ALL: [ReceiverKey; 4] = [
        ReceiverKey::new(Procedure::AppendEntries, CallType::Request),
        ReceiverKey::new(Procedure::AppendEntries, CallType::Response),
        ReceiverKey::new(Procedure::RequestVote, CallType::Request),
        ReceiverKey::new(Procedure::RequestVote, CallType::Response),
    ];

    pub const fn new(procedure: Procedure, call_type: CallType) -> Self {
        ReceiverKey { procedure, call_type }
    }

    pub fn of(message: &RpcMessage) -> Self {
        ReceiverKey::new(message.procedure(), message.call_type())
    }

    fn partition(&self) -> usize {
        match (self.procedure, self.call_type) {
            (Procedure::AppendEntries, CallType::Request) => 0,
            (Procedure::AppendEntries, CallType::Response) => 1,
            (Procedure::RequestVote, CallType::Request) => 2,
            (Procedure::RequestVote, CallType::Response) => 3,
        }
    }
}

pub(super) type SharedRegistry = Arc<Mutex<ReceiverRegistry>>;

/// ReceiverRegistry keeps one partition of receivers per `ReceiverKey`. A receiver registered
/// for a single key only ever sees messages of that shape.
#[derive(Default)]
pub(super) struct ReceiverRegistry {
    partitions: [HashMap<u64, mpsc::UnboundedSender<Inbound>>; 4],
    next_id: u64,
}

impl ReceiverRegistry {
    pub(super) fn register(registry: &SharedRegistry, keys: &[ReceiverKey]) -> RpcReceiver {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut locked = lock(registry);
        let id = locked.next_id;
        locked.next_id += 1;
        for key in keys {
            locked.partitions[key.partition()].insert(id, tx.clone());
        }

        RpcReceiver {
            id,
            receiver: rx,
            registry: Arc::downgrade(registry),
        }
    }

    /// Hands `inbound` to every receiver in its partition. Returns how many received it.
    pub(super) fn dispatch(&mut self, inbound: Inbound) -> usize {
        let partition = &mut self.partitions[ReceiverKey::of(&inbound.message).partition()];
        partition.retain(|_, tx| tx.send(inbound.clone()).is_ok());
        partition.len()
    }

    fn detach(&mut self, id: u64) {
        for partition in self.partitions.iter_mut() {
            partition.remove(&id);
        }
    }

    pub(super) fn len(&self, key: ReceiverKey) -> usize {
        self.partitions[key.partition()].len()
    }
}

pub(super) fn lock(registry: &SharedRegistry) -> MutexGuard<'_, ReceiverRegistry> {
    // Every critical section is a plain map update.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// RpcReceiver yields the messages dispatched to it. Dropping it detaches it from the registry,
/// after which no new message reaches it.
pub struct RpcReceiver {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Inbound>,
    registry: Weak<Mutex<ReceiverRegistry>>,
}

impl RpcReceiver {
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Inbound> {
        self.receiver.try_recv().ok()
    }

    pub fn detach(self) {}
}

impl Drop for RpcReceiver {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).detach(self.id);
        }
    }
}
