use crate::cluster::{Endpoint, ServerId};
use crate::server::StateType;
use crate::storage::Term;
use tokio::sync::watch;

/// ServerStatus is a snapshot of the server as of the last handled event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerStatus {
    pub state: StateType,
    pub term: Term,
    pub voted_for: Option<ServerId>,
    /// Where clients should be redirected to, if a leader is known for this term.
    pub leader: Option<Endpoint>,
}

impl ServerStatus {
    pub(super) fn stopped() -> Self {
        ServerStatus {
            state: StateType::Stopped,
            term: Term::default(),
            voted_for: None,
            leader: None,
        }
    }
}

pub(super) fn new() -> (StatusPublisher, StatusListener) {
    let (sender, receiver) = watch::channel(ServerStatus::stopped());

    (StatusPublisher { sender }, StatusListener { receiver })
}

pub(super) struct StatusPublisher {
    sender: watch::Sender<ServerStatus>,
}

impl StatusPublisher {
    pub(super) fn publish(&self, status: ServerStatus) {
        self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub(super) fn listener(&self) -> StatusListener {
        StatusListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct StatusListener {
    receiver: watch::Receiver<ServerStatus>,
}

impl StatusListener {
    pub fn current(&self) -> ServerStatus {
        self.receiver.borrow().clone()
    }

    /// Waits for the next change. `None` once the server is gone.
    pub async fn next(&mut self) -> Option<ServerStatus> {
        match self.receiver.changed().await {
            Ok(_) => Some(self.receiver.borrow_and_update().clone()),
            Err(_) => None,
        }
    }

    /// Waits until the status satisfies `predicate`, checking the current status first.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<ServerStatus>
    where
        F: FnMut(&ServerStatus) -> bool,
    {
        loop {
            let status = self.receiver.borrow_and_update().clone();
            if predicate(&status) {
                return Some(status);
            }
            if self.receiver.changed().await.is_err() {
                return None;
            }
        }
    }
}
