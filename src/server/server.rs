use crate::cluster::{Cluster, Endpoint, ServerId};
use crate::rpc::{Inbound, RpcMessage, RpcReceiver, RpcService, SendOutcome};
use crate::server::state::{State, StateEvent};
use crate::server::status::{self, ServerStatus, StatusListener, StatusPublisher};
use crate::server::{ServerError, StateType};
use crate::storage::{DurableValue, Index, Log, Term};
use crate::timer::{ElectionTimer, TimerEvent};
use crate::transport::Transport;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Duration;

/// ServerStorage is the persistent state a server is built from.
pub struct ServerStorage {
    pub current_term: Box<dyn DurableValue<Term>>,
    pub voted_for: Box<dyn DurableValue<Option<ServerId>>>,
    pub log: Box<dyn Log>,
}

/// Destination picks which peers a message goes to.
#[derive(Clone, Debug)]
pub enum Destination {
    /// Every cluster member except the local server.
    Broadcast,
    Unicast(Endpoint),
    Multicast(Vec<Endpoint>),
}

#[derive(Debug)]
pub enum ServerEvent {
    Inbound(Inbound),
    State(StateEvent),
    SendCompleted(Result<Vec<SendOutcome>, JoinError>),
}

/// Server is one raft participant. It owns the persistent term, vote and log, the election timer,
/// the RPC service and the active role.
///
/// Every method runs on a single task (see `spawn_server`), so a handler runs to completion
/// between two awaits and role transitions never interleave with message handling.
pub struct Server<T: Transport> {
    pub(crate) logger: slog::Logger,
    pub(super) cluster: Cluster,
    pub(super) heartbeat_interval: Duration,
    pub(super) current_term: Box<dyn DurableValue<Term>>,
    pub(super) voted_for: Box<dyn DurableValue<Option<ServerId>>>,
    pub(super) log: Box<dyn Log>,
    pub(super) commit_index: Index,
    pub(super) leader: Option<Endpoint>,
    pub(super) election_timer: ElectionTimer,
    pub(super) rpc: RpcService<T>,
    pub(super) base_receiver: Option<RpcReceiver>,
    pub(super) state: State,
    pub(super) outbound: JoinSet<Vec<SendOutcome>>,
    status: StatusPublisher,
}

impl<T: Transport> Server<T> {
    pub fn new(
        logger: slog::Logger,
        cluster: Cluster,
        storage: ServerStorage,
        election_timer: ElectionTimer,
        heartbeat_interval: Duration,
        rpc: RpcService<T>,
    ) -> Self {
        let logger = logger.new(slog::o!("ServerId" => cluster.local_id().to_string()));
        let (status, _) = status::new();

        Server {
            logger,
            cluster,
            heartbeat_interval,
            current_term: storage.current_term,
            voted_for: storage.voted_for,
            log: storage.log,
            commit_index: Index::SENTINEL,
            leader: None,
            election_timer,
            rpc,
            base_receiver: None,
            state: State::Stopped,
            outbound: JoinSet::new(),
            status,
        }
    }

    pub fn id(&self) -> &ServerId {
        self.cluster.local_id()
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn state_type(&self) -> StateType {
        self.state.state_type()
    }

    pub fn leader(&self) -> Option<&Endpoint> {
        self.leader.as_ref()
    }

    pub fn commit_index(&self) -> Index {
        self.commit_index
    }

    pub fn log(&self) -> &dyn Log {
        self.log.as_ref()
    }

    pub fn election_timer(&self) -> &ElectionTimer {
        &self.election_timer
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            state: self.state_type(),
            term: self.current_term(),
            voted_for: self.voted_for().cloned(),
            leader: self.leader.clone(),
        }
    }

    pub fn status_listener(&self) -> StatusListener {
        self.status.listener()
    }

    pub fn current_term(&self) -> Term {
        *self.current_term.value()
    }

    /// Moves the term forward and clears the vote. Returns false, changing nothing, unless
    /// `term` is newer than the current one.
    ///
    /// Only updates memory. The new term reaches disk before the next response goes out.
    pub fn set_current_term(&mut self, term: Term) -> bool {
        let current = self.current_term();
        if term <= current {
            if term < current {
                slog::warn!(self.logger, "Refusing to move term backwards from {:?} to {:?}", current, term);
            }
            return false;
        }

        slog::info!(self.logger, "Term {:?} -> {:?}", current, term);
        self.current_term.set_value(term);
        self.voted_for.set_value(None);
        self.leader = None;
        true
    }

    pub fn voted_for(&self) -> Option<&ServerId> {
        self.voted_for.value().as_ref()
    }

    /// Records a vote for `candidate` in the current term. A server votes at most once per term,
    /// so this refuses (returns false) if it already voted for someone else.
    pub fn set_voted_for(&mut self, candidate: ServerId) -> bool {
        match self.voted_for.value() {
            Some(existing) if existing != &candidate => false,
            _ => {
                self.voted_for.set_value(Some(candidate));
                true
            }
        }
    }

    /// Sends `message` to `destination`. Responses are only sent after the log, term and vote
    /// have been flushed; if the flush fails nothing is sent and the error is returned.
    pub async fn send_peer_rpc_message(
        &mut self,
        destination: Destination,
        message: RpcMessage,
    ) -> Result<(), ServerError> {
        if message.is_response() {
            self.update_persistent_state().await?;
        }

        self.dispatch(destination, &message)
    }

    /// Hands `message` to the RPC service without flushing anything. The actual sends run in
    /// the background.
    pub(super) fn dispatch(&mut self, destination: Destination, message: &RpcMessage) -> Result<(), ServerError> {
        let endpoints = match destination {
            Destination::Broadcast => self.cluster.peer_endpoints(),
            Destination::Unicast(endpoint) => vec![endpoint],
            Destination::Multicast(endpoints) => endpoints,
        };
        if endpoints.is_empty() {
            return Ok(());
        }

        let prepared = self.rpc.prepare(endpoints, message)?;
        self.outbound.spawn(prepared.deliver());

        Ok(())
    }

    async fn update_persistent_state(&mut self) -> Result<(), ServerError> {
        let flushed = async {
            self.log.write().await?;
            self.current_term.write().await?;
            self.voted_for.write().await
        };

        flushed.await.map_err(|e| {
            slog::error!(self.logger, "Failed to flush persistent state: {:?}", e);
            ServerError::from(e)
        })
    }

    /// Exits the current role and enters `target`. Entering the role that is already active
    /// does nothing.
    pub fn transition_to(&mut self, target: StateType) -> Result<(), ServerError> {
        if self.state.state_type() == target {
            return Ok(());
        }

        self.switch_to(target)
    }

    // Exit always completes before enter starts. Entering a role can immediately lead to another
    // one, e.g. a candidate in a single member cluster already holds a majority.
    pub(super) fn switch_to(&mut self, mut target: StateType) -> Result<(), ServerError> {
        loop {
            // Checked before exiting, so the current role survives.
            if target == StateType::Candidate && self.current_term().next().is_none() {
                slog::error!(self.logger, "Term {:?} is the last one, not starting an election", self.current_term());
                return Err(ServerError::TermExhausted(self.current_term()));
            }

            self.exit_state();
            slog::info!(self.logger, "Entering {:?} in term {:?}", target, self.current_term());

            let next = match target {
                StateType::Stopped => None,
                StateType::Follower => {
                    self.enter_follower();
                    None
                }
                StateType::Candidate => self.enter_candidate()?,
                StateType::Leader => {
                    self.enter_leader()?;
                    None
                }
            };

            match next {
                Some(next) => target = next,
                None => return Ok(()),
            }
        }
    }

    fn exit_state(&mut self) {
        // Dropping the old role drops its timer subscription or heartbeat interval.
        let previous = std::mem::replace(&mut self.state, State::Stopped);
        if let State::Follower(_) | State::Candidate(_) = previous {
            self.election_timer.stop();
        }
    }

    /// Loads persistent state, starts listening and becomes a follower.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        if self.base_receiver.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        self.current_term.read_if_exists_else_set_and_write(Term::default()).await?;
        self.voted_for.read_if_exists_else_set_and_write(None).await?;
        self.log.read().await?;

        // Register before listening, so nothing that arrives in between is dropped.
        let base_receiver = self.rpc.on_receive_any();
        self.rpc.listen(self.cluster.local_endpoint()).await?;
        self.base_receiver = Some(base_receiver);

        slog::info!(
            self.logger,
            "Starting in term {:?} with last log index {:?}",
            self.current_term(),
            self.log.last_index()
        );
        self.transition_to(StateType::Follower)?;
        self.publish_status();

        Ok(())
    }

    /// Exits the current role, detaches from the RPC service and closes it. Sends still in
    /// flight are cancelled.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        self.transition_to(StateType::Stopped)?;
        self.election_timer.stop();
        self.base_receiver = None;
        self.outbound = JoinSet::new();
        self.leader = None;

        let closed = if self.rpc.is_listening() {
            self.rpc.close().await.map_err(ServerError::from)
        } else {
            Ok(())
        };
        self.publish_status();
        slog::info!(self.logger, "Stopped in term {:?}", self.current_term());

        closed
    }

    /// Waits for the next thing the server has to react to. Cancel safe.
    pub async fn next_event(&mut self) -> ServerEvent {
        let base_receiver = &mut self.base_receiver;
        let state = &mut self.state;
        let outbound = &mut self.outbound;

        tokio::select! {
            Some(inbound) = recv_inbound(base_receiver) => ServerEvent::Inbound(inbound),
            Some(event) = state.next_event() => ServerEvent::State(event),
            Some(joined) = outbound.join_next(), if !outbound.is_empty() => ServerEvent::SendCompleted(joined),
            else => futures::future::pending().await,
        }
    }

    pub async fn handle_event(&mut self, event: ServerEvent) -> Result<(), ServerError> {
        let result = match event {
            ServerEvent::Inbound(inbound) => self.handle_inbound(inbound).await,
            ServerEvent::State(StateEvent::ElectionTimer(event)) => self.handle_timer_event(event),
            ServerEvent::State(StateEvent::Heartbeat) => self.broadcast_heartbeat(),
            ServerEvent::SendCompleted(Ok(_)) => Ok(()),
            ServerEvent::SendCompleted(Err(e)) => {
                if !e.is_cancelled() {
                    slog::error!(self.logger, "Send task failed: {:?}", e);
                }
                Ok(())
            }
        };

        self.publish_status();
        result
    }

    fn handle_timer_event(&mut self, event: TimerEvent) -> Result<(), ServerError> {
        if event != TimerEvent::Timeout {
            return Ok(());
        }

        match self.state.state_type() {
            StateType::Follower => self.follower_on_election_timeout(),
            StateType::Candidate => self.candidate_on_election_timeout(),
            StateType::Leader | StateType::Stopped => Ok(()),
        }
    }

    pub(super) fn publish_status(&self) {
        self.status.publish(self.status());
    }
}

async fn recv_inbound(receiver: &mut Option<RpcReceiver>) -> Option<Inbound> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => futures::future::pending().await,
    }
}
