use crate::cluster::Endpoint;
use crate::rpc::{AppendEntriesArgs, AppendEntriesResults, RpcMessage};
use crate::server::state::{LeaderState, State};
use crate::server::{Destination, Server, ServerError};
use crate::storage::Index;
use crate::transport::Transport;
use tokio::time::{self, Instant, MissedTickBehavior};

impl<T: Transport> Server<T> {
    pub(super) fn enter_leader(&mut self) -> Result<(), ServerError> {
        let next_index = self.log.next_index().ok_or(ServerError::LogFull)?;
        let peers: Vec<_> = self.cluster.peers().map(|peer| peer.id().clone()).collect();

        // The first beat goes out right away below, the interval covers the ones after it.
        let mut heartbeat = time::interval_at(Instant::now() + self.heartbeat_interval, self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.leader = Some(self.cluster.local_endpoint().clone());
        self.state = State::Leader(LeaderState {
            next_index: peers.iter().map(|id| (id.clone(), next_index)).collect(),
            match_index: peers.into_iter().map(|id| (id, Index::SENTINEL)).collect(),
            heartbeat,
        });
        slog::info!(self.logger, "Became leader for term {:?}", self.current_term());

        self.broadcast_heartbeat()
    }

    /// Sends an empty AppendEntries to every peer. Does nothing unless leader.
    pub(super) fn broadcast_heartbeat(&mut self) -> Result<(), ServerError> {
        if !matches!(self.state, State::Leader(_)) {
            return Ok(());
        }

        let heartbeat = RpcMessage::AppendEntriesRequest(AppendEntriesArgs {
            term: self.current_term(),
            leader_id: self.id().clone(),
            prev_log_index: self.log.last_index(),
            prev_log_term: self.log.last_term(),
            entries: vec![],
            leader_commit: self.commit_index,
        });
        self.dispatch(Destination::Broadcast, &heartbeat)
    }

    pub(super) fn leader_on_append_entries(&mut self, from: &Endpoint, accepted: bool) {
        if accepted {
            slog::error!(
                self.logger,
                "{} claims leadership of term {:?}, which is ours",
                from,
                self.current_term()
            );
        }
    }

    pub(super) fn leader_on_append_entries_response(&mut self, from: &Endpoint, results: AppendEntriesResults) {
        let current_term = self.current_term();
        let leader = match &mut self.state {
            State::Leader(leader) => leader,
            _ => return,
        };
        if results.term != current_term {
            return;
        }

        if results.success {
            slog::debug!(
                self.logger,
                "{} acknowledged heartbeat, follower commit {:?}",
                from,
                results.follower_commit
            );
        } else if let Some(next) = leader.next_index.get_mut(from.id()) {
            // Back off one entry for the next attempt.
            *next = Index::new(next.as_u64().saturating_sub(1).max(1));
        }
    }
}
