use crate::cluster::Endpoint;
use crate::rpc::{
    AppendEntriesArgs, AppendEntriesResults, Inbound, RequestVoteArgs, RequestVoteResults, RpcMessage,
};
use crate::server::{Destination, Server, ServerError, StateType};
use crate::storage::{Index, Term};
use crate::transport::Transport;

// Behavior shared by every role. Each inbound message goes through the term rule first, then the
// shared reply logic, then whatever the active role adds on top.
impl<T: Transport> Server<T> {
    pub(super) async fn handle_inbound(&mut self, inbound: Inbound) -> Result<(), ServerError> {
        let Inbound { from, message } = inbound;

        let message_term = message.term();
        if message_term.next().is_none() {
            // Adopting it would leave no term for any later election.
            slog::warn!(
                self.logger,
                "Dropping {:?} from {} with unusable term {:?}",
                message.procedure(),
                from,
                message_term
            );
            return Ok(());
        }
        if message_term > self.current_term() {
            slog::info!(
                self.logger,
                "Saw term {:?} from {}, newer than our {:?}",
                message_term,
                from,
                self.current_term()
            );
            self.set_current_term(message_term);
            self.transition_to(StateType::Follower)?;
        }

        match message {
            RpcMessage::AppendEntriesRequest(args) => self.handle_append_entries(from, args).await,
            RpcMessage::AppendEntriesResponse(results) => {
                self.leader_on_append_entries_response(&from, results);
                Ok(())
            }
            RpcMessage::RequestVoteRequest(args) => self.handle_request_vote(from, args).await,
            RpcMessage::RequestVoteResponse(results) => self.candidate_on_request_vote_response(&from, results),
        }
    }

    async fn handle_append_entries(&mut self, from: Endpoint, args: AppendEntriesArgs) -> Result<(), ServerError> {
        let current_term = self.current_term();
        let success = append_entries_succeeds(args.term, current_term);
        if success {
            let leader = self.cluster.member(&args.leader_id).cloned().unwrap_or_else(|| from.clone());
            self.leader = Some(leader);
            self.commit_index = advance_commit_index(self.commit_index, args.leader_commit, self.log.last_index());
        } else {
            slog::debug!(
                self.logger,
                "Rejecting AppendEntries from {} with stale term {:?}",
                from,
                args.term
            );
        }

        match self.state.state_type() {
            StateType::Follower => self.follower_on_append_entries(success),
            StateType::Candidate => self.candidate_on_append_entries(success)?,
            StateType::Leader => self.leader_on_append_entries(&from, success),
            StateType::Stopped => {}
        }

        let response = RpcMessage::AppendEntriesResponse(AppendEntriesResults {
            term: current_term,
            success,
            follower_id: self.id().clone(),
            follower_commit: self.commit_index,
        });
        self.send_peer_rpc_message(Destination::Unicast(from), response).await
    }

    async fn handle_request_vote(&mut self, from: Endpoint, args: RequestVoteArgs) -> Result<(), ServerError> {
        let current_term = self.current_term();

        let vote_granted = if args.term < current_term {
            slog::info!(self.logger, "Not granting vote. Candidate term is out of date.");
            false
        } else if !self.cluster.contains_member(&args.candidate_id) {
            slog::warn!(self.logger, "Not granting vote. {} is not a cluster member.", args.candidate_id);
            false
        } else if !is_log_up_to_date(
            args.last_log_term,
            args.last_log_index,
            self.log.last_term(),
            self.log.last_index(),
        ) {
            slog::info!(self.logger, "Not granting vote. Candidate log is out of date.");
            false
        } else if !self.set_voted_for(args.candidate_id.clone()) {
            slog::info!(self.logger, "Not granting vote. We already voted for {:?}.", self.voted_for());
            false
        } else {
            slog::info!(self.logger, "Voting for {:?}.", args.candidate_id);
            true
        };

        let response = RpcMessage::RequestVoteResponse(RequestVoteResults {
            term: current_term,
            vote_granted,
        });
        self.send_peer_rpc_message(Destination::Unicast(from), response).await?;

        // The vote is durable now.
        if vote_granted {
            self.follower_on_vote_granted();
        }

        Ok(())
    }
}

/// A leader is only recognized if its term is at least ours.
pub(super) fn append_entries_succeeds(leader_term: Term, current_term: Term) -> bool {
    leader_term >= current_term
}

/// A candidate's log is up to date if its last term is newer, or the same with an index at least
/// as far along.
pub(super) fn is_log_up_to_date(
    candidate_last_term: Term,
    candidate_last_index: Index,
    local_last_term: Term,
    local_last_index: Index,
) -> bool {
    (candidate_last_term, candidate_last_index) >= (local_last_term, local_last_index)
}

/// Commit index never moves backwards, and never past what is in the local log.
pub(super) fn advance_commit_index(commit_index: Index, leader_commit: Index, last_log_index: Index) -> Index {
    commit_index.max(leader_commit.min(last_log_index))
}
