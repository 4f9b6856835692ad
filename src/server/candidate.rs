use crate::cluster::Endpoint;
use crate::rpc::{RequestVoteArgs, RequestVoteResults, RpcMessage};
use crate::server::state::{CandidateState, State};
use crate::server::{Destination, Server, ServerError, StateType};
use crate::transport::Transport;
use std::collections::HashSet;

impl<T: Transport> Server<T> {
    /// Starts an election in a new term. Returns `Leader` if the local vote alone is a majority.
    pub(super) fn enter_candidate(&mut self) -> Result<Option<StateType>, ServerError> {
        let mut votes = HashSet::new();

        let term = self
            .current_term()
            .next()
            .ok_or_else(|| ServerError::TermExhausted(self.current_term()))?;
        self.set_current_term(term);
        let me = self.id().clone();
        self.set_voted_for(me.clone());
        votes.insert(me.clone());

        self.election_timer.reset();
        let has_majority = votes.len() >= self.cluster.majority();
        self.state = State::Candidate(CandidateState {
            votes,
            election_timer: self.election_timer.subscribe(),
        });
        if has_majority {
            return Ok(Some(StateType::Leader));
        }

        slog::info!(self.logger, "Requesting votes for term {:?}", term);
        let request = RpcMessage::RequestVoteRequest(RequestVoteArgs {
            term,
            candidate_id: me,
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        });
        self.dispatch(Destination::Broadcast, &request)?;

        Ok(None)
    }

    pub(super) fn candidate_on_request_vote_response(
        &mut self,
        from: &Endpoint,
        results: RequestVoteResults,
    ) -> Result<(), ServerError> {
        let current_term = self.current_term();
        let majority = self.cluster.majority();
        let known_member = self.cluster.contains_member(from.id());

        let votes = match &mut self.state {
            State::Candidate(candidate) => &mut candidate.votes,
            _ => return Ok(()),
        };
        if results.term != current_term {
            slog::debug!(self.logger, "Ignoring vote from {} for term {:?}", from, results.term);
            return Ok(());
        }
        if !results.vote_granted || !known_member {
            return Ok(());
        }

        votes.insert(from.id().clone());
        let vote_count = votes.len();
        slog::info!(
            self.logger,
            "Received vote from {}, have {} of {} needed",
            from,
            vote_count,
            majority
        );

        if vote_count >= majority {
            self.transition_to(StateType::Leader)?;
        }

        Ok(())
    }

    /// Someone else already won this term.
    pub(super) fn candidate_on_append_entries(&mut self, accepted: bool) -> Result<(), ServerError> {
        if accepted {
            self.transition_to(StateType::Follower)?;
        }

        Ok(())
    }

    /// No decision this round, start over in the next term.
    pub(super) fn candidate_on_election_timeout(&mut self) -> Result<(), ServerError> {
        slog::info!(self.logger, "Election for term {:?} timed out", self.current_term());
        self.switch_to(StateType::Candidate)
    }
}
