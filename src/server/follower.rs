use crate::server::state::{FollowerState, State};
use crate::server::{Server, ServerError, StateType};
use crate::transport::Transport;

impl<T: Transport> Server<T> {
    pub(super) fn enter_follower(&mut self) {
        self.election_timer.start();
        self.state = State::Follower(FollowerState {
            election_timer: self.election_timer.subscribe(),
        });
    }

    /// A current leader exists, hold off the election.
    pub(super) fn follower_on_append_entries(&mut self, accepted: bool) {
        if accepted {
            self.election_timer.reset();
        }
    }

    /// Called once a granted vote has been durably sent.
    pub(super) fn follower_on_vote_granted(&mut self) {
        if let State::Follower(_) = self.state {
            self.election_timer.reset();
        }
    }

    pub(super) fn follower_on_election_timeout(&mut self) -> Result<(), ServerError> {
        slog::info!(self.logger, "No word from a leader, starting an election.");
        self.transition_to(StateType::Candidate)
    }
}
