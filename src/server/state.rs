use crate::cluster::ServerId;
use crate::storage::Index;
use crate::timer::{TimerEvent, TimerSubscription};
use std::collections::{HashMap, HashSet};
use tokio::time::Interval;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StateType {
    Stopped,
    Follower,
    Candidate,
    Leader,
}

/// State is the active role along with the data only that role uses. `Stopped` is the role
/// before `start()` and after `stop()`.
pub(super) enum State {
    Stopped,
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(LeaderState),
}

pub(super) struct FollowerState {
    pub(super) election_timer: TimerSubscription,
}

pub(super) struct CandidateState {
    pub(super) votes: HashSet<ServerId>,
    pub(super) election_timer: TimerSubscription,
}

pub(super) struct LeaderState {
    pub(super) next_index: HashMap<ServerId, Index>,
    pub(super) match_index: HashMap<ServerId, Index>,
    pub(super) heartbeat: Interval,
}

#[derive(Debug)]
pub enum StateEvent {
    ElectionTimer(TimerEvent),
    Heartbeat,
}

impl State {
    pub(super) fn state_type(&self) -> StateType {
        match self {
            State::Stopped => StateType::Stopped,
            State::Follower(_) => StateType::Follower,
            State::Candidate(_) => StateType::Candidate,
            State::Leader(_) => StateType::Leader,
        }
    }

    /// Waits for the next event the active role produces. Pends forever when stopped.
    pub(super) async fn next_event(&mut self) -> Option<StateEvent> {
        match self {
            State::Stopped => futures::future::pending().await,
            State::Follower(FollowerState { election_timer })
            | State::Candidate(CandidateState { election_timer, .. }) => {
                election_timer.recv().await.map(StateEvent::ElectionTimer)
            }
            State::Leader(leader) => {
                leader.heartbeat.tick().await;
                Some(StateEvent::Heartbeat)
            }
        }
    }
}
