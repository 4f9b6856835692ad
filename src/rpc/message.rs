use crate::cluster::{Endpoint, ServerId};
use crate::storage::{Index, LogEntry, Term};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Procedure {
    AppendEntries,
    RequestVote,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum CallType {
    Request,
    Response,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppendEntriesArgs {
    pub term: Term,
    pub leader_id: ServerId,
    pub prev_log_index: Index,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit: Index,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppendEntriesResults {
    pub term: Term,
    pub success: bool,
    pub follower_id: ServerId,
    pub follower_commit: Index,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestVoteArgs {
    pub term: Term,
    pub candidate_id: ServerId,
    pub last_log_index: Index,
    pub last_log_term: Term,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestVoteResults {
    pub term: Term,
    pub vote_granted: bool,
}

/// RpcMessage is every shape a peer can send. (procedure, call type) pairs map 1:1 onto
/// variants, so there is no way to build a message with a mismatched payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcMessage {
    AppendEntriesRequest(AppendEntriesArgs),
    AppendEntriesResponse(AppendEntriesResults),
    RequestVoteRequest(RequestVoteArgs),
    RequestVoteResponse(RequestVoteResults),
}

impl RpcMessage {
    pub fn procedure(&self) -> Procedure {
        match self {
            RpcMessage::AppendEntriesRequest(_) | RpcMessage::AppendEntriesResponse(_) => Procedure::AppendEntries,
            RpcMessage::RequestVoteRequest(_) | RpcMessage::RequestVoteResponse(_) => Procedure::RequestVote,
        }
    }

    pub fn call_type(&self) -> CallType {
        match self {
            RpcMessage::AppendEntriesRequest(_) | RpcMessage::RequestVoteRequest(_) => CallType::Request,
            RpcMessage::AppendEntriesResponse(_) | RpcMessage::RequestVoteResponse(_) => CallType::Response,
        }
    }

    pub fn is_response(&self) -> bool {
        self.call_type() == CallType::Response
    }

    /// The sender's term. Every message carries one.
    pub fn term(&self) -> Term {
        match self {
            RpcMessage::AppendEntriesRequest(args) => args.term,
            RpcMessage::AppendEntriesResponse(results) => results.term,
            RpcMessage::RequestVoteRequest(args) => args.term,
            RpcMessage::RequestVoteResponse(results) => results.term,
        }
    }
}

/// Inbound is a decoded message along with the endpoint it came from.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub from: Endpoint,
    pub message: RpcMessage,
}
