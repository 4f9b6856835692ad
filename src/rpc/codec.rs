use crate::cluster::ServerId;
use crate::rpc::{AppendEntriesArgs, AppendEntriesResults, RequestVoteArgs, RequestVoteResults, RpcMessage};
use crate::storage::{Index, LogEntry, Term};
use bytes::Bytes;
use prost::Message;

/// Codec turns messages into bytes for the transport and back.
pub trait Codec: Send + Sync + 'static {
    fn encode(&self, message: &RpcMessage) -> Result<Bytes, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<RpcMessage, CodecError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode message")]
    Encode(#[from] prost::EncodeError),
    #[error("Failed to decode message")]
    Decode(#[from] prost::DecodeError),
    #[error("Decoded envelope has no message body")]
    EmptyEnvelope,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ProstCodec;

impl Codec for ProstCodec {
    fn encode(&self, message: &RpcMessage) -> Result<Bytes, CodecError> {
        let envelope = proto::Envelope::from(message);
        let mut buf = Vec::with_capacity(envelope.encoded_len());
        envelope.encode(&mut buf)?;

        Ok(Bytes::from(buf))
    }

    fn decode(&self, bytes: &[u8]) -> Result<RpcMessage, CodecError> {
        let envelope = proto::Envelope::decode(bytes)?;
        let body = envelope.body.ok_or(CodecError::EmptyEnvelope)?;

        Ok(RpcMessage::from(body))
    }
}

mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Envelope {
        #[prost(oneof = "envelope::Body", tags = "1, 2, 3, 4")]
        pub body: ::std::option::Option<envelope::Body>,
    }
    pub mod envelope {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Body {
            #[prost(message, tag = "1")]
            AppendEntriesRequest(super::AppendEntriesRequest),
            #[prost(message, tag = "2")]
            AppendEntriesResponse(super::AppendEntriesResponse),
            #[prost(message, tag = "3")]
            RequestVoteRequest(super::RequestVoteRequest),
            #[prost(message, tag = "4")]
            RequestVoteResponse(super::RequestVoteResponse),
        }
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AppendEntriesRequest {
        #[prost(uint64, tag = "1")]
        pub term: u64,
        #[prost(string, tag = "2")]
        pub leader_id: std::string::String,
        #[prost(uint64, tag = "3")]
        pub prev_log_index: u64,
        #[prost(uint64, tag = "4")]
        pub prev_log_term: u64,
        #[prost(message, repeated, tag = "5")]
        pub entries: std::vec::Vec<Entry>,
        #[prost(uint64, tag = "6")]
        pub leader_commit: u64,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        #[prost(uint64, tag = "1")]
        pub index: u64,
        #[prost(uint64, tag = "2")]
        pub term: u64,
        #[prost(bytes, tag = "3")]
        pub command: std::vec::Vec<u8>,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AppendEntriesResponse {
        #[prost(uint64, tag = "1")]
        pub term: u64,
        #[prost(bool, tag = "2")]
        pub success: bool,
        #[prost(string, tag = "3")]
        pub follower_id: std::string::String,
        #[prost(uint64, tag = "4")]
        pub follower_commit: u64,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RequestVoteRequest {
        #[prost(uint64, tag = "1")]
        pub term: u64,
        #[prost(string, tag = "2")]
        pub candidate_id: std::string::String,
        #[prost(uint64, tag = "3")]
        pub last_log_index: u64,
        #[prost(uint64, tag = "4")]
        pub last_log_term: u64,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RequestVoteResponse {
        #[prost(uint64, tag = "1")]
        pub term: u64,
        #[prost(bool, tag = "2")]
        pub vote_granted: bool,
    }
}

impl From<&RpcMessage> for proto::Envelope {
    fn from(message: &RpcMessage) -> Self {
        use proto::envelope::Body;

        let body = match message {
            RpcMessage::AppendEntriesRequest(args) => Body::AppendEntriesRequest(proto::AppendEntriesRequest {
                term: args.term.as_u64(),
                leader_id: args.leader_id.as_str().to_string(),
                prev_log_index: args.prev_log_index.as_u64(),
                prev_log_term: args.prev_log_term.as_u64(),
                entries: args
                    .entries
                    .iter()
                    .map(|e| proto::Entry {
                        index: e.index.as_u64(),
                        term: e.term.as_u64(),
                        command: e.command.to_vec(),
                    })
                    .collect(),
                leader_commit: args.leader_commit.as_u64(),
            }),
            RpcMessage::AppendEntriesResponse(results) => Body::AppendEntriesResponse(proto::AppendEntriesResponse {
                term: results.term.as_u64(),
                success: results.success,
                follower_id: results.follower_id.as_str().to_string(),
                follower_commit: results.follower_commit.as_u64(),
            }),
            RpcMessage::RequestVoteRequest(args) => Body::RequestVoteRequest(proto::RequestVoteRequest {
                term: args.term.as_u64(),
                candidate_id: args.candidate_id.as_str().to_string(),
                last_log_index: args.last_log_index.as_u64(),
                last_log_term: args.last_log_term.as_u64(),
            }),
            RpcMessage::RequestVoteResponse(results) => Body::RequestVoteResponse(proto::RequestVoteResponse {
                term: results.term.as_u64(),
                vote_granted: results.vote_granted,
            }),
        };

        proto::Envelope { body: Some(body) }
    }
}

impl From<proto::envelope::Body> for RpcMessage {
    fn from(body: proto::envelope::Body) -> Self {
        use proto::envelope::Body;

        match body {
            Body::AppendEntriesRequest(args) => RpcMessage::AppendEntriesRequest(AppendEntriesArgs {
                term: Term::new(args.term),
                leader_id: ServerId::new(args.leader_id),
                prev_log_index: Index::new(args.prev_log_index),
                prev_log_term: Term::new(args.prev_log_term),
                entries: args
                    .entries
                    .into_iter()
                    .map(|e| LogEntry::new(Index::new(e.index), Term::new(e.term), Bytes::from(e.command)))
                    .collect(),
                leader_commit: Index::new(args.leader_commit),
            }),
            Body::AppendEntriesResponse(results) => RpcMessage::AppendEntriesResponse(AppendEntriesResults {
                term: Term::new(results.term),
                success: results.success,
                follower_id: ServerId::new(results.follower_id),
                follower_commit: Index::new(results.follower_commit),
            }),
            Body::RequestVoteRequest(args) => RpcMessage::RequestVoteRequest(RequestVoteArgs {
                term: Term::new(args.term),
                candidate_id: ServerId::new(args.candidate_id),
                last_log_index: Index::new(args.last_log_index),
                last_log_term: Term::new(args.last_log_term),
            }),
            Body::RequestVoteResponse(results) => RpcMessage::RequestVoteResponse(RequestVoteResults {
                term: Term::new(results.term),
                vote_granted: results.vote_granted,
            }),
        }
    }
}
