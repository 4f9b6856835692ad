mod codec;
mod error;
mod message;
mod registry;
mod service;

pub use codec::Codec;
pub use codec::CodecError;
pub use codec::ProstCodec;
pub use error::RpcError;
pub use message::AppendEntriesArgs;
pub use message::AppendEntriesResults;
pub use message::CallType;
pub use message::Inbound;
pub use message::Procedure;
pub use message::RequestVoteArgs;
pub use message::RequestVoteResults;
pub use message::RpcMessage;
pub use registry::ReceiverKey;
pub use registry::RpcReceiver;
pub use service::PreparedSend;
pub use service::RpcService;
pub use service::SendOutcome;
