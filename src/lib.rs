mod actor;
mod api;
mod cluster;
mod rpc;
mod server;
mod storage;
mod timer;
mod transport;

pub use actor::spawn_server;
pub use actor::ServerHandle;
pub use api::create_server;
pub use api::ServerConfig;
pub use api::ServerCreationError;
pub use api::ServerOptions;
pub use api::StorageConfig;
pub use cluster::Cluster;
pub use cluster::ClusterError;
pub use cluster::Endpoint;
pub use cluster::ServerId;
pub use rpc::AppendEntriesArgs;
pub use rpc::AppendEntriesResults;
pub use rpc::CallType;
pub use rpc::Codec;
pub use rpc::CodecError;
pub use rpc::Inbound;
pub use rpc::PreparedSend;
pub use rpc::Procedure;
pub use rpc::ProstCodec;
pub use rpc::ReceiverKey;
pub use rpc::RequestVoteArgs;
pub use rpc::RequestVoteResults;
pub use rpc::RpcError;
pub use rpc::RpcMessage;
pub use rpc::RpcReceiver;
pub use rpc::RpcService;
pub use rpc::SendOutcome;
pub use server::Destination;
pub use server::Server;
pub use server::ServerError;
pub use server::ServerEvent;
pub use server::ServerStatus;
pub use server::ServerStorage;
pub use server::StateEvent;
pub use server::StateType;
pub use server::StatusListener;
pub use storage::DurableValue;
pub use storage::FileLog;
pub use storage::FileValue;
pub use storage::Index;
pub use storage::Log;
pub use storage::LogEntry;
pub use storage::MemoryDisk;
pub use storage::MemoryLog;
pub use storage::MemoryValue;
pub use storage::Persist;
pub use storage::PersistenceError;
pub use storage::Term;
pub use timer::ElectionTimer;
pub use timer::InvalidTimeoutRange;
pub use timer::RealClock;
pub use timer::TimerEvent;
pub use timer::TimerSubscription;
pub use transport::InboundHandler;
pub use transport::MemoryNetwork;
pub use transport::MemoryTransport;
pub use transport::TcpTransport;
pub use transport::Transport;
pub use transport::TransportError;

// `crate::{root_mod}` holds no code, only `mod` and `pub use` statements. No `mod` is `pub`;
// everything public is exported through an individual use statement.
