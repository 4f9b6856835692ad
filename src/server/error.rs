use crate::rpc::RpcError;
use crate::storage::{PersistenceError, Term};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to load or flush persistent state")]
    Persistence(#[from] PersistenceError),
    #[error("RPC service failure")]
    Rpc(#[from] RpcError),
    #[error("No term follows {0}, cannot start another election")]
    TermExhausted(Term),
    #[error("Log has no indices left")]
    LogFull,
    #[error("Server has already been started")]
    AlreadyStarted,
    #[error("Server event loop has exited")]
    ActorExited,
}
