use crate::rpc::CodecError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("RPC service is already listening")]
    AlreadyListening,
    #[error("Failed to encode message")]
    Codec(#[from] CodecError),
    #[error("Transport failure")]
    Transport(#[from] TransportError),
}
