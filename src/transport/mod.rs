mod api;
mod memory;
mod tcp;

pub use api::InboundHandler;
pub use api::Transport;
pub use api::TransportError;
pub use memory::MemoryNetwork;
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;
