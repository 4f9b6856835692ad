//! Configuring and creating a `Server`.
mod options;
mod wiring;

pub use options::ServerOptions;
pub use wiring::create_server;
pub use wiring::ServerConfig;
pub use wiring::ServerCreationError;
pub use wiring::StorageConfig;
