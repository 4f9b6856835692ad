mod base;
mod candidate;
mod error;
mod follower;
mod leader;
mod server;
mod state;
mod status;

pub use error::ServerError;
pub use server::Destination;
pub use server::Server;
pub use server::ServerEvent;
pub use server::ServerStorage;
pub use state::StateEvent;
pub use state::StateType;
pub use status::ServerStatus;
pub use status::StatusListener;

#[cfg(test)]
mod test_utils;
