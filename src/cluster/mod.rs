mod cluster;
mod endpoint;

pub use cluster::Cluster;
pub use cluster::ClusterError;
pub use endpoint::Endpoint;
pub use endpoint::ServerId;
