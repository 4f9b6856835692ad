use crate::api::options::ServerOptionsValidated;
use crate::api::ServerOptions;
use crate::cluster::{Cluster, ClusterError, Endpoint, ServerId};
use crate::rpc::RpcService;
use crate::server::{Server, ServerStorage};
use crate::storage::{DurableValue, FileLog, FileValue, Log, MemoryLog, MemoryValue, Term};
use crate::timer::ElectionTimer;
use crate::transport::Transport;
use std::convert::TryFrom;
use std::io;
use std::path::PathBuf;

pub struct ServerConfig {
    pub logger: slog::Logger,
    pub server_id: String,
    /// Every member of the cluster, including this server.
    pub members: Vec<Endpoint>,
    pub storage: StorageConfig,
    pub options: ServerOptions,
}

/// StorageConfig says where persistent state comes from.
pub enum StorageConfig {
    /// Use these directly.
    Provided {
        current_term: Box<dyn DurableValue<Term>>,
        voted_for: Box<dyn DurableValue<Option<ServerId>>>,
        log: Box<dyn Log>,
    },
    /// Keep `current-term`, `voted-for` and `log` files in this directory, creating it if needed.
    DataDir(PathBuf),
}

impl StorageConfig {
    /// Nothing survives the process. Handy for tests and demos.
    pub fn in_memory() -> Self {
        StorageConfig::Provided {
            current_term: Box::new(MemoryValue::<Term>::new("current-term")),
            voted_for: Box::new(MemoryValue::<Option<ServerId>>::new("voted-for")),
            log: Box::new(MemoryLog::new()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerCreationError {
    #[error("Invalid cluster info")]
    InvalidCluster(#[from] ClusterError),
    #[error("Illegal options for configuring server: {0}")]
    IllegalOptions(String),
    #[error("Failed to create data directory {path:?}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub async fn create_server<T: Transport>(config: ServerConfig, transport: T) -> Result<Server<T>, ServerCreationError> {
    let options = ServerOptionsValidated::try_from(config.options)
        .map_err(|e| ServerCreationError::IllegalOptions(e.to_string()))?;

    let cluster = Cluster::new(ServerId::new(config.server_id), config.members)?;
    let storage = resolve_storage(config.storage).await?;
    let election_timer = ElectionTimer::new(options.election_timeout_min, options.election_timeout_max)
        .map_err(|e| ServerCreationError::IllegalOptions(e.to_string()))?;
    let rpc = RpcService::new(config.logger.clone(), transport);

    Ok(Server::new(
        config.logger,
        cluster,
        storage,
        election_timer,
        options.heartbeat_interval,
        rpc,
    ))
}

async fn resolve_storage(storage: StorageConfig) -> Result<ServerStorage, ServerCreationError> {
    match storage {
        StorageConfig::Provided {
            current_term,
            voted_for,
            log,
        } => Ok(ServerStorage {
            current_term,
            voted_for,
            log,
        }),
        StorageConfig::DataDir(path) => {
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|source| ServerCreationError::DataDir {
                    path: path.clone(),
                    source,
                })?;

            Ok(ServerStorage {
                current_term: Box::new(FileValue::<Term>::new(path.join("current-term"))),
                voted_for: Box::new(FileValue::<Option<ServerId>>::new(path.join("voted-for"))),
                log: Box::new(FileLog::new(path.join("log"))),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::StateType;
    use crate::transport::MemoryNetwork;
    use tokio::time::Duration;

    fn config(server_id: &str, storage: StorageConfig) -> ServerConfig {
        ServerConfig {
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            server_id: server_id.to_string(),
            members: vec![
                Endpoint::new("server-1", "127.0.0.1", 7001),
                Endpoint::new("server-2", "127.0.0.1", 7002),
            ],
            storage,
            options: ServerOptions::default(),
        }
    }

    #[tokio::test]
    async fn rejects_unknown_local_server() {
        let result = create_server(config("server-9", StorageConfig::in_memory()), MemoryNetwork::new().transport()).await;
        assert!(matches!(
            result,
            Err(ServerCreationError::InvalidCluster(ClusterError::LocalNotMember(_)))
        ));
    }

    #[tokio::test]
    async fn rejects_illegal_options() {
        let mut config = config("server-1", StorageConfig::in_memory());
        config.options.heartbeat_interval = Some(Duration::from_secs(1));

        let result = create_server(config, MemoryNetwork::new().transport()).await;
        assert!(matches!(result, Err(ServerCreationError::IllegalOptions(_))));
    }

    #[tokio::test]
    async fn data_dir_is_created_and_initialized_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("server-1");

        let mut server = create_server(
            config("server-1", StorageConfig::DataDir(data_dir.clone())),
            MemoryNetwork::new().transport(),
        )
        .await
        .unwrap();
        assert!(data_dir.is_dir());

        server.start().await.unwrap();
        assert_eq!(server.state_type(), StateType::Follower);
        assert_eq!(std::fs::read_to_string(data_dir.join("current-term")).unwrap(), "0");
        assert_eq!(std::fs::read_to_string(data_dir.join("voted-for")).unwrap(), "");
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn data_dir_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("current-term"), "6").unwrap();
        std::fs::write(dir.path().join("voted-for"), "server-2").unwrap();

        let mut server = create_server(
            config("server-1", StorageConfig::DataDir(dir.path().to_path_buf())),
            MemoryNetwork::new().transport(),
        )
        .await
        .unwrap();
        server.start().await.unwrap();

        assert_eq!(server.current_term(), Term::new(6));
        assert_eq!(server.voted_for(), Some(&ServerId::new("server-2")));
        server.stop().await.unwrap();
    }
}
