//! Elects a leader among three servers keeping their state under a data directory, then restarts
//! them to show that terms and votes survive.
use raft_election::{Endpoint, MemoryNetwork, ServerConfig, ServerHandle, ServerOptions, StorageConfig};
use slog::Drain;
use std::error::Error;
use std::path::Path;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let logger = create_root_logger_for_stdout();
    let data_dir = std::env::temp_dir().join("raft-election-demo");
    let network = MemoryNetwork::new();

    for round in 1..=2 {
        let handles = start_cluster(&logger, &data_dir, &network).await?;
        let leader = wait_for_leader(&handles).await?;
        slog::info!(logger, "Round {}: {:?} is leader in term {}", round, leader.leader, leader.term);

        for handle in handles {
            handle.stop().await?;
        }
    }

    Ok(())
}

async fn start_cluster(
    logger: &slog::Logger,
    data_dir: &Path,
    network: &MemoryNetwork,
) -> Result<Vec<ServerHandle>, Box<dyn Error>> {
    let members: Vec<_> = (1..=3)
        .map(|i| Endpoint::new(format!("server-{}", i), "localhost", 6000 + i))
        .collect();

    let mut handles = Vec::with_capacity(members.len());
    for member in members.iter() {
        let config = ServerConfig {
            logger: logger.clone(),
            server_id: member.id().to_string(),
            members: members.clone(),
            storage: StorageConfig::DataDir(data_dir.join(member.id().as_str())),
            options: ServerOptions::default(),
        };
        let server = raft_election::create_server(config, network.transport()).await?;
        handles.push(raft_election::spawn_server(server).await?);
    }

    Ok(handles)
}

async fn wait_for_leader(handles: &[ServerHandle]) -> Result<raft_election::ServerStatus, Box<dyn Error>> {
    let mut listener = handles[0].status_listener();
    let status = tokio::time::timeout(
        Duration::from_secs(5),
        listener.wait_for(|status| status.leader.is_some()),
    )
    .await?
    .ok_or("server exited")?;

    Ok(status)
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}
