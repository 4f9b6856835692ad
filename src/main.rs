use raft_election::{Endpoint, ServerConfig, ServerOptions, StorageConfig, TcpTransport};
use slog::Drain;
use std::error::Error;
use tokio::time::Duration;

const NUM_MEMBERS: usize = 3;
const PORT_BASE: u16 = 5101;

/// Runs a small cluster over loopback TCP until one member becomes leader, then shuts it down.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let root_logger = create_root_logger_for_stdout();
    let members = cluster_members();

    let mut handles = Vec::with_capacity(NUM_MEMBERS);
    for member in members.iter() {
        let config = ServerConfig {
            logger: root_logger.clone(),
            server_id: member.id().to_string(),
            members: members.clone(),
            storage: StorageConfig::in_memory(),
            options: ServerOptions {
                heartbeat_interval: Some(Duration::from_millis(100)),
                election_timeout_min: Some(Duration::from_millis(500)),
                election_timeout_max: Some(Duration::from_millis(1000)),
            },
        };
        let transport = TcpTransport::new(root_logger.clone());
        let server = raft_election::create_server(config, transport).await?;
        handles.push(raft_election::spawn_server(server).await?);
    }

    let mut listener = handles[0].status_listener();
    let status = tokio::time::timeout(
        Duration::from_secs(10),
        listener.wait_for(|status| status.leader.is_some()),
    )
    .await?
    .ok_or("server exited before a leader was elected")?;

    let leader = status.leader.ok_or("missing leader")?;
    slog::info!(root_logger, "Elected {} in term {}", leader, status.term);

    for handle in handles {
        handle.stop().await?;
    }

    Ok(())
}

fn cluster_members() -> Vec<Endpoint> {
    (0..NUM_MEMBERS)
        .map(|i| Endpoint::new(format!("server-{}", i + 1), "127.0.0.1", PORT_BASE + i as u16))
        .collect()
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}
