//! Runs a `Server` on its own task. Every inbound message, timer event and command goes through
//! one loop, so server state is never touched concurrently.
use crate::server::{Server, ServerError, ServerStatus, StatusListener};
use crate::transport::Transport;
use std::error::Error;
use std::fmt::Debug;
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER_SIZE: usize = 16;

/// Starts `server` and moves it onto a spawned event loop.
///
/// The loop exits, stopping the server, once `ServerHandle::stop` is called or every handle
/// has been dropped.
pub async fn spawn_server<T: Transport>(mut server: Server<T>) -> Result<ServerHandle, ServerError> {
    server.start().await?;

    let (handle, actor) = create(COMMAND_BUFFER_SIZE, server);
    tokio::spawn(actor.run());

    Ok(handle)
}

fn create<T: Transport>(buffer_size: usize, server: Server<T>) -> (ServerHandle, ServerActor<T>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = ServerHandle {
        sender: tx,
        status: server.status_listener(),
    };
    let actor = ServerActor { receiver: rx, server };

    (handle, actor)
}

#[derive(Debug)]
enum Command {
    Stop(Callback<(), ServerError>),
}

#[derive(Debug)]
struct Callback<O: Debug, E: Error>(oneshot::Sender<Result<O, E>>);

impl<O: Debug, E: Error> Callback<O, E> {
    fn send(self, message: Result<O, E>) {
        let _ = self.0.send(message);
    }
}

#[derive(Clone)]
pub struct ServerHandle {
    sender: mpsc::Sender<Command>,
    status: StatusListener,
}

impl ServerHandle {
    pub fn status(&self) -> ServerStatus {
        self.status.current()
    }

    pub fn status_listener(&self) -> StatusListener {
        self.status.clone()
    }

    /// Stops the server and waits for it to finish stopping.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Stop(Callback(tx)))
            .await
            .map_err(|_| ServerError::ActorExited)?;

        rx.await.map_err(|_| ServerError::ActorExited)?
    }
}

struct ServerActor<T: Transport> {
    receiver: mpsc::Receiver<Command>,
    server: Server<T>,
}

impl<T: Transport> ServerActor<T> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.receiver.recv() => match command {
                    Some(Command::Stop(callback)) => {
                        callback.send(self.server.stop().await);
                        return;
                    }
                    None => {
                        slog::info!(self.server.logger, "All server handles dropped");
                        if let Err(e) = self.server.stop().await {
                            slog::warn!(self.server.logger, "Failed to stop server: {:?}", e);
                        }
                        return;
                    }
                },
                event = self.server.next_event() => {
                    if let Err(e) = self.server.handle_event(event).await {
                        slog::error!(self.server.logger, "Failed to handle event: {:?}", e);
                    }
                }
            }
        }
    }
}
