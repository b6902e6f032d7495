//! TCP listener and per-connection tasks
//!
//! Each accepted socket gets one reader task (newline-delimited JSON in)
//! and one writer task draining the connection's outbound buffer. Ids are
//! assigned at accept time; admission is refused once the table is full or
//! a match has started.

pub mod protocol;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::World;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::now_secs;

use protocol::ClientMsg;

pub struct GameServer {
    config: Arc<Config>,
    world: Arc<Mutex<World>>,
}

impl GameServer {
    pub fn new(config: Arc<Config>, world: Arc<Mutex<World>>) -> Self {
        Self { config, world }
    }

    /// Accept connections until the match ends or the process is stopped
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.server_addr).await?;
        info!(addr = %self.config.server_addr, "server listening");

        let mut shutdown_rx = self.world.lock().subscribe_shutdown();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            debug!(%addr, "incoming connection");
                            self.accept(stream);
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("game over, closing listener");
                    break;
                }
            }
        }
        Ok(())
    }

    fn accept(&self, stream: TcpStream) {
        let registered = self.world.lock().try_register_connection();
        let Some((player_id, outbound_rx)) = registered else {
            // Full or mid-match: no mid-match joins, close immediately
            info!("connection refused (server full or match running)");
            return;
        };

        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();

        info!(player_id, "connection accepted");
        tokio::spawn(writer_task(write_half, outbound_rx, player_id));
        tokio::spawn(reader_task(read_half, self.world.clone(), player_id));
    }
}

/// Decode newline-delimited JSON and dispatch under the world lock.
/// A malformed line is dropped; the connection stays open.
async fn reader_task(read_half: OwnedReadHalf, world: Arc<Mutex<World>>, player_id: u32) {
    let limiter = ConnectionRateLimiter::new();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !limiter.check_message() {
                    warn!(player_id, "rate limited inbound message");
                    continue;
                }
                match serde_json::from_str::<ClientMsg>(line) {
                    Ok(msg) => {
                        let now = now_secs();
                        world.lock().handle_message(player_id, msg, now);
                    }
                    Err(e) => {
                        warn!(player_id, error = %e, "dropping malformed message");
                    }
                }
            }
            Ok(None) => {
                debug!(player_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                debug!(player_id, error = %e, "connection error");
                break;
            }
        }
    }

    world.lock().disconnect(player_id);
}

/// Drain the outbound buffer to the socket, one line per message
async fn writer_task(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<String>,
    player_id: u32,
) {
    while let Some(line) = outbound_rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err()
            || write_half.write_all(b"\n").await.is_err()
        {
            debug!(player_id, "socket write failed");
            break;
        }
    }
}
