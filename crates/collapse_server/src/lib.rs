//! # Collapse Server
//!
//! WebSocket host for a collapse match.
//!
//! The server owns exactly one [`Simulation`]. A single session task ticks
//! it, broadcasts per-player views and applies client requests in between;
//! one task per socket translates JSON frames to and from that session.
//!
//! ## Crate Structure
//!
//! - [`protocol`] - JSON messages on the wire
//! - [`session`] - The task that owns the match
//! - [`connection`] - Per-socket forwarding

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use collapse_core::components::PlayerId;
use collapse_core::config::GameConfig;
use collapse_core::simulation::Simulation;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

pub use error::ServerError;
use session::GameSession;

/// Requests buffered between connections and the session.
const EVENT_QUEUE: usize = 256;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: IpAddr,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Build a match from `game` and serve it until `shutdown` turns true.
///
/// # Errors
///
/// Fails if the game configuration is invalid, the address cannot be
/// bound or the session task dies.
pub async fn run_server(
    config: ServerConfig,
    game: GameConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<Simulation, ServerError> {
    let sim = Simulation::new(game)?;
    let listener = TcpListener::bind(config.addr()).await?;
    serve(listener, sim, shutdown).await
}

/// Serve `sim` on an already bound listener.
///
/// Returns the final match state once shutdown completes.
///
/// # Errors
///
/// Returns [`ServerError::Session`] if the session task panics.
pub async fn serve(
    listener: TcpListener,
    sim: Simulation,
    mut shutdown: watch::Receiver<bool>,
) -> Result<Simulation, ServerError> {
    tracing::info!(addr = %listener.local_addr()?, seed = sim.config().seed, "Server listening");

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
    let session = tokio::spawn(GameSession::new(sim).run(events_rx, shutdown.clone()));

    let mut next_id = 1_u64;
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = PlayerId(next_id);
                    next_id += 1;
                    let events = events_tx.clone();
                    tokio::spawn(async move {
                        if let Err(error) = connection::serve_connection(stream, peer, id, events).await {
                            tracing::debug!(connection = %id, %peer, %error, "Connection ended with error");
                        }
                    });
                }
                Err(error) => tracing::warn!(%error, "Accept failed"),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    drop(events_tx);
    Ok(session.await?)
}
