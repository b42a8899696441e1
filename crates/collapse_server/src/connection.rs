//! One WebSocket connection.
//!
//! Each accepted socket gets its own task. Text frames are parsed into
//! [`ClientMsg`]s and forwarded to the session; whatever the session queues
//! for this connection is written back as JSON text frames.

use std::net::SocketAddr;

use collapse_core::components::PlayerId;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ServerError;
use crate::protocol::{ClientMsg, ServerMsg};
use crate::session::{SessionEvent, OUTBOUND_QUEUE};

/// Serve one client until either side closes or the session drops its
/// queue.
///
/// The session always receives a matching `Disconnected` event once it
/// has seen `Connected`.
///
/// # Errors
///
/// Returns [`ServerError::WebSocket`] if the handshake fails or the socket
/// breaks mid-stream.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: PlayerId,
    events: mpsc::Sender<SessionEvent>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    tracing::info!(connection = %id, %peer, "Client connected");

    let (outbound, mut queue) = mpsc::channel::<ServerMsg>(OUTBOUND_QUEUE);
    if events
        .send(SessionEvent::Connected { id, outbound })
        .await
        .is_err()
    {
        // Session already gone; nothing to serve.
        return Ok(());
    }

    let (mut write, mut read) = ws_stream.split();
    let result = loop {
        tokio::select! {
            queued = queue.recv() => {
                let Some(msg) = queued else { break Ok(()) };
                if let Err(e) = write.send(Message::text(msg.to_json())).await {
                    break Err(e.into());
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientMsg::from_json(&text) {
                    Ok(msg) => {
                        tracing::trace!(connection = %id, request = msg.name(), "Request");
                        if events.send(SessionEvent::Message { id, msg }).await.is_err() {
                            break Ok(());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(connection = %id, error = %e, "Malformed client message");
                        let reply = ServerMsg::error(format!("Malformed message: {e}"));
                        if let Err(e) = write.send(Message::text(reply.to_json())).await {
                            break Err(e.into());
                        }
                    }
                },
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
        }
    };

    let _ = events.send(SessionEvent::Disconnected { id }).await;
    tracing::info!(connection = %id, %peer, "Client disconnected");
    result
}
