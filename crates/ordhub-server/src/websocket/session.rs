//! WebSocket session lifecycle: one task per connected client, from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use ordhub_core::events::{ClientMessage, EventFrame};
use ordhub_core::ids::ConnectionId;
use ordhub_core::topic::Topic;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::hub::BroadcastHub;

/// Outbound queue depth per connection. Deep enough to absorb a burst of
/// broadcasts; a client that stays this far behind starts dropping frames.
const SEND_QUEUE_CAPACITY: usize = 1024;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers with the hub, which enqueues the `connection_ack` frame
/// 2. Forwards hub frames to the socket and sends periodic Ping frames
/// 3. Answers client-level `ping` messages with `pong` frames
/// 4. Disconnects clients that stop answering pings
/// 5. Unregisters on disconnect or server shutdown
#[instrument(skip_all, fields(connection_id = %connection_id, %topic))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    topic: Topic,
    hub: Arc<BroadcastHub>,
    ping_interval: Duration,
    pong_timeout: Duration,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_CAPACITY);
    let connection = Arc::new(ClientConnection::new(connection_id, topic, send_tx));

    info!("client connected");
    let Some(id) = hub.register(connection.clone()).await else {
        // Lost an admission race: another handshake took the last slot
        // between the HTTP capacity check and registration.
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    };

    // Outbound forwarder with liveness pings. Owns the sink half.
    let outbound_conn = connection.clone();
    let outbound_shutdown = shutdown.clone();
    let outbound = tokio::spawn(async move {
        let mut interval = tokio::time::interval(ping_interval);
        // Skip the immediate first tick.
        let _ = interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(json) => {
                            if ws_tx.send(Message::Text(json.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!(
                            elapsed = ?outbound_conn.last_pong_elapsed(),
                            "client unresponsive, disconnecting"
                        );
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Inbound loop. Any client traffic counts as liveness.
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = shutdown.cancelled() => {
                debug!("server shutting down, closing session");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };
        let Some(text) = text else { continue };

        connection.mark_alive();
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping) => {
                let _ = connection.send_frame(&EventFrame::pong());
            }
            Ok(ClientMessage::Unknown) => {
                debug!("ignoring unrecognized client message");
            }
            Err(e) => {
                debug!(error = %e, "ignoring malformed client frame");
            }
        }
    }

    info!(
        age = ?connection.age(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    outbound.abort();
    let _ = hub.unregister(&id).await;
}
