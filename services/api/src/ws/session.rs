//! Manages the WebSocket connection lifecycle for a coaching session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Each connection gets its own identity and its own task, so one trainee's
/// slow external calls never stall another's. Inbound events are handled
/// strictly in arrival order; outbound events flow through a channel drained
/// by a dedicated writer task.
#[instrument(name = "ws_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", connection_id.to_string());
    info!("New WebSocket connection");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(32);

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let serialized = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "failed to serialize outbound event");
                    continue;
                }
            };
            if socket_tx.send(Message::Text(serialized.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = socket_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed client message");
                        continue;
                    }
                };
                // No failure inside the orchestrator may take the
                // connection down; report and keep serving.
                if let Err(e) = dispatch(&state, connection_id, &outbound_tx, msg).await {
                    error!(error = ?e, "event handling failed");
                    let _ = outbound_tx
                        .send(ServerMessage::Error {
                            message: "Failed to process event".to_string(),
                        })
                        .await;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close frame");
                break;
            }
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.orchestrator.disconnect(connection_id).await;

    // Let the writer drain anything still queued, then wind down.
    drop(outbound_tx);
    let _ = writer.await;
    info!("WebSocket connection closed");
}

async fn dispatch(
    state: &Arc<AppState>,
    connection_id: Uuid,
    outbound: &mpsc::Sender<ServerMessage>,
    msg: ClientMessage,
) -> Result<()> {
    match msg {
        ClientMessage::StartSession(payload) => {
            state
                .orchestrator
                .start_session(connection_id, outbound, payload)
                .await
        }
        ClientMessage::AgentResponse { transcript } => {
            state
                .orchestrator
                .agent_response(connection_id, outbound, &transcript)
                .await
        }
        ClientMessage::EndSession => state.orchestrator.end_session(connection_id, outbound).await,
    }
}
