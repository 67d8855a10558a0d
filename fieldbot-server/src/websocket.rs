// WebSocket transport for streaming sessions

use crate::metrics;
use crate::session::{SessionError, StreamSession, TelemetryPayload, TelemetrySink};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use fieldbot_core::Command;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Commands buffered between the reader task and the session
const COMMAND_QUEUE: usize = 32;

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Sends telemetry payloads as JSON text frames
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl TelemetrySink for WsSink {
    async fn send(&mut self, payload: &TelemetryPayload) -> Result<(), SessionError> {
        let json = serde_json::to_string(payload)?;
        self.sender
            .send(Message::Text(json))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.sender
            .close()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("WebSocket connection established: {}", connection_id);
    metrics::record_session_opened();

    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Command>(COMMAND_QUEUE);

    // Parse inbound frames into commands; dropping `tx` tells the session
    // the client is gone
    let reader_id = connection_id.clone();
    let reader = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match Command::parse(&text) {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        metrics::record_malformed_command();
                        warn!("Command error from {}: {}", reader_id, e);
                    }
                },
                Ok(Message::Binary(_)) => {
                    warn!("Received binary message from {}, ignoring", reader_id);
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket connection {} closed by client", reader_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(e) => {
                    debug!("WebSocket error from {}: {}", reader_id, e);
                    break;
                }
            }
        }
    });

    let session = StreamSession::new(connection_id.clone(), state, rx, WsSink { sender });
    if let Err(e) = session.run().await {
        debug!("Session {} stopped with error: {}", connection_id, e);
    }

    reader.abort();
    metrics::record_session_closed();
    info!("WebSocket client disconnected: {}", connection_id);
}
