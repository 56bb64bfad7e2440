//! UI websocket endpoint.
//!
//! Every UI event on the bus is pushed to every client. Client text frames
//! are `{"id"?, "event", "data"}` commands; each is answered with
//! `{"id", "response"}`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use onair_core::eventbus::UiEventBus;
use onair_core::services::{SocketHandler, SocketResponse};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<SocketHandler>,
    pub bus: UiEventBus,
}

/// A command from a UI client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    #[serde(default)]
    pub id: Option<Value>,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct ReplyFrame {
    pub id: Option<Value>,
    pub response: SocketResponse,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Turns one text frame into its reply. Unparseable frames get an error
/// reply without an id.
pub async fn handle_text(handler: &SocketHandler, text: &str) -> ReplyFrame {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => {
            debug!("UI command {} (id {:?})", frame.event, frame.id);
            let response = handler.dispatch(&frame.event, frame.data).await;
            ReplyFrame {
                id: frame.id,
                response,
            }
        }
        Err(e) => ReplyFrame {
            id: None,
            response: SocketResponse::error(format!("invalid frame: {}", e)),
        },
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    info!("UI client {} connected", client_id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events = state.bus.subscribe(None).await;
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(64);
    let mut shutdown_rx = state.bus.shutdown_rx.clone();

    let send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                Some(event) = events.recv() => match event.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize {}: {}", event.event_name(), e);
                        continue;
                    }
                },
                Some(reply) = reply_rx.recv() => reply,
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    continue;
                }
                else => break,
            };
            trace!("-> UI {}: {}", client_id, text);
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                debug!("UI client {} went away while sending", client_id);
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("UI client {} socket error: {}", client_id, e);
                break;
            }
        };
        trace!("<- UI {}: {}", client_id, text.as_str());

        let reply = handle_text(&state.handler, text.as_str()).await;
        match serde_json::to_string(&reply) {
            Ok(json) => {
                if reply_tx.send(json).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Failed to serialize reply: {}", e),
        }
    }

    send_task.abort();
    info!("UI client {} disconnected", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_core::platforms::obs::ObsControl;
    use onair_core::repositories::sqlite::SqliteSceneRepository;
    use onair_core::services::VolumeMonitor;
    use onair_core::{Database, ShowConfig};
    use onair_obs::{ObsClient, ObsConnectionConfig};
    use serde_json::json;
    use std::time::Duration;

    async fn handler() -> SocketHandler {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let bus = UiEventBus::new();
        // Never connected: every control-server call fails fast.
        let obs: Arc<dyn ObsControl> = Arc::new(ObsClient::new(ObsConnectionConfig::default()));
        SocketHandler::new(
            obs,
            Arc::new(SqliteSceneRepository::new(db.pool().clone())),
            VolumeMonitor::new(bus.clone(), Duration::from_millis(500), 0.1),
            bus,
            Arc::new(ShowConfig::default()),
        )
    }

    #[tokio::test]
    async fn reply_carries_request_id() {
        let handler = handler().await;
        let reply = handle_text(
            &handler,
            r#"{"id": 7, "event": "send_to_overlay", "data": {"text": "hi"}}"#,
        )
        .await;
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            value,
            json!({ "id": 7, "response": { "success": true, "data": { "text": "hi" } } })
        );
    }

    #[tokio::test]
    async fn disconnected_obs_is_reported_not_fatal() {
        let handler = handler().await;
        let reply = handle_text(
            &handler,
            r#"{"id": "a", "event": "set_current_scene", "data": {"scene_name": "MEDIA"}}"#,
        )
        .await;
        assert_eq!(reply.id, Some(json!("a")));
        assert!(!reply.response.success);
        assert!(reply.response.error.unwrap().contains("Not connected"));
    }

    #[tokio::test]
    async fn garbage_frame_gets_error_without_id() {
        let handler = handler().await;
        let reply = handle_text(&handler, "not json").await;
        assert_eq!(reply.id, None);
        assert!(!reply.response.success);
    }
}
