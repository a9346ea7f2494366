//! Websocket notification feed
//!
//! Every connected client receives each completion notification as a JSON
//! text frame. A plain `ping` text frame is answered with `pong`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::notify::Notification;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| feed(socket, state))
}

async fn feed(socket: WebSocket, state: AppState) {
    state.metrics.websocket_connected();
    info!("🔌 Websocket client connected ({} listening)", state.notifier.subscriber_count() + 1);

    let mut notifications = state.notifier.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(message)) => {
                    state.metrics.websocket_message_received();
                    if let Some(reply) = reply_to(&message) {
                        if sender.send(reply).await.is_err() {
                            break;
                        }
                        state.metrics.websocket_message_sent();
                    }
                }
                Some(Err(e)) => {
                    debug!("Websocket receive error: {}", e);
                    break;
                }
            },
            notification = notifications.recv() => match notification {
                Ok(notification) => {
                    let frame = match notification_frame(&notification) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("⚠️  Failed to encode notification: {}", e);
                            continue;
                        }
                    };
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                    state.metrics.websocket_message_sent();
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("⚠️  Websocket client lagging, skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    state.metrics.websocket_disconnected();
    info!("🔌 Websocket client disconnected");
}

fn notification_frame(notification: &Notification) -> Result<Message, serde_json::Error> {
    serde_json::to_string(notification).map(Message::Text)
}

fn reply_to(message: &Message) -> Option<Message> {
    match message {
        Message::Text(text) if text.trim() == "ping" => Some(Message::Text("pong".to_string())),
        _ => None,
    }
}
