//! WebSocket fan-out endpoint. Grounded in spec.md §6's allowance of
//! "path `/socket.io` (or equivalent)" — this crate's own choice is a
//! plain `axum` `ws` upgrade with a minimal subscribe/unsubscribe
//! protocol, since the exact join/leave wire shape is left to this
//! crate rather than dictated by the original Socket.IO-based source.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::SubscriberId;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClientMessage {
    Subscribe { subscribe: i64 },
    Unsubscribe { unsubscribe: i64 },
}

struct Subscription {
    subscriber_id: SubscriberId,
    forwarder: JoinHandle<()>,
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(128);
    let mut subscriptions: HashMap<i64, Subscription> = HashMap::new();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &state, &out_tx, &mut subscriptions).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            outgoing = out_rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    for (camera_id, sub) in subscriptions {
        sub.forwarder.abort();
        state.bridge.unsubscribe(camera_id, sub.subscriber_id).await;
    }
}

async fn handle_client_message(
    text: &str,
    state: &AppState,
    out_tx: &mpsc::Sender<Message>,
    subscriptions: &mut HashMap<i64, Subscription>,
) {
    let Ok(cmd) = serde_json::from_str::<ClientMessage>(text) else {
        return;
    };

    match cmd {
        ClientMessage::Subscribe { subscribe: camera_id } => {
            if subscriptions.contains_key(&camera_id) {
                return;
            }
            let (subscriber_id, mut rx) = state.bridge.subscribe(camera_id).await;
            let out_tx = out_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let text = serde_json::to_string(event.as_ref()).unwrap_or_default();
                    if out_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });
            subscriptions.insert(camera_id, Subscription { subscriber_id, forwarder });
        }
        ClientMessage::Unsubscribe { unsubscribe: camera_id } => {
            if let Some(sub) = subscriptions.remove(&camera_id) {
                sub.forwarder.abort();
                state.bridge.unsubscribe(camera_id, sub.subscriber_id).await;
            }
        }
    }
}
