//! Metrics routes: pull endpoints and the WebSocket push channel.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::server::AppState;
use crate::engine::{TierEvent, TierScheduler};
use crate::stats::{HistoryOverview, MetricsOverview};
use crate::subscription::{RefreshMode, Subscription};

/// WebSocket heartbeat interval.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/current", get(current_metrics))
        .route("/history", get(metrics_history))
        .route("/ws", get(metrics_ws))
}

/// Last-known-good union of the three tiers. Zeroed defaults before the
/// engine has primed; never triggers a collection.
async fn current_metrics(State(state): State<AppState>) -> Json<MetricsOverview> {
    Json(state.scheduler.overview().await)
}

/// All ring histories in one document.
async fn metrics_history(State(state): State<AppState>) -> Json<HistoryOverview> {
    Json(state.scheduler.history().await)
}

/// Control messages sent by dashboard clients.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlMessage {
    /// Switch the refresh cadence: live|5s|10s|1m|10m.
    SetMode { mode: String },
    /// One-shot read of the cached overview.
    Snapshot,
}

async fn metrics_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.scheduler.clone()))
}

/// Handle an established WebSocket connection.
///
/// The connection starts in `live` mode; whichever delivery mechanism is
/// active at disconnect is torn down.
async fn handle_socket(socket: WebSocket, scheduler: Arc<TierScheduler>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let subscription = Subscription::new(scheduler.clone(), outbound_tx.clone());

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            // Deliver tier events to the client as JSON text frames.
            event = outbound_rx.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(error = %error, "failed to serialize tier event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break; // Client disconnected
                }
            }

            // Send heartbeat pings
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break; // Client disconnected
                }
            }

            // Handle incoming control messages from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_control(text.as_str(), &subscription, &scheduler, &outbound_tx)
                            .await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // Pong and binary frames
                    Some(Err(_)) => break,
                }
            }
        }
    }

    subscription.close().await;
    debug!("websocket connection closed");
}

async fn handle_control(
    text: &str,
    subscription: &Subscription,
    scheduler: &Arc<TierScheduler>,
    outbound: &mpsc::UnboundedSender<TierEvent>,
) {
    let message: ControlMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(error) => {
            debug!(error = %error, "ignoring malformed control message");
            return;
        }
    };

    match message {
        ControlMessage::SetMode { mode } => match mode.parse::<RefreshMode>() {
            Ok(mode) => subscription.set_mode(mode).await,
            Err(error) => {
                warn!(error = %error, "ignoring unknown refresh mode");
            }
        },
        ControlMessage::Snapshot => {
            let overview = scheduler.overview().await;
            let _ = outbound.send(TierEvent::MetricsUpdate(overview));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_deserialize() {
        let message: ControlMessage =
            serde_json::from_str(r#"{"type":"set_mode","mode":"10s"}"#).unwrap();
        assert!(matches!(message, ControlMessage::SetMode { mode } if mode == "10s"));

        let message: ControlMessage = serde_json::from_str(r#"{"type":"snapshot"}"#).unwrap();
        assert!(matches!(message, ControlMessage::Snapshot));
    }

    #[test]
    fn test_malformed_control_message_is_err() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"dance"}"#).is_err());
    }
}
