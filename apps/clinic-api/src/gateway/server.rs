//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;

use clinic_common::protocol::{
    ChangeOp, ClientRequest, ServerEvent, StatsSnapshot, CLOSE_UNAUTHORIZED,
};

use crate::auth::tokens;
use crate::error::ApiError;
use crate::models::appointment;
use crate::stats;
use crate::AppState;

use super::changes;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, params.token))
}

/// Per-connection state machine: CONNECTING (credential check) → OPEN
/// (registered + subscribed) → CLOSED (teardown). Sends are
/// fire-and-forget; there is no buffering or backpressure state.
async fn handle_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Gate acceptance on the bearer credential. Clients distinguish this
    // close code from a transient drop and re-authenticate instead of
    // retrying.
    let claims = match token
        .as_deref()
        .map(|t| tokens::verify(&state.config, t))
    {
        Some(Ok(claims)) => claims,
        Some(Err(_)) | None => {
            let _ = send_close(&mut ws_tx, CLOSE_UNAUTHORIZED, "Unauthorized").await;
            return;
        }
    };

    let (conn_id, mut outbound) = state.hub.register();
    let mut changes_rx = state.changes.subscribe();

    tracing::info!(
        conn_id = %conn_id,
        email = %claims.email,
        "realtime session established"
    );

    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientRequest>(&text) {
                            Ok(ClientRequest::FetchInitialData) => {
                                match initial_data(&state).await {
                                    Ok(event) => {
                                        if send_event(&mut ws_tx, &event).await.is_err() {
                                            break;
                                        }
                                    }
                                    // Transient store failure: no reply for this
                                    // trigger, connection stays usable.
                                    Err(err) => tracing::warn!(
                                        conn_id = %conn_id,
                                        ?err,
                                        "failed to gather initial data"
                                    ),
                                }
                            }
                            // Malformed payloads are logged and ignored; the
                            // connection stays open.
                            Err(err) => tracing::debug!(
                                conn_id = %conn_id,
                                ?err,
                                "ignoring malformed client message"
                            ),
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(?err, conn_id = %conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Event published through the broadcast hub (write path).
            frame = outbound.recv() => {
                match frame {
                    Some(json) => {
                        if ws_tx.send(Message::Text(json.as_ref().into())).await.is_err() {
                            break;
                        }
                    }
                    // Sender gone — we were unregistered.
                    None => break,
                }
            }

            // Store change notification on this connection's subscription.
            change = changes_rx.recv() => {
                match change {
                    Ok(change) if change.table == changes::APPOINTMENTS_TABLE => {
                        match realtime_update(&state, change.op).await {
                            Ok(event) => {
                                if send_event(&mut ws_tx, &event).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => tracing::warn!(
                                conn_id = %conn_id,
                                ?err,
                                "failed to build realtime update"
                            ),
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            conn_id = %conn_id,
                            skipped = n,
                            "connection lagged behind change feed"
                        );
                        // Continue — the next notification carries a full snapshot.
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Teardown: leave the registry (idempotent) and drop the change-feed
    // receiver with this task, releasing the subscription exactly once.
    state.hub.unregister(&conn_id);
    tracing::info!(conn_id = %conn_id, "realtime session ended");
}

/// Gather the full appointment list plus a fresh stats snapshot.
async fn snapshot(state: &AppState) -> Result<(Vec<Value>, StatsSnapshot), ApiError> {
    let list = appointment::list_newest_first(&state.db).await?;
    let appointments = list
        .into_iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            tracing::error!(?err, "failed to serialize appointments");
            ApiError::internal("serialization")
        })?;
    let stats = stats::gather(&state.db, Utc::now()).await?;
    Ok((appointments, stats))
}

async fn initial_data(state: &AppState) -> Result<ServerEvent, ApiError> {
    let (appointments, stats) = snapshot(state).await?;
    Ok(ServerEvent::InitialData {
        appointments,
        stats,
        timestamp: Utc::now(),
    })
}

async fn realtime_update(state: &AppState, op: ChangeOp) -> Result<ServerEvent, ApiError> {
    let (appointments, stats) = snapshot(state).await?;
    Ok(ServerEvent::RealtimeUpdate {
        appointments,
        stats,
        event: op,
        timestamp: Utc::now(),
    })
}

async fn send_event(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
