//! WebSocket stream endpoint
//!
//! Each connection runs two tasks: the reader (this function's own loop)
//! and a send pump that owns the socket's write half, draining the
//! outbound queue and emitting keep-alive frames. Leaving the reader
//! loop for any reason tears down the pump and unregisters the client,
//! which is exactly the OPEN -> {CLOSING, ERRORED} -> CLOSED edge of the
//! socket state machine.

use crate::frames::{ClientMessage, SystemFrame};
use crate::state::AppState;
use crate::{CHATTER_AGENT, HUMAN_AGENT};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use relay_core::{
    to_payload, ClientId, EntityIdType, Envelope, HumanInput, MessageKind, HUMAN_INPUT,
};
use relay_store::{spawn_activity, ActivityRecord};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// WebSocket upgrade handler for `GET /stream`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one client connection to completion.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = ClientId::random();
    info!(%client_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Welcome goes onto the queue before the socket joins the broadcast
    // set, so it is always the first frame the client sees.
    if send_frame(&tx, &SystemFrame::Welcome { client_id }).is_err() {
        return;
    }
    state.hub.insert(client_id, tx.clone());

    // Send pump: owns the write half, drains the outbound queue and
    // emits a heartbeat frame on every interval tick.
    let heartbeat_interval = state.config.heartbeat_interval;
    let pump_client_id = client_id;
    let mut send_task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(start, heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(frame) => {
                        if sender.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = heartbeat.tick() => {
                    let frame = match serde_json::to_string(&SystemFrame::Heartbeat) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        debug!(client_id = %pump_client_id, "heartbeat send failed");
                        break;
                    }
                }
            }
        }
    });

    // Reader loop.
    loop {
        tokio::select! {
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    handle_client_text(&state, client_id, &text, &tx).await;
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(%client_id, "client sent close frame");
                    break;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Pong is handled by axum; nothing to do.
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(%client_id, len = data.len(), "ignoring binary frame");
                }
                Some(Err(e)) => {
                    warn!(%client_id, error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            },
            // The pump died (peer gone); leave OPEN as well.
            _ = &mut send_task => break,
        }
    }

    // Out of OPEN: stop the keep-alive and leave the broadcast set.
    state.hub.remove(client_id);
    send_task.abort();
    info!(%client_id, "WebSocket disconnected");
}

/// Handle one inbound text frame: validate, stamp, publish, log, ack.
async fn handle_client_text(
    state: &AppState,
    client_id: ClientId,
    text: &str,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(reason) => {
            debug!(%client_id, %reason, "rejecting malformed client frame");
            let _ = send_frame(tx, &SystemFrame::Error { message: reason });
            return;
        }
    };

    let input = HumanInput {
        user_id: message
            .user_id
            .unwrap_or_else(|| client_id.to_string()),
        content: message.content,
        timestamp: Utc::now(),
        source: "websocket".to_string(),
    };

    let envelope = Envelope::question(HUMAN_AGENT, CHATTER_AGENT, to_payload(&input));
    if let Err(e) = state.bus.publish(HUMAN_INPUT, &envelope).await {
        warn!(%client_id, error = %e, "failed to publish human input");
        let _ = send_frame(
            tx,
            &SystemFrame::Error {
                message: "message could not be delivered".to_string(),
            },
        );
        return;
    }

    // Fire-and-forget: a store outage never blocks the ack.
    spawn_activity(
        &state.store,
        ActivityRecord::new(
            HUMAN_AGENT,
            CHATTER_AGENT,
            MessageKind::Question,
            envelope.payload.clone(),
        ),
    );

    let _ = send_frame(tx, &SystemFrame::Ack);
}

/// Serialize and enqueue a system frame.
fn send_frame(
    tx: &mpsc::UnboundedSender<Message>,
    frame: &SystemFrame,
) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).map_err(|_| ())
}
