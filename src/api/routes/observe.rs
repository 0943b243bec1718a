//! Observer websocket.
//!
//! The first frame is always a snapshot; live events follow with no gap. An
//! observer that falls behind gets an error frame and a fresh snapshot.
//! Inbound frames request a snapshot, keep the initiator's session alive, or
//! carry control commands with the session's control token.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::events::MeetingEvent;
use crate::meeting::{ControlAck, ControlCommand, MeetingError, SessionHandle, SessionSnapshot};

use super::AppState;

/// Inbound observer message.
#[derive(Debug, Deserialize)]
pub struct ObserverRequest {
    pub action: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Outbound observer frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverFrame {
    Snapshot {
        snapshot: SessionSnapshot,
    },
    Event {
        event: MeetingEvent,
    },
    Ack {
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<ControlAck>,
    },
    Error {
        message: String,
    },
}

type WsSender = SplitSink<WebSocket, Message>;

/// GET /meetings/:id/ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let handle = registry.get(id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, handle)))
}

async fn handle_socket(ws: WebSocket, handle: SessionHandle) {
    let session_id = handle.id();
    let (mut sender, mut receiver) = ws.split();

    let (snapshot, mut rx) = handle.subscribe().await;
    let mut ended = snapshot.status.is_terminal();
    info!(
        "Observer connected to meeting {} at event #{}",
        session_id, snapshot.last_sequence
    );
    if send_frame(&mut sender, &ObserverFrame::Snapshot { snapshot }).await.is_err() {
        return;
    }

    while !ended {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let frames = process_message(&text, &handle, &mut rx).await;
                    for frame in frames {
                        if send_frame(&mut sender, &frame).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Observer closed connection to meeting {}", session_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Observer websocket error for meeting {}: {}", session_id, e);
                    break;
                }
            },
            event = rx.recv() => match event {
                Ok(event) => {
                    ended = event.kind.is_terminal();
                    if send_frame(&mut sender, &ObserverFrame::Event { event }).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Observer of meeting {} lagged by {} event(s)", session_id, missed);
                    let notice = ObserverFrame::Error {
                        message: MeetingError::ObserverChannel(format!(
                            "missed {missed} event(s), resynchronising"
                        ))
                        .to_string(),
                    };
                    let (snapshot, fresh) = handle.subscribe().await;
                    rx = fresh;
                    ended = snapshot.status.is_terminal();
                    for frame in [notice, ObserverFrame::Snapshot { snapshot }] {
                        if send_frame(&mut sender, &frame).await.is_err() {
                            return;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = sender.close().await;
    debug!("Observer of meeting {} disconnected", session_id);
}

/// Handle one inbound frame; returns the frames to send back.
async fn process_message(
    text: &str,
    handle: &SessionHandle,
    rx: &mut broadcast::Receiver<MeetingEvent>,
) -> Vec<ObserverFrame> {
    let request: ObserverRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            return vec![ObserverFrame::Error {
                message: format!("Invalid message format: {e}"),
            }]
        }
    };

    let token = request.token.as_deref().unwrap_or_default();
    let result: Result<Option<ControlAck>, MeetingError> = match request.action.as_str() {
        "snapshot" => {
            let (snapshot, fresh) = handle.subscribe().await;
            *rx = fresh;
            return vec![ObserverFrame::Snapshot { snapshot }];
        }
        "heartbeat" => handle.heartbeat(token).await.map(|_| None),
        "pause" => handle.control(token, ControlCommand::Pause).await.map(Some),
        "resume" => handle.control(token, ControlCommand::Resume).await.map(Some),
        "stop" => handle.control(token, ControlCommand::Stop).await.map(Some),
        "skip" => handle.control(token, ControlCommand::Skip).await.map(Some),
        "conclude" => handle.control(token, ControlCommand::Conclude).await.map(Some),
        other => {
            return vec![ObserverFrame::Error {
                message: format!("Unknown action: {other}"),
            }]
        }
    };

    match result {
        Ok(ack) => vec![ObserverFrame::Ack {
            action: request.action,
            result: ack,
        }],
        Err(e) => vec![ObserverFrame::Error {
            message: e.to_string(),
        }],
    }
}

async fn send_frame(sender: &mut WsSender, frame: &ObserverFrame) -> Result<(), ()> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize observer frame: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await.map_err(|e| {
        debug!("Failed to send observer frame: {}", e);
    })
}
