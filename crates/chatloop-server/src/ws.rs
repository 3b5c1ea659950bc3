//! WebSocket sessions.
//!
//! Each authenticated socket binds one handle in the hub. Server events are
//! written as JSON text frames until the client sends a binary frame, after
//! which they are written as length-prefixed MessagePack.

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::metrics::{self, ConnectionMetricsGuard};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use bytes::BytesMut;
use chatloop_core::ChatError;
use chatloop_protocol::{codec, ClientEvent, Encoding, ProtocolError, ServerEvent, UserId};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// WebSocket upgrade handler. Unauthenticated requests are refused before
/// the upgrade.
pub async fn ws_handler(
    AuthUser(identity): AuthUser,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if state.hub.stats().handles >= state.config.limits.max_connections {
        return Err(ApiError::Overloaded);
    }

    Ok(ws
        .max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state, identity)))
}

/// Handle an authenticated WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, identity: UserId) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let mut session = state.hub.connect(&identity);
    metrics::set_online_identities(state.hub.stats().online_identities);
    let handle_id = session.handle_id.clone();

    debug!(identity = %identity, handle = %handle_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut encoding = Encoding::Json;
    let mut read_buffer = BytesMut::with_capacity(1024);

    loop {
        tokio::select! {
            biased;

            event = session.events.recv() => {
                let Some(event) = event else { break };
                match send_event(&mut sender, &event, encoding).await {
                    Ok(()) => {}
                    Err(SendError::Encode(e)) => {
                        warn!(handle = %handle_id, event = event.name(), error = %e, "Dropping unencodable event");
                        metrics::record_error("encode");
                    }
                    Err(SendError::Socket(e)) => {
                        debug!(handle = %handle_id, error = %e, "WebSocket write failed");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_frame(text.len(), "inbound");
                        encoding = Encoding::Json;
                        match codec::decode_json::<ClientEvent>(&text) {
                            Ok(event) => handle_client_event(&state, &identity, event),
                            Err(e) => {
                                warn!(handle = %handle_id, error = %e, "Undecodable text frame");
                                metrics::record_error("decode");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        metrics::record_frame(data.len(), "inbound");
                        encoding = Encoding::MessagePack;
                        read_buffer.extend_from_slice(&data);

                        loop {
                            match codec::decode_from::<ClientEvent>(&mut read_buffer) {
                                Ok(Some(event)) => handle_client_event(&state, &identity, event),
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(handle = %handle_id, error = %e, "Undecodable binary frame");
                                    metrics::record_error("decode");
                                    read_buffer.clear();
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        debug!(handle = %handle_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(handle = %handle_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(handle = %handle_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    let outcome = state.hub.disconnect(&handle_id);
    metrics::set_online_identities(state.hub.stats().online_identities);

    debug!(identity = %identity, handle = %handle_id, ?outcome, "WebSocket disconnected");
}

/// Apply one client event on behalf of the socket's authenticated identity.
fn handle_client_event(state: &AppState, identity: &UserId, event: ClientEvent) {
    match event {
        ClientEvent::Typing(signal) => {
            if let Some(claimed) = signal.sender_id.as_ref().filter(|s| *s != identity) {
                debug!(identity = %identity, claimed = %claimed, "Ignoring claimed typing sender");
            }

            match state.hub.typing(identity, &signal.receiver_id) {
                Ok(report) => {
                    metrics::record_typing();
                    metrics::record_push(report);
                }
                Err(ChatError::TransportUnavailable(receiver)) => {
                    trace!(sender = %identity, receiver = %receiver, "Typing receiver offline");
                }
                Err(e) => warn!(sender = %identity, error = %e, "Typing relay failed"),
            }
        }
    }
}

/// Why an outbound event was not written.
#[derive(Debug, Error)]
enum SendError {
    /// The event cannot be framed. Only this event is lost.
    #[error(transparent)]
    Encode(#[from] ProtocolError),

    /// The socket is gone.
    #[error(transparent)]
    Socket(#[from] axum::Error),
}

/// Write one server event in the session's encoding.
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
    encoding: Encoding,
) -> Result<(), SendError> {
    let message = match encoding {
        Encoding::Json => Message::Text(codec::encode_json(event)?),
        Encoding::MessagePack => Message::Binary(codec::encode_binary(event)?.to_vec()),
    };

    let len = match &message {
        Message::Text(text) => text.len(),
        Message::Binary(data) => data.len(),
        _ => 0,
    };
    metrics::record_frame(len, "outbound");

    sender.send(message).await?;
    Ok(())
}
