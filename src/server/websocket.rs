//! WebSocket sessions for collaborative editing.
//!
//! Each connection is bound to one document room. The session answers client requests with
//! reply frames and forwards the room's events from other sessions as event frames.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::error::RoomError;
use crate::server::room::{DocumentRoom, RoomEvent, SessionId};
use crate::sync::protocol::{ClientFrame, ClientRequest, ReplyBody, ServerEvent, ServerFrame};
use crate::sync::types::Author;

/// Failures that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket error: {0}")]
    Socket(#[from] axum::Error),
}

/// One client connection to a document room.
pub struct DocumentSession {
    socket: WebSocket,
    room: Arc<DocumentRoom>,
    events: broadcast::Receiver<RoomEvent>,
    session_id: SessionId,
    joined: bool,
}

impl DocumentSession {
    /// Binds a socket to `room`. Room events are buffered from this point on.
    pub fn new(socket: WebSocket, room: Arc<DocumentRoom>, session_id: SessionId) -> Self {
        let events = room.subscribe();
        Self {
            socket,
            room,
            events,
            session_id,
            joined: false,
        }
    }

    /// Handle the WebSocket connection lifecycle
    pub async fn handle(mut self) {
        info!(
            document = %self.room.id(),
            session = self.session_id,
            "websocket session established"
        );

        loop {
            tokio::select! {
                message = self.socket.recv() => {
                    let Some(message) = message else { break };
                    match message {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_text_message(&text).await {
                                error!(session = self.session_id, error = %e, "failed to answer request");
                                break;
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!(session = self.session_id, "websocket session closed by client");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = self.socket.send(Message::Pong(data)).await {
                                error!(session = self.session_id, error = %e, "failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Binary and pong frames carry nothing for us
                        }
                        Err(e) => {
                            warn!(session = self.session_id, error = %e, "websocket error");
                            break;
                        }
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Err(e) = self.forward_event(event).await {
                                error!(session = self.session_id, error = %e, "failed to forward event");
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            // Missed commits are not replayed; the client has to rejoin.
                            warn!(session = self.session_id, skipped, "session fell behind, closing");
                            break;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        if self.joined {
            self.room.leave(self.session_id);
        }
        info!(session = self.session_id, "websocket session ended");
    }

    async fn handle_text_message(&mut self, text: &str) -> Result<(), SessionError> {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                // Don't break the connection for parse errors
                warn!(session = self.session_id, error = %e, "failed to parse frame");
                return Ok(());
            }
        };
        debug!(session = self.session_id, reference = frame.reference, "request");

        let reference = frame.reference;
        let result = match frame.request {
            ClientRequest::Join(request) => {
                if request.document_id != self.room.id() {
                    Err(RoomError::WrongDocument {
                        expected: self.room.id().to_string(),
                        requested: request.document_id,
                    })
                } else {
                    let author = Author::new(request.user_id, request.user_name);
                    let response = self.room.join(self.session_id, author);
                    self.joined = true;
                    Ok(ReplyBody::Joined(response))
                }
            }
            ClientRequest::Update(change) => self
                .room
                .submit(self.session_id, change)
                .map(ReplyBody::Ack),
            ClientRequest::CursorUpdate(update) => {
                if let Err(e) = self.room.cursor(self.session_id, update) {
                    warn!(session = self.session_id, error = %e, "cursor update refused");
                }
                return Ok(());
            }
            ClientRequest::GetHistory => Ok(ReplyBody::History(self.room.history())),
            ClientRequest::Undo => self.room.undo(self.session_id).map(ReplyBody::Undone),
            ClientRequest::Leave => {
                self.room.leave(self.session_id);
                self.joined = false;
                Ok(ReplyBody::Left)
            }
        };

        let just_joined = matches!(result, Ok(ReplyBody::Joined(_)));
        if let Err(e) = &result {
            warn!(session = self.session_id, reference, error = %e, "request rejected");
        }
        self.send_frame(&ServerFrame::Reply {
            reference,
            result: result.map_err(|e| e.to_string()),
        })
        .await?;

        if just_joined {
            let state = self.room.presence_state();
            self.send_frame(&ServerFrame::Event {
                event: ServerEvent::PresenceState(state),
            })
            .await?;
        }
        Ok(())
    }

    async fn forward_event(&mut self, event: RoomEvent) -> Result<(), SessionError> {
        if event.origin == self.session_id || !self.joined {
            return Ok(());
        }
        self.send_frame(&ServerFrame::Event { event: event.event })
            .await
    }

    async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), SessionError> {
        let json = serde_json::to_string(frame)?;
        self.socket.send(Message::Text(json)).await?;
        Ok(())
    }
}
