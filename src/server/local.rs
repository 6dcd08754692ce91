//! In-process transport that talks to a [`DocumentRoom`] directly.
//!
//! Useful for embedding the sequencer in the same process as its clients, and for driving
//! multi-client scenarios without a network.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use crate::error::{RoomError, TransportError};
use crate::server::room::{DocumentRoom, RoomEvent, Rooms, SessionId};
use crate::sync::protocol::{
    ChangeAck, CursorUpdate, HistoryResponse, JoinRequest, JoinResponse, PushChange,
    ServerEvent, UndoResponse,
};
use crate::sync::transport::Transport;
use crate::sync::types::Author;

/// A [`Transport`] bound to one session of a room.
///
/// Events published by other sessions are buffered until [`drain_events`](Self::drain_events)
/// hands them out.
pub struct LocalTransport {
    room: Arc<DocumentRoom>,
    session: SessionId,
    events: broadcast::Receiver<RoomEvent>,
}

impl LocalTransport {
    /// Opens a session on `document_id`, creating the room if needed.
    pub fn connect(rooms: &Rooms, document_id: &str) -> Self {
        let room = rooms.get_or_create(document_id);
        let events = room.subscribe();
        Self {
            room,
            session: rooms.next_session_id(),
            events,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn room(&self) -> &Arc<DocumentRoom> {
        &self.room
    }

    /// Events from other sessions received since the last call, in publish order.
    pub fn drain_events(&mut self) -> Vec<ServerEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) if event.origin != self.session => drained.push(event.event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(session = self.session, skipped, "event buffer overflowed");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        drained
    }
}

fn rejected(error: RoomError) -> TransportError {
    TransportError::Rejected(error.to_string())
}

impl Transport for LocalTransport {
    async fn join(&mut self, request: JoinRequest) -> Result<JoinResponse, TransportError> {
        if request.document_id != self.room.id() {
            return Err(rejected(RoomError::WrongDocument {
                expected: self.room.id().to_string(),
                requested: request.document_id,
            }));
        }
        Ok(self.room.join(
            self.session,
            Author::new(request.user_id, request.user_name),
        ))
    }

    async fn push_change(&mut self, change: PushChange) -> Result<ChangeAck, TransportError> {
        self.room.submit(self.session, change).map_err(rejected)
    }

    fn push_cursor(&mut self, update: CursorUpdate) -> Result<(), TransportError> {
        self.room.cursor(self.session, update).map_err(rejected)
    }

    async fn request_history(&mut self) -> Result<HistoryResponse, TransportError> {
        Ok(self.room.history())
    }

    async fn request_undo(&mut self) -> Result<UndoResponse, TransportError> {
        self.room.undo(self.session).map_err(rejected)
    }

    async fn leave(&mut self) -> Result<(), TransportError> {
        self.room.leave(self.session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Delta;
    use crate::sync::types::Revision;

    fn join_request(document_id: &str, user: &str) -> JoinRequest {
        JoinRequest {
            document_id: document_id.to_string(),
            user_id: user.to_string(),
            user_name: user.to_uppercase(),
        }
    }

    #[tokio::test]
    async fn test_join_checks_document() {
        let rooms = Rooms::new(8);
        let mut transport = LocalTransport::connect(&rooms, "notes");
        let err = transport
            .join(join_request("other", "ana"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_own_events_are_not_delivered() {
        let rooms = Rooms::new(8);
        let mut ana = LocalTransport::connect(&rooms, "notes");
        let mut bo = LocalTransport::connect(&rooms, "notes");
        ana.join(join_request("notes", "ana")).await.unwrap();
        bo.join(join_request("notes", "bo")).await.unwrap();

        ana.push_change(PushChange {
            delta: Delta::new().insert("x"),
            revision: Revision(0),
        })
        .await
        .unwrap();

        let seen_by_ana = ana.drain_events();
        assert!(
            seen_by_ana
                .iter()
                .all(|event| !matches!(event, ServerEvent::RemoteUpdate(_)))
        );
        let seen_by_bo = bo.drain_events();
        assert!(matches!(seen_by_bo.last(), Some(ServerEvent::RemoteUpdate(_))));
    }
}
