//! Per-document server state: the sequencer, who is present, and event fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::cursor::CursorPosition;
use crate::delta::Delta;
use crate::error::RoomError;
use crate::sequencer::{Committed, Sequencer};
use crate::sync::protocol::{
    ChangeAck, CollaboratorInfo, CollaboratorJoined, CollaboratorLeft, CursorUpdate,
    HistoryResponse, JoinResponse, PresenceDiff, PresenceMeta, PresenceState, PushChange,
    RemoteCursor, RemoteUpdate, ServerEvent, UndoResponse,
};
use crate::sync::types::{Author, Revision};

/// Identifies one connection to a room.
pub type SessionId = u64;

/// A server event together with the session that caused it.
///
/// Subscribers skip events whose `origin` is their own session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEvent {
    pub origin: SessionId,
    pub event: ServerEvent,
}

#[derive(Debug, Clone)]
struct Member {
    author: Author,
    joined_at: DateTime<Utc>,
    cursor: Option<CursorPosition>,
}

impl Member {
    fn presence(&self) -> PresenceMeta {
        PresenceMeta {
            name: self.author.user_name.clone(),
            joined_at: self.joined_at,
        }
    }
}

/// The shared state of one document.
pub struct DocumentRoom {
    id: String,
    sequencer: Sequencer,
    /// Held from commit through publish, so updates go out in revision order.
    publishing: Mutex<()>,
    members: RwLock<HashMap<SessionId, Member>>,
    events: broadcast::Sender<RoomEvent>,
}

impl DocumentRoom {
    /// Creates an empty room whose event channel holds `event_buffer` undelivered events.
    pub fn new(id: impl Into<String>, event_buffer: usize) -> Self {
        Self::with_sequencer(id, Sequencer::new(), event_buffer)
    }

    pub fn with_sequencer(id: impl Into<String>, sequencer: Sequencer, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            id: id.into(),
            sequencer,
            publishing: Mutex::new(()),
            members: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Current content and revision.
    pub fn snapshot(&self) -> (Delta, Revision) {
        self.sequencer.snapshot()
    }

    /// Number of joined sessions.
    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    /// Receives every event published after this call.
    ///
    /// Subscribe before joining so nothing committed after the join revision is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Adds a session to the room and announces it to the others.
    ///
    /// # Returns
    ///
    /// The current revision and the other members, with their last known cursors.
    pub fn join(&self, session: SessionId, author: Author) -> JoinResponse {
        let member = Member {
            author: author.clone(),
            joined_at: Utc::now(),
            cursor: None,
        };
        let presence = member.presence();

        let (collaborators, revision) = {
            let mut members = self.members.write();
            members.insert(session, member);
            let collaborators = members
                .iter()
                .filter(|(id, _)| **id != session)
                .map(|(_, other)| {
                    (
                        other.author.user_id.clone(),
                        CollaboratorInfo {
                            name: other.author.user_name.clone(),
                            cursor_position: other.cursor,
                        },
                    )
                })
                .collect();
            (collaborators, self.sequencer.revision())
        };

        info!(
            document = %self.id,
            user = %author.user_id,
            session,
            revision = %revision,
            "session joined"
        );

        self.publish(
            session,
            ServerEvent::CollaboratorJoined(CollaboratorJoined {
                user_id: author.user_id.clone(),
                user_name: author.user_name.clone(),
            }),
        );
        self.publish(
            session,
            ServerEvent::PresenceDiff(PresenceDiff {
                joins: HashMap::from([(author.user_id, presence)]),
                leaves: HashMap::new(),
            }),
        );

        JoinResponse {
            revision,
            collaborators,
        }
    }

    /// Removes a session. Returns false if it had not joined.
    pub fn leave(&self, session: SessionId) -> bool {
        let (member, still_present) = {
            let mut members = self.members.write();
            let Some(member) = members.remove(&session) else {
                return false;
            };
            let still_present = members
                .values()
                .any(|other| other.author.user_id == member.author.user_id);
            (member, still_present)
        };

        info!(document = %self.id, user = %member.author.user_id, session, "session left");

        // Another tab of the same user keeps them present.
        if !still_present {
            let presence = member.presence();
            self.publish(
                session,
                ServerEvent::CollaboratorLeft(CollaboratorLeft {
                    user_id: member.author.user_id.clone(),
                }),
            );
            self.publish(
                session,
                ServerEvent::PresenceDiff(PresenceDiff {
                    joins: HashMap::new(),
                    leaves: HashMap::from([(member.author.user_id, presence)]),
                }),
            );
        }
        true
    }

    /// Commits a change from `session` and broadcasts it to everyone else.
    pub fn submit(&self, session: SessionId, change: PushChange) -> Result<ChangeAck, RoomError> {
        let author = self.author(session)?;
        let _publishing = self.publishing.lock();
        let committed = self
            .sequencer
            .submit(change.delta, change.revision, &author)?;
        self.broadcast_commit(session, &author, &committed);
        Ok(ChangeAck {
            revision: committed.revision,
        })
    }

    /// Undoes the latest change of the session's user and broadcasts the result.
    pub fn undo(&self, session: SessionId) -> Result<UndoResponse, RoomError> {
        let author = self.author(session)?;
        let _publishing = self.publishing.lock();
        let committed = self.sequencer.undo(&author)?;
        self.broadcast_commit(session, &author, &committed);
        Ok(UndoResponse {
            delta: committed.delta,
            revision: committed.revision,
        })
    }

    /// Records and relays a cursor move. Not acknowledged.
    pub fn cursor(&self, session: SessionId, update: CursorUpdate) -> Result<(), RoomError> {
        let author = {
            let mut members = self.members.write();
            let member = members.get_mut(&session).ok_or(RoomError::NotJoined)?;
            member.cursor = Some(update.position);
            member.author.clone()
        };
        trace!(document = %self.id, user = %author.user_id, "cursor moved");
        self.publish(
            session,
            ServerEvent::RemoteCursor(RemoteCursor {
                user_id: author.user_id,
                user_name: author.user_name,
                position: Some(update.position),
            }),
        );
        Ok(())
    }

    pub fn history(&self) -> HistoryResponse {
        HistoryResponse {
            history: self.sequencer.history(),
        }
    }

    /// Who is in the room, one entry per user.
    pub fn presence_state(&self) -> PresenceState {
        let members = self.members.read();
        let mut presences: HashMap<_, PresenceMeta> = HashMap::new();
        for member in members.values() {
            presences
                .entry(member.author.user_id.clone())
                .and_modify(|meta| meta.joined_at = meta.joined_at.min(member.joined_at))
                .or_insert_with(|| member.presence());
        }
        PresenceState { presences }
    }

    fn author(&self, session: SessionId) -> Result<Author, RoomError> {
        self.members
            .read()
            .get(&session)
            .map(|member| member.author.clone())
            .ok_or(RoomError::NotJoined)
    }

    fn broadcast_commit(&self, session: SessionId, author: &Author, committed: &Committed) {
        {
            let mut members = self.members.write();
            for (id, member) in members.iter_mut() {
                if *id == session {
                    continue;
                }
                if let Some(cursor) = member.cursor {
                    member.cursor = Some(cursor.transform(&committed.delta, false));
                }
            }
        }

        self.publish(
            session,
            ServerEvent::RemoteUpdate(RemoteUpdate {
                delta: committed.delta.clone(),
                revision: committed.revision,
                user_id: author.user_id.clone(),
                user_name: author.user_name.clone(),
            }),
        );
    }

    fn publish(&self, origin: SessionId, event: ServerEvent) {
        if self.events.send(RoomEvent { origin, event }).is_err() {
            trace!(document = %self.id, "no subscribers for event");
        }
    }
}

/// All open rooms, created on first use.
pub struct Rooms {
    rooms: RwLock<HashMap<String, Arc<DocumentRoom>>>,
    next_session: AtomicU64,
    event_buffer: usize,
}

impl Rooms {
    pub fn new(event_buffer: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            event_buffer,
        }
    }

    /// The room for `document_id`, if one is open.
    pub fn get(&self, document_id: &str) -> Option<Arc<DocumentRoom>> {
        self.rooms.read().get(document_id).cloned()
    }

    /// The room for `document_id`, opening an empty one if needed.
    pub fn get_or_create(&self, document_id: &str) -> Arc<DocumentRoom> {
        if let Some(room) = self.get(document_id) {
            return room;
        }
        let mut rooms = self.rooms.write();
        Arc::clone(rooms.entry(document_id.to_string()).or_insert_with(|| {
            debug!(document = %document_id, "opening room");
            Arc::new(DocumentRoom::new(document_id, self.event_buffer))
        }))
    }

    /// Opens a room with existing content. An open room of the same name is kept.
    pub fn open_with(&self, document_id: &str, sequencer: Sequencer) -> Arc<DocumentRoom> {
        let mut rooms = self.rooms.write();
        Arc::clone(rooms.entry(document_id.to_string()).or_insert_with(|| {
            Arc::new(DocumentRoom::with_sequencer(
                document_id,
                sequencer,
                self.event_buffer,
            ))
        }))
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    pub fn next_session_id(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}
