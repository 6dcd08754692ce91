//! Messages exchanged between sync clients and the sequencer.
//!
//! Requests travel in a [`ClientFrame`] tagged with a reference number; the server answers
//! each request (except cursor updates) with a [`ServerFrame::Reply`] carrying the same
//! reference, and pushes unsolicited [`ServerEvent`]s as [`ServerFrame::Event`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::CursorPosition;
use crate::delta::Delta;
use crate::sync::types::{Revision, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub document_id: String,
    pub user_id: UserId,
    pub user_name: String,
}

/// What the client knows about a collaborator right after joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorInfo {
    pub name: String,
    #[serde(default)]
    pub cursor_position: Option<CursorPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub revision: Revision,
    #[serde(default)]
    pub collaborators: HashMap<UserId, CollaboratorInfo>,
}

/// A local change computed against `revision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushChange {
    pub delta: Delta,
    pub revision: Revision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAck {
    pub revision: Revision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorUpdate {
    pub position: CursorPosition,
}

/// A committed change by another client, already rebased by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUpdate {
    pub delta: Delta,
    pub revision: Revision,
    pub user_id: UserId,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCursor {
    pub user_id: UserId,
    pub user_name: String,
    pub position: Option<CursorPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorJoined {
    pub user_id: UserId,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorLeft {
    pub user_id: UserId,
}

/// The full document content, replacing whatever the client holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdated {
    pub contents: Delta,
    pub revision: Revision,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    pub presences: HashMap<UserId, PresenceMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceDiff {
    #[serde(default)]
    pub joins: HashMap<UserId, PresenceMeta>,
    #[serde(default)]
    pub leaves: HashMap<UserId, PresenceMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub revision: Revision,
    pub user_id: UserId,
    pub user_name: String,
    pub committed_at: DateTime<Utc>,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

/// The committed undo change; the undoing client applies it like a remote update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoResponse {
    pub delta: Delta,
    pub revision: Revision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientRequest {
    Join(JoinRequest),
    Update(PushChange),
    CursorUpdate(CursorUpdate),
    GetHistory,
    Undo,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "ref")]
    pub reference: u64,
    pub request: ClientRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyBody {
    Joined(JoinResponse),
    Ack(ChangeAck),
    History(HistoryResponse),
    Undone(UndoResponse),
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    RemoteUpdate(RemoteUpdate),
    RemoteCursor(RemoteCursor),
    CollaboratorJoined(CollaboratorJoined),
    CollaboratorLeft(CollaboratorLeft),
    DocumentUpdated(DocumentUpdated),
    PresenceState(PresenceState),
    PresenceDiff(PresenceDiff),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Reply {
        #[serde(rename = "ref")]
        reference: u64,
        result: Result<ReplyBody, String>,
    },
    Event {
        event: ServerEvent,
    },
}
