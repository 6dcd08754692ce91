//! Error types for the delta algebra, the sync client, the sequencer and the server.

use thiserror::Error;

use crate::sync::types::Revision;

/// Errors raised while building or decoding deltas.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeltaError {
    /// A wire operation that cannot be represented (negative length, ambiguous kind).
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    /// A document operation was requested on a delta that is not insert-only.
    #[error("delta contains retain or delete operations and is not a document")]
    NotADocument,
}

/// Errors surfaced by a [`Transport`](crate::sync::Transport).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The connection could not be established.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// No reply arrived within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an error reply.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The connection closed before a reply arrived.
    #[error("connection closed")]
    Closed,

    /// A frame could not be encoded or the reply had an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors returned by [`SyncClient`](crate::sync::SyncClient) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The operation needs a joined session.
    #[error("client is not connected")]
    NotConnected,

    /// Joining the document failed; the client is back to disconnected.
    #[error("join failed: {0}")]
    Join(#[source] TransportError),

    /// A queued change was not acknowledged. The queue was discarded.
    #[error("push failed, {discarded} queued change(s) discarded: {source}")]
    Push {
        #[source]
        source: TransportError,
        discarded: usize,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Errors returned by the [`Sequencer`](crate::sequencer::Sequencer).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequencerError {
    /// The change claims a revision the sequencer has not produced yet.
    #[error("base revision {base} is ahead of current revision {current}")]
    RevisionAhead { base: Revision, current: Revision },

    /// After rebasing, the change still spans more than the document holds.
    #[error("change spans {delta} characters but the document has {document}")]
    LengthMismatch { document: usize, delta: usize },

    /// The author has no change left to undo.
    #[error("nothing to undo")]
    NothingToUndo,

    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Errors returned by a server-side [`DocumentRoom`](crate::server::DocumentRoom).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoomError {
    /// The session sent a request that needs a prior join.
    #[error("session has not joined the document")]
    NotJoined,

    /// The join named a different document than the one the session is bound to.
    #[error("session is bound to document {expected}, not {requested}")]
    WrongDocument { expected: String, requested: String },

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}
