//! Client-side synchronization with a sequencer.
//!
//! - `types`: revisions, user identity and the collaborator set
//! - `protocol`: the request, reply and event messages
//! - `transport`: the [`Transport`] seam, with a WebSocket implementation in `ws`
//! - `client`: the [`SyncClient`] state machine

pub mod client;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod ws;

pub use client::{
    ClientIdentity, ClientObserver, ConnectionState, NoopObserver, RemoteApplyFlag,
    RemoteApplyGuard, SendOutcome, SyncClient,
};
pub use transport::Transport;
pub use types::{Author, Collaborator, CollaboratorSet, Revision, UserId};
pub use ws::{WsConfig, WsTransport};
