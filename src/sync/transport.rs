//! The seam between the sync client and whatever carries its messages.

use std::future::Future;

use crate::error::TransportError;
use crate::sync::protocol::{
    ChangeAck, CursorUpdate, HistoryResponse, JoinRequest, JoinResponse, PushChange,
    UndoResponse,
};

/// Request/reply channel to a sequencer.
///
/// Unsolicited [`ServerEvent`](crate::sync::protocol::ServerEvent)s are not part of this
/// trait: each transport hands them to the application through its own channel, and the
/// application feeds them to [`SyncClient::handle_event`](crate::sync::SyncClient::handle_event)
/// in delivery order.
pub trait Transport {
    fn join(
        &mut self,
        request: JoinRequest,
    ) -> impl Future<Output = Result<JoinResponse, TransportError>> + Send;

    fn push_change(
        &mut self,
        change: PushChange,
    ) -> impl Future<Output = Result<ChangeAck, TransportError>> + Send;

    /// Fire-and-forget; cursor updates are never acknowledged.
    fn push_cursor(&mut self, update: CursorUpdate) -> Result<(), TransportError>;

    fn request_history(
        &mut self,
    ) -> impl Future<Output = Result<HistoryResponse, TransportError>> + Send;

    fn request_undo(&mut self) -> impl Future<Output = Result<UndoResponse, TransportError>> + Send;

    fn leave(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
