//! The client side of the collaboration protocol.
//!
//! A [`SyncClient`] joins a document on a sequencer, pushes local changes tagged with the
//! last revision it knows, and applies changes committed by other users to the local
//! document. It does not rebase local changes itself: the sequencer transforms late changes
//! and every client applies what it is sent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, trace, warn};

use crate::cursor::CursorPosition;
use crate::delta::{Delta, Operation};
use crate::document::{DocumentProjector, NodeSchema, RichDocument};
use crate::error::SyncError;
use crate::sync::protocol::{
    CursorUpdate, DocumentUpdated, HistoryEntry, JoinRequest, JoinResponse, PresenceDiff,
    PresenceMeta, PresenceState, PushChange, RemoteCursor, RemoteUpdate, ServerEvent,
};
use crate::sync::transport::Transport;
use crate::sync::types::{Collaborator, CollaboratorSet, Revision, UserId};

/// Who this client is and which document it edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub document_id: String,
    pub user_id: UserId,
    pub user_name: String,
}

impl ClientIdentity {
    pub fn new(
        document_id: impl Into<String>,
        user_id: impl Into<UserId>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// Connection lifecycle of a [`SyncClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Joined; `synced` is false while the local content is being replaced wholesale.
    Joined { synced: bool },
}

/// Set while a remote change is being applied to the local document.
///
/// Clones share the flag, so an editor's change hook can hold one and skip the changes the
/// client itself is applying.
#[derive(Debug, Clone, Default)]
pub struct RemoteApplyFlag(Arc<AtomicBool>);

impl RemoteApplyFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raises the flag until the returned guard is dropped.
    pub fn enter(&self) -> RemoteApplyGuard {
        let previous = self.0.swap(true, Ordering::SeqCst);
        RemoteApplyGuard {
            flag: Arc::clone(&self.0),
            previous,
        }
    }
}

/// Restores the [`RemoteApplyFlag`] when dropped, including during unwinding.
#[must_use = "the flag is lowered as soon as the guard is dropped"]
pub struct RemoteApplyGuard {
    flag: Arc<AtomicBool>,
    previous: bool,
}

impl Drop for RemoteApplyGuard {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

/// Callbacks for the embedding application. Every method defaults to doing nothing.
pub trait ClientObserver: Send {
    fn on_state_changed(&mut self, _state: ConnectionState) {}

    /// A change by someone else has been applied to the local document.
    fn on_remote_update(&mut self, _delta: &Delta, _user_id: &str, _user_name: Option<&str>) {}

    fn on_collaborators_changed(&mut self, _collaborators: &CollaboratorSet) {}

    fn on_remote_cursor(
        &mut self,
        _user_id: &str,
        _user_name: &str,
        _position: Option<CursorPosition>,
    ) {
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ClientObserver for NoopObserver {}

/// Result of [`SyncClient::send_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A remote change was being applied; the change was not sent.
    Suppressed,
    /// The change was empty.
    Empty,
    /// The sequencer committed the change at this revision.
    Acknowledged(Revision),
}

/// Keeps one local document in sync with a sequencer.
///
/// All methods take `&mut self`, so a client never interleaves its own operations; it
/// suspends only while waiting on the transport.
pub struct SyncClient<T, S> {
    identity: ClientIdentity,
    transport: T,
    projector: DocumentProjector<S>,
    state: ConnectionState,
    revision: Revision,
    collaborators: CollaboratorSet,
    pending: VecDeque<Delta>,
    remote_apply: RemoteApplyFlag,
    local_cursor: Option<CursorPosition>,
    observer: Box<dyn ClientObserver>,
}

impl<T: Transport, S: NodeSchema> SyncClient<T, S> {
    pub fn new(identity: ClientIdentity, transport: T, schema: S) -> Self {
        Self {
            identity,
            transport,
            projector: DocumentProjector::new(schema),
            state: ConnectionState::Disconnected,
            revision: Revision::INITIAL,
            collaborators: CollaboratorSet::new(),
            pending: VecDeque::new(),
            remote_apply: RemoteApplyFlag::default(),
            local_cursor: None,
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: impl ClientObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, ConnectionState::Joined { .. })
    }

    /// The latest revision acknowledged or broadcast by the sequencer.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn collaborators(&self) -> &CollaboratorSet {
        &self.collaborators
    }

    pub fn projector(&self) -> &DocumentProjector<S> {
        &self.projector
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Number of changes queued and not yet acknowledged.
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    pub fn is_applying_remote_change(&self) -> bool {
        self.remote_apply.is_set()
    }

    /// A handle on the re-entrancy flag for editor change hooks.
    pub fn remote_apply_flag(&self) -> RemoteApplyFlag {
        self.remote_apply.clone()
    }

    pub fn local_cursor(&self) -> Option<CursorPosition> {
        self.local_cursor
    }

    pub fn set_local_cursor(&mut self, position: Option<CursorPosition>) {
        self.local_cursor = position;
    }

    /// Joins the document, seeding the revision and the collaborator set.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        if self.is_joined() {
            debug!(document = %self.identity.document_id, "already joined");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let request = JoinRequest {
            document_id: self.identity.document_id.clone(),
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.user_name.clone(),
        };

        match self.transport.join(request).await {
            Ok(response) => {
                self.set_state(ConnectionState::Joined { synced: false });
                self.seed(response);
                self.set_state(ConnectionState::Joined { synced: true });
                info!(
                    document = %self.identity.document_id,
                    user = %self.identity.user_id,
                    revision = %self.revision,
                    "joined document"
                );
                Ok(())
            }
            Err(e) => {
                warn!(document = %self.identity.document_id, error = %e, "join failed");
                self.set_state(ConnectionState::Disconnected);
                Err(SyncError::Join(e))
            }
        }
    }

    fn seed(&mut self, response: JoinResponse) {
        self.revision = response.revision;
        let own_id = &self.identity.user_id;
        self.collaborators.replace(
            response
                .collaborators
                .into_iter()
                .filter(|(user_id, _)| user_id != own_id)
                .map(|(user_id, info)| Collaborator {
                    user_id,
                    display_name: info.name,
                    cursor_position: info.cursor_position,
                    joined_at: None,
                }),
        );
        self.observer.on_collaborators_changed(&self.collaborators);
    }

    /// Leaves the document. Queued changes are dropped; nothing is rolled back.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if let Err(e) = self.transport.leave().await {
            warn!(document = %self.identity.document_id, error = %e, "leave failed");
        }
        self.pending.clear();
        self.collaborators.clear();
        self.set_state(ConnectionState::Disconnected);
        info!(document = %self.identity.document_id, "disconnected");
    }

    /// Queues a local change for [`flush`](Self::flush).
    ///
    /// Returns `false` without queueing while a remote change is being applied or when the
    /// change is empty.
    pub fn queue_change(&mut self, delta: Delta) -> Result<bool, SyncError> {
        if self.remote_apply.is_set() {
            trace!("not queueing a change made while applying a remote one");
            return Ok(false);
        }
        if !self.is_joined() {
            return Err(SyncError::NotConnected);
        }
        if delta.is_empty() {
            return Ok(false);
        }
        self.pending.push_back(delta);
        Ok(true)
    }

    /// Detects the local edit between two snapshots of the document and queues it.
    pub fn local_edit<D>(&mut self, before: &D, after: &D) -> Result<Option<Delta>, SyncError>
    where
        D: RichDocument<Block = S::Block>,
    {
        if self.remote_apply.is_set() {
            trace!("ignoring document change made while applying a remote one");
            return Ok(None);
        }
        let delta = self.projector.diff(before, after)?;
        if self.queue_change(delta.clone())? {
            Ok(Some(delta))
        } else {
            Ok(None)
        }
    }

    /// Pushes queued changes in order, each tagged with the revision current when it is sent.
    ///
    /// On failure the remaining queue is discarded and the error reports how many changes
    /// were lost; the caller recomputes the diff against the current document if it wants
    /// to retry.
    pub async fn flush(&mut self) -> Result<Option<Revision>, SyncError> {
        if !self.is_joined() {
            return Err(SyncError::NotConnected);
        }

        let mut acknowledged = None;
        while let Some(delta) = self.pending.front().cloned() {
            let change = PushChange {
                delta,
                revision: self.revision,
            };
            debug!(
                document = %self.identity.document_id,
                revision = %change.revision,
                "pushing change"
            );
            match self.transport.push_change(change).await {
                Ok(ack) => {
                    self.pending.pop_front();
                    self.adopt_revision(ack.revision);
                    acknowledged = Some(ack.revision);
                }
                Err(source) => {
                    let discarded = self.pending.len();
                    self.pending.clear();
                    warn!(
                        document = %self.identity.document_id,
                        error = %source,
                        discarded,
                        "push failed"
                    );
                    return Err(SyncError::Push { source, discarded });
                }
            }
        }
        Ok(acknowledged)
    }

    /// Sends one change and waits for its acknowledgement.
    pub async fn send_change(&mut self, delta: Delta) -> Result<SendOutcome, SyncError> {
        if self.remote_apply.is_set() {
            return Ok(SendOutcome::Suppressed);
        }
        if !self.queue_change(delta)? {
            return Ok(SendOutcome::Empty);
        }
        match self.flush().await? {
            Some(revision) => Ok(SendOutcome::Acknowledged(revision)),
            None => Ok(SendOutcome::Empty),
        }
    }

    /// Publishes the local selection.
    pub fn send_cursor(&mut self, position: CursorPosition) -> Result<(), SyncError> {
        if !self.is_joined() {
            return Err(SyncError::NotConnected);
        }
        self.local_cursor = Some(position);
        self.transport.push_cursor(CursorUpdate { position })?;
        Ok(())
    }

    /// The sequencer's change history.
    pub async fn history(&mut self) -> Result<Vec<HistoryEntry>, SyncError> {
        if !self.is_joined() {
            return Err(SyncError::NotConnected);
        }
        Ok(self.transport.request_history().await?.history)
    }

    /// Asks the sequencer to undo this user's latest change and applies the result locally.
    pub async fn undo<D>(&mut self, doc: &mut D) -> Result<Revision, SyncError>
    where
        D: RichDocument<Block = S::Block>,
    {
        if !self.is_joined() {
            return Err(SyncError::NotConnected);
        }
        let reply = self.transport.request_undo().await?;
        let user_id = self.identity.user_id.clone();
        let user_name = self.identity.user_name.clone();
        self.apply_remote(
            doc,
            &reply.delta,
            reply.revision,
            &user_id,
            Some(user_name.as_str()),
        );
        Ok(reply.revision)
    }

    /// Routes one server event.
    pub fn handle_event<D>(&mut self, doc: &mut D, event: ServerEvent)
    where
        D: RichDocument<Block = S::Block>,
    {
        match event {
            ServerEvent::RemoteUpdate(update) => {
                self.receive_remote_change(doc, update);
            }
            ServerEvent::RemoteCursor(cursor) => self.receive_remote_cursor(cursor),
            ServerEvent::CollaboratorJoined(joined) => {
                if joined.user_id != self.identity.user_id {
                    self.collaborators
                        .upsert(Collaborator::new(joined.user_id, joined.user_name));
                    self.observer.on_collaborators_changed(&self.collaborators);
                }
            }
            ServerEvent::CollaboratorLeft(left) => {
                if self.collaborators.remove(&left.user_id).is_some() {
                    self.observer.on_collaborators_changed(&self.collaborators);
                }
            }
            ServerEvent::DocumentUpdated(update) => self.reset_document(doc, update),
            ServerEvent::PresenceState(state) => self.receive_presence_state(state),
            ServerEvent::PresenceDiff(diff) => self.receive_presence_diff(diff),
        }
    }

    /// Applies a change committed by another user. Returns whether it was applied.
    ///
    /// Echoes of this user's own changes are ignored entirely.
    pub fn receive_remote_change<D>(&mut self, doc: &mut D, update: RemoteUpdate) -> bool
    where
        D: RichDocument<Block = S::Block>,
    {
        if update.user_id == self.identity.user_id {
            trace!(revision = %update.revision, "ignoring echo of own change");
            return false;
        }
        self.apply_remote(
            doc,
            &update.delta,
            update.revision,
            &update.user_id,
            Some(update.user_name.as_str()),
        );
        true
    }

    fn apply_remote<D>(
        &mut self,
        doc: &mut D,
        delta: &Delta,
        revision: Revision,
        user_id: &str,
        user_name: Option<&str>,
    ) where
        D: RichDocument<Block = S::Block>,
    {
        let _guard = self.remote_apply.enter();
        self.adopt_revision(revision);
        self.projector.apply(doc, delta);
        self.local_cursor = self
            .local_cursor
            .map(|cursor| cursor.transform(delta, false));
        self.collaborators.transform_cursors(delta, user_id);
        debug!(
            document = %self.identity.document_id,
            user = %user_id,
            revision = %revision,
            "applied remote change"
        );
        self.observer.on_remote_update(delta, user_id, user_name);
    }

    fn receive_remote_cursor(&mut self, cursor: RemoteCursor) {
        if cursor.user_id == self.identity.user_id {
            return;
        }
        self.collaborators
            .set_cursor(&cursor.user_id, &cursor.user_name, cursor.position);
        self.observer
            .on_remote_cursor(&cursor.user_id, &cursor.user_name, cursor.position);
        self.observer.on_collaborators_changed(&self.collaborators);
    }

    /// Replaces the local content with the sequencer's copy.
    fn reset_document<D>(&mut self, doc: &mut D, update: DocumentUpdated)
    where
        D: RichDocument<Block = S::Block>,
    {
        self.set_state(ConnectionState::Joined { synced: false });
        if !self.pending.is_empty() {
            warn!(
                discarded = self.pending.len(),
                "dropping queued changes superseded by a document reset"
            );
            self.pending.clear();
        }

        let mut reset: Delta = update.contents.ops().iter().cloned().collect();
        reset.push(Operation::Delete(doc.content_len()));
        {
            let _guard = self.remote_apply.enter();
            self.projector.apply(doc, &reset);
            self.revision = update.revision;
            let len = update.contents.target_len();
            self.local_cursor = self.local_cursor.map(|cursor| cursor.clamp(len));
            self.observer.on_remote_update(&reset, &update.user_id, None);
        }
        info!(revision = %self.revision, "document replaced");
        self.set_state(ConnectionState::Joined { synced: true });
    }

    fn receive_presence_state(&mut self, state: PresenceState) {
        let own_id = &self.identity.user_id;
        self.collaborators.replace(
            state
                .presences
                .into_iter()
                .filter(|(user_id, _)| user_id != own_id)
                .map(|(user_id, meta)| presence_collaborator(user_id, meta)),
        );
        self.observer.on_collaborators_changed(&self.collaborators);
    }

    fn receive_presence_diff(&mut self, diff: PresenceDiff) {
        for user_id in diff.leaves.keys() {
            if !diff.joins.contains_key(user_id) {
                self.collaborators.remove(user_id);
            }
        }
        for (user_id, meta) in diff.joins {
            if user_id != self.identity.user_id {
                self.collaborators
                    .upsert(presence_collaborator(user_id, meta));
            }
        }
        self.observer.on_collaborators_changed(&self.collaborators);
    }

    /// Revisions only move forward; an event overtaken by a later ack is not a rollback.
    fn adopt_revision(&mut self, revision: Revision) {
        self.revision = self.revision.max(revision);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.observer.on_state_changed(state);
        }
    }
}

fn presence_collaborator(user_id: UserId, meta: PresenceMeta) -> Collaborator {
    Collaborator {
        user_id,
        display_name: meta.name,
        cursor_position: None,
        joined_at: Some(meta.joined_at),
    }
}
