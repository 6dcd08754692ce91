//! Shared helpers for the integration tests.

#![allow(dead_code)]

use delta_sync::delta::Delta;
use delta_sync::document::{Block, DefaultSchema, RichText};
use delta_sync::server::{LocalTransport, Rooms};
use delta_sync::sync::{ClientIdentity, SyncClient};

pub type Client = SyncClient<LocalTransport, DefaultSchema>;
pub type Doc = RichText<Block>;

/// A client on `document_id` over the in-process transport, not yet joined.
pub fn client(rooms: &Rooms, document_id: &str, user_id: &str) -> Client {
    let name = user_id[..1].to_uppercase() + &user_id[1..];
    SyncClient::new(
        ClientIdentity::new(document_id, user_id, name),
        LocalTransport::connect(rooms, document_id),
        DefaultSchema,
    )
}

/// Feeds every event waiting on the client's transport into the client.
pub fn pump(client: &mut Client, doc: &mut Doc) -> usize {
    let events = client.transport_mut().drain_events();
    let count = events.len();
    for event in events {
        client.handle_event(doc, event);
    }
    count
}

/// Applies a local edit to `doc` and queues the resulting change.
pub fn edit(client: &mut Client, doc: &mut Doc, change: impl FnOnce(&mut Doc)) -> Option<Delta> {
    let before = doc.clone();
    change(doc);
    client
        .local_edit(&before, doc)
        .expect("local edit should be queued")
}
