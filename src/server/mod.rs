//! Relay server for the sync protocol.
//!
//! This module contains the Axum web server that hosts one [`DocumentRoom`] per document,
//! the WebSocket session that speaks the frame protocol, and an in-process transport for
//! clients living in the same process.

pub mod local;
pub mod room;
pub mod routes;
pub mod websocket;

pub use local::LocalTransport;
pub use room::{DocumentRoom, RoomEvent, Rooms, SessionId};
pub use routes::{AppState, create_router};
pub use websocket::{DocumentSession, SessionError};
