//! Route handlers for the relay server.
//!
//! This module contains all the HTTP route handlers and related types for the Axum server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{Json, Response},
    routing::get,
};
use serde::Serialize;
use tracing::info;

use crate::delta::Delta;
use crate::server::room::Rooms;
use crate::server::websocket::DocumentSession;
use crate::sync::types::Revision;

/// Shared application state
pub type AppState = Arc<Rooms>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Current content of a document.
#[derive(Debug, Serialize)]
pub struct DocumentSnapshot {
    pub document_id: String,
    pub revision: Revision,
    pub contents: Delta,
    pub text: String,
    pub collaborators: usize,
}

/// Basic health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!("{} open document(s)", state.len()),
    })
}

/// Snapshot of an open document, or 404 if nobody has opened it.
pub async fn get_document(
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DocumentSnapshot>, StatusCode> {
    let room = state.get(&document_id).ok_or(StatusCode::NOT_FOUND)?;
    let (contents, revision) = room.snapshot();
    let text = contents.document_text().unwrap_or_default();
    Ok(Json(DocumentSnapshot {
        document_id,
        revision,
        contents,
        text,
        collaborators: room.member_count(),
    }))
}

/// WebSocket connection handler for collaborative editing
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let room = state.get_or_create(&document_id);
    let session_id = state.next_session_id();
    info!(document = %document_id, session = session_id, "upgrading connection");
    ws.on_upgrade(move |socket| DocumentSession::new(socket, room, session_id).handle())
}

/// Creates and configures the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents/:id", get(get_document))
        .route("/socket/:id", get(ws_handler))
        .with_state(state)
}
