//! WebSocket transport speaking the JSON frame protocol of the relay server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::sync::protocol::{
    ChangeAck, ClientFrame, ClientRequest, CursorUpdate, HistoryResponse, JoinRequest,
    JoinResponse, PushChange, ReplyBody, ServerEvent, ServerFrame, UndoResponse,
};
use crate::sync::transport::Transport;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to connect and how long to wait for replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    pub url: String,
    pub request_timeout: Duration,
}

impl WsConfig {
    /// The socket URL of `document_id` on the server at `base_url` (`ws://host:port`).
    pub fn new(base_url: &str, document_id: &str) -> Self {
        Self {
            url: format!("{}/socket/{}", base_url.trim_end_matches('/'), document_id),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

type Reply = Result<ReplyBody, String>;
type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// A [`Transport`] over one WebSocket connection.
///
/// A writer task drains outgoing frames and a reader task routes replies to the request
/// that is waiting for them by reference number. Server events go to the channel returned
/// by [`WsTransport::connect`].
pub struct WsTransport {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
    next_reference: u64,
    request_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl WsTransport {
    pub async fn connect(
        config: &WsConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>), TransportError> {
        let (stream, _) = connect_async(config.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(url = %config.url, "websocket connected");

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = PendingReplies::default();

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "websocket send failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let replies = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(ServerFrame::Reply { reference, result }) => {
                            let waiting = replies.lock().remove(&reference);
                            match waiting {
                                Some(sender) => {
                                    let _ = sender.send(result);
                                }
                                None => debug!(reference, "reply for a request no longer waiting"),
                            }
                        }
                        Ok(ServerFrame::Event { event }) => {
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "undecodable frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
            // Dropping the senders wakes every waiting request with `Closed`.
            replies.lock().clear();
        });

        Ok((
            Self {
                outgoing,
                pending,
                next_reference: 1,
                request_timeout: config.request_timeout,
                tasks: vec![writer, reader],
            },
            events_rx,
        ))
    }

    fn send_frame(&mut self, reference: u64, request: ClientRequest) -> Result<(), TransportError> {
        let text = serde_json::to_string(&ClientFrame { reference, request })
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.outgoing
            .send(Message::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn reserve_reference(&mut self) -> u64 {
        let reference = self.next_reference;
        self.next_reference += 1;
        reference
    }

    async fn request(&mut self, request: ClientRequest) -> Result<ReplyBody, TransportError> {
        let reference = self.reserve_reference();
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(reference, sender);

        if let Err(e) = self.send_frame(reference, request) {
            self.pending.lock().remove(&reference);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, receiver).await {
            Err(_) => {
                self.pending.lock().remove(&reference);
                Err(TransportError::Timeout)
            }
            Ok(Err(_)) => Err(TransportError::Closed),
            Ok(Ok(Err(reason))) => Err(TransportError::Rejected(reason)),
            Ok(Ok(Ok(body))) => Ok(body),
        }
    }
}

fn unexpected(body: ReplyBody) -> TransportError {
    TransportError::Protocol(format!("unexpected reply {body:?}"))
}

impl Transport for WsTransport {
    async fn join(&mut self, request: JoinRequest) -> Result<JoinResponse, TransportError> {
        match self.request(ClientRequest::Join(request)).await? {
            ReplyBody::Joined(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    async fn push_change(&mut self, change: PushChange) -> Result<ChangeAck, TransportError> {
        match self.request(ClientRequest::Update(change)).await? {
            ReplyBody::Ack(ack) => Ok(ack),
            other => Err(unexpected(other)),
        }
    }

    fn push_cursor(&mut self, update: CursorUpdate) -> Result<(), TransportError> {
        let reference = self.reserve_reference();
        self.send_frame(reference, ClientRequest::CursorUpdate(update))
    }

    async fn request_history(&mut self) -> Result<HistoryResponse, TransportError> {
        match self.request(ClientRequest::GetHistory).await? {
            ReplyBody::History(history) => Ok(history),
            other => Err(unexpected(other)),
        }
    }

    async fn request_undo(&mut self) -> Result<UndoResponse, TransportError> {
        match self.request(ClientRequest::Undo).await? {
            ReplyBody::Undone(undone) => Ok(undone),
            other => Err(unexpected(other)),
        }
    }

    async fn leave(&mut self) -> Result<(), TransportError> {
        match self.request(ClientRequest::Leave).await? {
            ReplyBody::Left => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_url() {
        let config = WsConfig::new("ws://127.0.0.1:3000/", "notes");
        assert_eq!(config.url, "ws://127.0.0.1:3000/socket/notes");
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
