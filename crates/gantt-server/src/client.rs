use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use gantt_core::ConnectionId;
use gantt_engine::{ClientReply, ClientSink, Orchestrator, UserInput};

use crate::protocol;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Inbound messages waiting behind the current turn.
const INBOUND_QUEUE: usize = 32;

/// A connected browser.
pub struct Client {
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
}

impl Client {
    fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            connected: AtomicBool::new(true),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Queue a frame. Drops it if the queue is full or the socket is gone.
    pub fn send(&self, frame: String) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(
                    connection_id = %self.id,
                    frame_len = frame.len(),
                    "send queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl ClientSink for Client {
    fn deliver(&self, reply: ClientReply) -> bool {
        match protocol::encode_reply(&reply) {
            Ok(frame) => self.send(frame),
            Err(e) => {
                error!(connection_id = %self.id, error = %e, "failed to encode reply");
                false
            }
        }
    }
}

/// Registry of all connected WebSocket clients.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<Client>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new client and return it with the receiving end of its
    /// outbound queue.
    pub fn register(&self) -> (Arc<Client>, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue.max(1));
        let client = Arc::new(Client::new(id.clone(), tx));
        let _ = self.clients.insert(id, Arc::clone(&client));
        (client, rx)
    }

    pub fn unregister(&self, id: &ConnectionId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|c| Arc::clone(&c))
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

/// Drive one WebSocket connection until either side goes away.
///
/// Three tasks: a writer draining the outbound queue (and pinging), a reader
/// decoding frames, and a worker running turns one at a time.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client: Arc<Client>,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    orchestrator: Arc<Orchestrator>,
) {
    let client_id = client.id.clone();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = client_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    trace!(connection_id = %writer_cid, "sent ping");
                }
            }
        }
    });

    let (turn_tx, mut turn_rx) = mpsc::channel::<UserInput>(INBOUND_QUEUE);

    let worker_client = Arc::clone(&client);
    let worker_orch = Arc::clone(&orchestrator);
    let worker = tokio::spawn(async move {
        while let Some(input) = turn_rx.recv().await {
            if !worker_client.is_connected() {
                break;
            }
            let id = worker_client.id.clone();
            match worker_orch
                .handle_user_message(&id, input, &*worker_client)
                .await
            {
                Ok(report) => debug!(connection_id = %id, outcome = ?report.outcome, "turn finished"),
                Err(e) => error!(connection_id = %id, error = %e, "turn failed"),
            }
        }
    });

    let reader_cid = client_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match protocol::parse_inbound(text.as_str()) {
                    Ok(input) => {
                        if turn_tx.send(input).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(connection_id = %reader_cid, error = %e, "dropping inbound frame"),
                },
                WsMessage::Binary(_) => debug!(connection_id = %reader_cid, "ignoring binary frame"),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    registry.unregister(&client_id);
    orchestrator.close_connection(&client_id);
    info!(connection_id = %client_id, "client disconnected");

    // The worker exits once the current turn finishes; its result is
    // discarded because the history is gone.
    drop(worker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantt_core::CommandEnvelope;
    use serde_json::json;

    #[test]
    fn register_and_unregister() {
        let registry = ClientRegistry::new(32);
        assert_eq!(registry.count(), 0);

        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_ne!(a.id, b.id);
        assert_eq!(registry.count(), 2);

        registry.unregister(&a.id);
        assert_eq!(registry.count(), 1);
        assert!(!a.is_connected());
        assert!(b.is_connected());
        assert!(registry.get(&a.id).is_none());
    }

    #[tokio::test]
    async fn deliver_encodes_frames() {
        let registry = ClientRegistry::new(8);
        let (client, mut rx) = registry.register();

        assert!(client.deliver(ClientReply::AssistantText("hi".into())));
        assert!(client.deliver(ClientReply::Command(CommandEnvelope {
            cmd: "undo".into(),
            params: json!({}),
        })));

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["event"], "assistant_msg");
        let second: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(second["event"], "tool_call");
    }

    #[test]
    fn full_queue_drops_frames() {
        let registry = ClientRegistry::new(1);
        let (client, _rx) = registry.register();
        assert!(client.send("one".into()));
        assert!(!client.send("two".into()));
    }

    #[test]
    fn closed_queue_reports_failure() {
        let registry = ClientRegistry::new(4);
        let (client, rx) = registry.register();
        drop(rx);
        assert!(!client.deliver(ClientReply::AssistantText("hi".into())));
    }
}
