//! Connected-client registry
//!
//! The hub maps client ids to outbound frame senders. Broadcast iterates
//! a snapshot of the senders, so sockets connecting or dropping mid-fan-
//! out never invalidate the iteration; dead senders are pruned as they
//! are discovered.

use axum::extract::ws::Message;
use relay_core::ClientId;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

type FrameSender = mpsc::UnboundedSender<Message>;

/// Registry of open WebSocket clients.
#[derive(Default)]
pub struct WsHub {
    clients: RwLock<HashMap<ClientId, FrameSender>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened socket.
    pub fn insert(&self, client_id: ClientId, sender: FrameSender) {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(client_id, sender);
            debug!(%client_id, connections = clients.len(), "client registered");
        }
    }

    /// Remove a socket that left the OPEN state.
    pub fn remove(&self, client_id: ClientId) {
        if let Ok(mut clients) = self.clients.write() {
            clients.remove(&client_id);
            debug!(%client_id, connections = clients.len(), "client removed");
        }
    }

    /// Number of currently open sockets.
    pub fn count(&self) -> usize {
        self.clients.read().map(|clients| clients.len()).unwrap_or(0)
    }

    /// Send an already-serialized frame to every open socket. Returns how
    /// many sends were accepted; senders whose socket task is gone are
    /// pruned.
    pub fn broadcast_text(&self, frame: &str) -> usize {
        let snapshot: Vec<(ClientId, FrameSender)> = match self.clients.read() {
            Ok(clients) => clients
                .iter()
                .map(|(id, sender)| (*id, sender.clone()))
                .collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (client_id, sender) in snapshot {
            if sender.send(Message::Text(frame.to_string().into())).is_ok() {
                delivered += 1;
            } else {
                dead.push(client_id);
            }
        }

        for client_id in dead {
            self.remove(client_id);
        }
        delivered
    }
}
