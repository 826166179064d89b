//! Broadcaster adapter (§4.6): fan-out of already-serialized update records
//! to subscriber WebSocket connections, each bounded by its own write
//! deadline. A map of subscriber channels behind a short lock, snapshotted
//! before the actual sends happen.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

const SUBSCRIBER_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
const SUBSCRIBER_BUFFER: usize = 64;

pub struct Broadcaster {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Vec<u8>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new subscriber and return its id plus the receiving end
    /// the WebSocket connection task should drain.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<Vec<u8>>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().expect("broadcaster lock poisoned").insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.lock().expect("broadcaster lock poisoned").remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("broadcaster lock poisoned").len()
    }

    /// Snapshot the subscriber set under a short lock, then write to each
    /// with its own deadline. Failed writes (closed connection, full
    /// buffer past the deadline) are silently dropped — the accept side
    /// reaps closed connections on its own.
    pub async fn broadcast(&self, payload: Vec<u8>) {
        let targets: Vec<(Uuid, mpsc::Sender<Vec<u8>>)> = {
            let subs = self.subscribers.lock().expect("broadcaster lock poisoned");
            subs.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        for (id, tx) in targets {
            match tokio::time::timeout(SUBSCRIBER_WRITE_TIMEOUT, tx.send(payload.clone())).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => debug!(%id, "subscriber channel closed, dropping write"),
                Err(_) => debug!(%id, "subscriber write exceeded deadline, dropping write"),
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
