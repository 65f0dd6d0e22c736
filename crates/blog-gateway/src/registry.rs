use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use blog_types::events::Event;

pub type ConnectionId = Uuid;

/// Per-send deadline before a connection is considered dead.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound frames buffered per connection before sends start to wait.
pub const OUTBOX_CAPACITY: usize = 64;

/// Registry-side handle to one client's outbound queue.
///
/// The socket task owns the matching receiver; once it exits the queue
/// closes and the next broadcast drops the connection.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
}

impl Connection {
    pub fn open(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        Self::with_id(Uuid::new_v4(), capacity)
    }

    pub fn with_id(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Why a frame could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    Closed,
    TimedOut,
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("connection closed"),
            Self::TimedOut => f.write_str("send timed out"),
        }
    }
}

/// Outcome of one [`Registry::broadcast`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// The set of live connections, shared by every request task.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    send_timeout: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_send_timeout(DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: RwLock::new(HashMap::new()),
                send_timeout,
            }),
        }
    }

    /// Add a connection. Returns `false` (and changes nothing) if its id is
    /// already registered.
    pub async fn register(&self, conn: Connection) -> bool {
        let mut connections = self.inner.connections.write().await;
        if connections.contains_key(&conn.id) {
            return false;
        }
        debug!("Registered connection {}", conn.id);
        connections.insert(conn.id, conn);
        true
    }

    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.inner.connections.write().await.remove(&id).is_some();
        if removed {
            debug!("Unregistered connection {}", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.inner.connections.read().await.contains_key(&id)
    }

    /// Serialize `event` once and push it to every registered connection.
    ///
    /// The lock is held only to snapshot the connection set. Sends run
    /// concurrently, each bounded by the send timeout; a connection that is
    /// closed or times out is unregistered. Never fails as a whole.
    pub async fn broadcast(&self, event: &Event) -> BroadcastReport {
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return BroadcastReport::default();
            }
        };

        let targets: Vec<Connection> = self
            .inner
            .connections
            .read()
            .await
            .values()
            .cloned()
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let timeout = self.inner.send_timeout;
        let sends = targets.into_iter().map(|conn| {
            let payload = payload.clone();
            async move {
                let outcome = match tokio::time::timeout(timeout, conn.tx.send(payload)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(SendFailure::Closed),
                    Err(_) => Err(SendFailure::TimedOut),
                };
                (conn.id, outcome)
            }
        });

        let mut report = BroadcastReport::default();
        for (id, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    warn!(connection = %id, event = %event.kind(), "Broadcast send failed: {}", failure);
                    self.unregister(id).await;
                    report.dropped += 1;
                }
            }
        }

        debug!(
            "Broadcast {} to {} connections ({} dropped)",
            event.kind(),
            report.delivered,
            report.dropped
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn liked(add_like: bool) -> Event {
        Event::PostLiked {
            post_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            add_like,
        }
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = Registry::new();
        let (conn, _rx) = Connection::open(4);

        assert!(registry.register(conn.clone()).await);
        assert!(!registry.register(conn.clone()).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.unregister(conn.id()).await);
        assert!(!registry.unregister(conn.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry_is_a_no_op() {
        let registry = Registry::new();
        assert_eq!(registry.broadcast(&liked(true)).await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn closed_connection_is_dropped_and_others_still_receive() {
        let registry = Registry::new();
        let (a, mut rx_a) = Connection::open(4);
        let (b, mut rx_b) = Connection::open(4);
        let (dead, rx_dead) = Connection::open(4);
        drop(rx_dead);

        for conn in [a, b, dead.clone()] {
            registry.register(conn).await;
        }

        let event = liked(true);
        let report = registry.broadcast(&event).await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 1 });
        assert!(!registry.contains(dead.id()).await);
        assert_eq!(registry.len().await, 2);

        let expected = serde_json::to_string(&event).unwrap();
        assert_eq!(&*rx_a.recv().await.unwrap(), expected);
        assert_eq!(&*rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn stalled_connection_times_out() {
        let registry = Registry::with_send_timeout(Duration::from_millis(50));
        let (slow, _rx_slow) = Connection::open(1);
        let (fast, mut rx_fast) = Connection::open(4);
        registry.register(slow.clone()).await;
        registry.register(fast).await;

        // Fills the slow outbox; nobody reads it.
        assert_eq!(registry.broadcast(&liked(true)).await.dropped, 0);

        let report = registry.broadcast(&liked(false)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!registry.contains(slow.id()).await);
        assert!(rx_fast.recv().await.is_some());
        assert!(rx_fast.recv().await.is_some());
    }

    #[tokio::test]
    async fn events_arrive_in_broadcast_order() {
        let registry = Registry::new();
        let (conn, mut rx) = Connection::open(16);
        registry.register(conn).await;

        let post_id = Uuid::new_v4();
        let events = vec![
            Event::PostDeleted { id: post_id },
            Event::CommentDeleted { post_id, comment_id: Uuid::new_v4() },
            Event::CommentUpdated {
                post_id,
                comment_id: Uuid::new_v4(),
                message: "edited".into(),
                updated_at: Utc::now(),
            },
        ];
        for event in &events {
            registry.broadcast(event).await;
        }

        for event in &events {
            let frame = rx.recv().await.unwrap();
            let got: Event = serde_json::from_str(&frame).unwrap();
            assert_eq!(&got, event);
        }
    }

    #[tokio::test]
    async fn concurrent_register_and_broadcast() {
        let registry = Registry::new();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for _ in 0..16 {
            let (conn, rx) = Connection::open(64);
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(conn).await;
                registry.broadcast(&liked(true)).await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len().await, 16);
        // Each connection sees at least its own broadcast.
        let total: usize = receivers
            .iter_mut()
            .map(|rx| {
                let mut n = 0;
                while rx.try_recv().is_ok() {
                    n += 1;
                }
                n
            })
            .sum();
        assert!(total >= 16);
    }
}
