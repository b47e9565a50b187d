//! Best-effort progress streaming to observing clients.
//!
//! Every stage of upload, construction and question answering reports
//! through [`ProgressPublisher`]. Delivery is fire-and-forget: a missing
//! subscriber, a closed channel or a serialization problem is logged and
//! swallowed, never surfaced to the pipeline that emitted the event.

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Closed set of event kinds streamed over the per-client channel.
///
/// Consumers must tolerate missing or out-of-order events; these are a UX
/// convenience, never required for correctness of the final response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        stage: String,
        progress: u8,
        message: String,
        timestamp: String,
    },
    QaUpdate {
        stage: String,
        #[serde(flatten)]
        payload: serde_json::Value,
        timestamp: String,
    },
    QaComplete {
        #[serde(flatten)]
        summary: serde_json::Value,
        timestamp: String,
    },
    Complete {
        stage: String,
        message: String,
        timestamp: String,
    },
    Error {
        stage: String,
        message: String,
        timestamp: String,
    },
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl ProgressEvent {
    pub fn progress(stage: &str, progress: u8, message: impl Into<String>) -> Self {
        Self::Progress {
            stage: stage.to_string(),
            progress: progress.min(100),
            message: message.into(),
            timestamp: now(),
        }
    }

    pub fn qa_update(stage: &str, payload: serde_json::Value) -> Self {
        Self::QaUpdate {
            stage: stage.to_string(),
            payload,
            timestamp: now(),
        }
    }

    pub fn qa_complete(summary: serde_json::Value) -> Self {
        Self::QaComplete {
            summary,
            timestamp: now(),
        }
    }

    pub fn complete(stage: &str, message: impl Into<String>) -> Self {
        Self::Complete {
            stage: stage.to_string(),
            message: message.into(),
            timestamp: now(),
        }
    }

    pub fn error(stage: &str, message: impl Into<String>) -> Self {
        Self::Error {
            stage: stage.to_string(),
            message: message.into(),
            timestamp: now(),
        }
    }
}

/// Registry of connected observers, keyed by client id.
///
/// One unbounded channel per client: the websocket handler drains the
/// receiving end, the pipeline pushes on the sending end. Event volume per
/// question is small, and a slow reader must not be able to apply
/// backpressure to the orchestrator.
#[derive(Default)]
pub struct ProgressPublisher {
    clients: RwLock<HashMap<String, Registration>>,
    next_token: AtomicU64,
}

struct Registration {
    token: u64,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

/// One observer's registration: the receiving end of its channel plus a
/// token identifying exactly this registration. The token lets a handler
/// tear down without touching a reconnect that replaced it under the same
/// client id.
pub struct Subscription {
    client_id: String,
    token: u64,
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl Subscription {
    /// Next event, or `None` once a reconnect under the same client id has
    /// replaced this registration.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> std::result::Result<ProgressEvent, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. A reconnect under the same id replaces the
    /// previous registration, closing its channel.
    pub fn register(&self, client_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.clients
            .write()
            .insert(client_id.to_string(), Registration { token, tx });
        Subscription {
            client_id: client_id.to_string(),
            token,
            rx,
        }
    }

    /// Remove a registration, but only if it is still the current one for
    /// its client id. A stale handler tearing down after a reconnect leaves
    /// the replacement registered.
    pub fn unregister(&self, sub: &Subscription) {
        let mut clients = self.clients.write();
        if clients
            .get(&sub.client_id)
            .is_some_and(|r| r.token == sub.token)
        {
            clients.remove(&sub.client_id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Fire-and-forget delivery. A send failure means the receiver is gone;
    /// the registration is removed, unless a reconnect has already replaced
    /// it, and the event dropped.
    pub fn publish(&self, client_id: &str, event: ProgressEvent) {
        let (token, tx) = {
            let clients = self.clients.read();
            match clients.get(client_id) {
                Some(r) => (r.token, r.tx.clone()),
                None => return,
            }
        };
        if tx.send(event).is_err() {
            tracing::debug!(client_id, "Dropping events for disconnected client");
            let mut clients = self.clients.write();
            if clients.get(client_id).is_some_and(|r| r.token == token) {
                clients.remove(client_id);
            }
        }
    }

    /// Shorthand for the common `progress` event.
    pub fn send_progress(&self, client_id: &str, stage: &str, progress: u8, message: &str) {
        self.publish(client_id, ProgressEvent::progress(stage, progress, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_to_unknown_client_is_a_noop() {
        let publisher = ProgressPublisher::new();
        publisher.publish("nobody", ProgressEvent::progress("upload", 10, "hi"));
        assert_eq!(publisher.client_count(), 0);
    }

    #[tokio::test]
    async fn registered_client_receives_events_in_order() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.register("c1");
        publisher.send_progress("c1", "retrieval", 10, "first");
        publisher.send_progress("c1", "retrieval", 50, "second");

        match rx.recv().await.unwrap() {
            ProgressEvent::Progress { progress, .. } => assert_eq!(progress, 10),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            ProgressEvent::Progress { progress, .. } => assert_eq!(progress, 50),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn dead_receiver_is_deregistered_silently() {
        let publisher = ProgressPublisher::new();
        let rx = publisher.register("c1");
        drop(rx);
        publisher.send_progress("c1", "retrieval", 10, "into the void");
        assert_eq!(publisher.client_count(), 0);
        // A second publish after deregistration must also be harmless.
        publisher.send_progress("c1", "retrieval", 20, "still nothing");
    }

    #[tokio::test]
    async fn reconnect_under_same_id_replaces_the_channel() {
        let publisher = ProgressPublisher::new();
        let mut old = publisher.register("c1");
        let mut new = publisher.register("c1");

        publisher.send_progress("c1", "upload", 10, "to the replacement");
        assert!(old.recv().await.is_none());
        assert!(matches!(
            new.recv().await,
            Some(ProgressEvent::Progress { progress: 10, .. })
        ));
        assert_eq!(publisher.client_count(), 1);
    }

    #[tokio::test]
    async fn stale_teardown_does_not_unregister_a_reconnect() {
        let publisher = ProgressPublisher::new();
        let old = publisher.register("c1");
        let mut new = publisher.register("c1");

        // The replaced handler tears down after the reconnect.
        publisher.unregister(&old);
        assert_eq!(publisher.client_count(), 1);

        publisher.send_progress("c1", "qa", 50, "still flowing");
        assert!(matches!(
            new.recv().await,
            Some(ProgressEvent::Progress { progress: 50, .. })
        ));

        publisher.unregister(&new);
        assert_eq!(publisher.client_count(), 0);
    }

    #[test]
    fn progress_percent_is_clamped() {
        let event = ProgressEvent::progress("upload", 250, "overflow");
        match event {
            ProgressEvent::Progress { progress, .. } => assert_eq!(progress, 100),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ProgressEvent::qa_update(
            "decompose",
            serde_json::json!({"sub_questions_count": 2}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "qa_update");
        assert_eq!(value["stage"], "decompose");
        assert_eq!(value["sub_questions_count"], 2);
        assert!(value["timestamp"].is_string());
    }
}
