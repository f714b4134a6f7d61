//! Transport node: a named, namespaced handle onto the [`EventBus`].
//!
//! Subscription callbacks run on the tokio runtime the node was created with,
//! never on the caller's thread.  A node becomes invalid after
//! [`TransportNode::shutdown`]; every later subscribe or publish fails with
//! [`DriveError::InvalidTransport`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use drivesim_types::{DriveError, Event, EventPayload, MessageKind};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::EventBus;

/// Identifier returned by [`TransportNode::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct TransportNode {
    name: String,
    namespace: String,
    bus: Arc<EventBus>,
    runtime: Handle,
    valid: AtomicBool,
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<(SubscriptionId, JoinHandle<()>)>>,
}

impl TransportNode {
    /// Create a node whose callbacks are spawned onto `runtime`.
    ///
    /// An empty `namespace` places relative topics at the root.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        bus: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        let namespace = namespace.into().trim_matches('/').to_string();
        Self {
            name: name.into(),
            namespace,
            bus,
            runtime,
            valid: AtomicBool::new(true),
            next_id: AtomicU64::new(0),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Resolve `topic` against the node namespace.
    ///
    /// `"cmd_vel"` in namespace `"rover"` → `"/rover/cmd_vel"`;
    /// `"/cmd_vel"` stays `"/cmd_vel"`.
    pub fn resolve_topic(&self, topic: &str) -> String {
        if topic.starts_with('/') {
            topic.to_string()
        } else if self.namespace.is_empty() {
            format!("/{topic}")
        } else {
            format!("/{}/{topic}", self.namespace)
        }
    }

    /// Register `callback` for every `kind` message published on `topic`.
    ///
    /// Payloads of any other kind on the same topic are dropped with a debug
    /// log.
    pub fn subscribe<F>(
        &self,
        topic: &str,
        kind: MessageKind,
        callback: F,
    ) -> Result<SubscriptionId, DriveError>
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.check(topic)?;
        let resolved = self.resolve_topic(topic);
        let mut subscriber = self.bus.subscribe_topic(resolved.clone());
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let task = self.runtime.spawn(async move {
            while let Some(event) = subscriber.recv().await {
                if event.payload.kind() == kind {
                    callback(event.payload);
                } else {
                    debug!(
                        topic = %subscriber.topic(),
                        expected = ?kind,
                        received = ?event.payload.kind(),
                        "Ignoring payload of unexpected type"
                    );
                }
            }
        });

        self.lock_subscriptions().push((id, task));
        debug!(node = %self.name, topic = %resolved, kind = ?kind, "Subscribed");
        Ok(id)
    }

    /// Drop one subscription.  Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock_subscriptions();
        match subs.iter().position(|(sid, _)| *sid == id) {
            Some(idx) => {
                let (_, task) = subs.swap_remove(idx);
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.lock_subscriptions().len()
    }

    /// Publish `payload` on `topic` (resolved against the namespace).
    pub fn publish(&self, topic: &str, payload: EventPayload) -> Result<usize, DriveError> {
        self.check(topic)?;
        let event = Event::new(self.resolve_topic(topic), self.name.clone(), payload);
        self.bus.publish(event)
    }

    /// Abort every subscription and invalidate the node.
    pub fn shutdown(&self) {
        self.valid.store(false, Ordering::Release);
        let tasks: Vec<_> = self.lock_subscriptions().drain(..).collect();
        for (_, task) in &tasks {
            task.abort();
        }
        info!(node = %self.name, aborted = tasks.len(), "Transport node shut down");
    }

    fn check(&self, topic: &str) -> Result<(), DriveError> {
        if topic.trim().is_empty() {
            return Err(DriveError::EmptyTopic);
        }
        if !self.is_valid() {
            return Err(DriveError::InvalidTransport {
                node: self.name.clone(),
            });
        }
        Ok(())
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<(SubscriptionId, JoinHandle<()>)>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for TransportNode {
    fn drop(&mut self) {
        for (_, task) in self.lock_subscriptions().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for TransportNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportNode")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivesim_types::{TwistMsg, Vec3};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn node(ns: &str) -> TransportNode {
        TransportNode::new("test-node", ns, Arc::new(EventBus::default()), Handle::current())
    }

    fn twist(x: f64) -> EventPayload {
        EventPayload::Twist(TwistMsg {
            linear: Vec3::new(x, 0.0, 0.0),
            angular: Vec3::zero(),
        })
    }

    #[tokio::test]
    async fn relative_topics_resolve_under_namespace() {
        let n = node("/rover/");
        assert_eq!(n.resolve_topic("cmd_vel"), "/rover/cmd_vel");
        assert_eq!(n.resolve_topic("/cmd_vel"), "/cmd_vel");
        assert_eq!(node("").resolve_topic("odom"), "/odom");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn callback_runs_on_worker_and_filters_kind() -> Result<(), Box<dyn std::error::Error>> {
        let n = node("rover");
        let (tx, mut rx) = mpsc::unbounded_channel();
        n.subscribe("cmd_vel", MessageKind::Twist, move |payload| {
            let _ = tx.send(payload);
        })?;

        // Wrong kind on the right topic is ignored.
        n.publish(
            "cmd_vel",
            EventPayload::JointState(drivesim_types::JointStateMsg::default()),
        )?;
        n.publish("cmd_vel", twist(2.0))?;

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await?
            .ok_or("channel closed")?;
        assert!(matches!(got, EventPayload::Twist(t) if t.linear.x == 2.0));
        Ok(())
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let n = node("rover");
        let result = n.subscribe("  ", MessageKind::Twist, |_| {});
        assert_eq!(result, Err(DriveError::EmptyTopic));
        assert_eq!(n.subscription_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_invalidates_node() {
        let n = node("rover");
        n.subscribe("cmd_vel", MessageKind::Twist, |_| {}).unwrap();
        n.shutdown();
        assert!(!n.is_valid());
        assert_eq!(n.subscription_count(), 0);
        assert!(matches!(
            n.subscribe("cmd_vel", MessageKind::Twist, |_| {}),
            Err(DriveError::InvalidTransport { .. })
        ));
        assert!(matches!(
            n.publish("cmd_vel", twist(0.0)),
            Err(DriveError::InvalidTransport { .. })
        ));
    }

    #[tokio::test]
    async fn empty_topic_reported_before_invalid_node() {
        let n = node("rover");
        n.shutdown();
        assert_eq!(
            n.subscribe("", MessageKind::Twist, |_| {}),
            Err(DriveError::EmptyTopic)
        );
        assert_eq!(n.publish(" ", twist(0.0)), Err(DriveError::EmptyTopic));
    }

    #[tokio::test]
    async fn unsubscribe_removes_once() {
        let n = node("rover");
        let id = n.subscribe("cmd_vel", MessageKind::Twist, |_| {}).unwrap();
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
    }
}
