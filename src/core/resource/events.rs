use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::model::Resource;

/// Change notification sent to the state/UI layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "resource", rename_all = "camelCase")]
pub enum ResourceEvent {
    /// A resource was added, or a record superseded (rename, refresh, merge).
    ResourceAdded(Arc<Resource>),
    ResourceRemoved(Arc<Resource>),
}

impl ResourceEvent {
    pub fn resource(&self) -> &Arc<Resource> {
        match self {
            ResourceEvent::ResourceAdded(r) | ResourceEvent::ResourceRemoved(r) => r,
        }
    }
}

/// Receives every committed change to the resource index.
#[async_trait]
pub trait ResourceEventSink: Send + Sync {
    async fn notify(&self, event: ResourceEvent);
}

/// Sink that drops every event.
pub struct NoopSink;

#[async_trait]
impl ResourceEventSink for NoopSink {
    async fn notify(&self, event: ResourceEvent) {
        trace!("Dropping event for {}", event.resource().hash);
    }
}

/// Forwards events into a Tokio channel.
pub struct ChannelSink {
    sender: mpsc::Sender<ResourceEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<ResourceEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end, with room for `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResourceEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl ResourceEventSink for ChannelSink {
    async fn notify(&self, event: ResourceEvent) {
        if self.sender.send(event).await.is_err() {
            debug!("Resource event receiver dropped");
        }
    }
}

// ── Progress ────────────────────────────────────────────

/// Coarse phases of a single import.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImportPhase {
    Start,
    Hashed,
    Resolved,
    Persisted,
}

impl ImportPhase {
    pub const COUNT: u64 = 4;

    /// 1-based position, for `current / total` style reporting.
    pub fn step(self) -> u64 {
        match self {
            ImportPhase::Start => 1,
            ImportPhase::Hashed => 2,
            ImportPhase::Resolved => 3,
            ImportPhase::Persisted => 4,
        }
    }
}

/// Optional progress callback for imports.
pub trait ProgressSink: Send + Sync {
    fn report(&self, phase: ImportPhase, current: u64, total: u64, label: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(ImportPhase, u64, u64, &str) + Send + Sync,
{
    fn report(&self, phase: ImportPhase, current: u64, total: u64, label: &str) {
        self(phase, current, total, label)
    }
}

pub(crate) fn report(progress: Option<&dyn ProgressSink>, phase: ImportPhase, label: &str) {
    if let Some(progress) = progress {
        progress.report(phase, phase.step(), ImportPhase::COUNT, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let resource = Arc::new(crate::core::resource::test_support::resource("h", "/p.jar", 1, &[]));
        sink.notify(ResourceEvent::ResourceAdded(resource.clone())).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event, ResourceEvent::ResourceAdded(resource));
    }

    #[tokio::test]
    async fn dropped_receiver_is_not_an_error() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        let resource = Arc::new(crate::core::resource::test_support::resource("h", "/p.jar", 1, &[]));
        sink.notify(ResourceEvent::ResourceRemoved(resource)).await;
    }

    #[test]
    fn closures_are_progress_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |phase: ImportPhase, current: u64, total: u64, _label: &str| {
            seen.lock().unwrap().push((phase, current, total));
        };
        report(Some(&sink), ImportPhase::Hashed, "a.jar");
        report(None, ImportPhase::Persisted, "a.jar");
        assert_eq!(*seen.lock().unwrap(), vec![(ImportPhase::Hashed, 2, 4)]);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let resource = Arc::new(crate::core::resource::test_support::resource("h", "/p.jar", 1, &[]));
        let json = serde_json::to_value(ResourceEvent::ResourceRemoved(resource)).unwrap();
        assert_eq!(json["kind"], "resourceRemoved");
        assert_eq!(json["resource"]["hash"], "h");
    }
}
