//! Data-tree change notification fan-out.
//!
//! One [`ChangeStream`] per notification source. All mutation of the
//! subscriber set goes through a single ordered command channel drained
//! by one worker task that owns the set exclusively, so registration,
//! deregistration and delivery cannot race and no concurrent-set type
//! is needed.
//!
//! A change event whose created/updated/removed sets are all empty
//! produces no command and no delivery.

mod xml;

pub use xml::{serialize_change_event, Operation, Store, NOTIFICATION_NS, REMOTE_NS};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Identifier handed out per subscription, used to deregister.
pub type SubscriberId = u64;

/// Namespace-qualified node name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    /// Namespace URI.
    pub namespace: String,
    /// Local node name.
    pub local_name: String,
}

/// One step of a data-tree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Node name.
    pub name: QualifiedName,
    /// List-entry key predicates, rendered as `[prefix:key='value']`.
    pub keys: Vec<(QualifiedName, String)>,
    /// Leaf-list value predicate, rendered as `[.='value']`.
    pub value: Option<String>,
}

impl PathSegment {
    /// A plain container/list step with no predicates.
    pub fn container(name: QualifiedName) -> Self {
        Self {
            name,
            keys: Vec::new(),
            value: None,
        }
    }
}

/// A data-tree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath(pub Vec<PathSegment>);

/// A changed node: its path plus optional inline data.
#[derive(Debug, Clone)]
pub struct ChangedNode {
    /// Where the change happened.
    pub path: DataPath,
    /// The node content, when the change carries any.
    pub data: Option<xmltree::Element>,
}

/// One data-tree change event across both datastores.
#[derive(Debug, Clone, Default)]
pub struct DataChangeEvent {
    /// Created nodes in the configuration store.
    pub created_config: Vec<ChangedNode>,
    /// Created nodes in the operational store.
    pub created_operational: Vec<ChangedNode>,
    /// Updated nodes in the configuration store.
    pub updated_config: Vec<ChangedNode>,
    /// Updated nodes in the operational store.
    pub updated_operational: Vec<ChangedNode>,
    /// Removed paths in the configuration store.
    pub removed_config: Vec<DataPath>,
    /// Removed paths in the operational store.
    pub removed_operational: Vec<DataPath>,
}

impl DataChangeEvent {
    /// Whether the event carries no change at all.
    pub fn is_empty(&self) -> bool {
        self.created_config.is_empty()
            && self.created_operational.is_empty()
            && self.updated_config.is_empty()
            && self.updated_operational.is_empty()
            && self.removed_config.is_empty()
            && self.removed_operational.is_empty()
    }
}

enum StreamCommand {
    Register {
        id: SubscriberId,
        channel: mpsc::Sender<String>,
    },
    Deregister {
        id: SubscriberId,
    },
    Notify(String),
}

/// Fan-out of serialized change notifications to subscribed channels.
pub struct ChangeStream {
    stream_name: String,
    commands: mpsc::Sender<StreamCommand>,
    worker: JoinHandle<()>,
    next_id: AtomicU64,
    subscriber_count: Arc<AtomicUsize>,
}

impl ChangeStream {
    /// Spawn the stream worker. `stream_name` is used only in logs.
    pub fn new(stream_name: impl Into<String>) -> Self {
        let stream_name = stream_name.into();
        let (commands, rx) = mpsc::channel(64);
        let subscriber_count = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(
            rx,
            stream_name.clone(),
            Arc::clone(&subscriber_count),
        ));
        Self {
            stream_name,
            commands,
            worker,
            next_id: AtomicU64::new(1),
            subscriber_count,
        }
    }

    /// Name of this notification stream.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Register a delivery channel; returns the id to deregister with.
    pub async fn subscribe(&self, channel: mpsc::Sender<String>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.commands.send(StreamCommand::Register { id, channel }).await;
        id
    }

    /// Remove a previously registered delivery channel.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.commands.send(StreamCommand::Deregister { id }).await;
    }

    /// Serialize and deliver a change event to all subscribers.
    ///
    /// An all-empty event is dropped before serialization: no command is
    /// queued and no channel sees a write.
    pub async fn on_data_changed(&self, event: &DataChangeEvent) -> Result<()> {
        if event.is_empty() {
            return Ok(());
        }
        let xml = serialize_change_event(event, Utc::now())?;
        let _ = self.commands.send(StreamCommand::Notify(xml)).await;
        Ok(())
    }

    /// Whether any subscriber is currently registered.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count.load(Ordering::Relaxed) > 0
    }

    /// Stop the worker and drop all subscriptions.
    pub async fn close(self) {
        drop(self.commands);
        let _ = self.worker.await;
        tracing::debug!(stream = %self.stream_name, "change stream closed");
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<StreamCommand>,
    stream_name: String,
    subscriber_count: Arc<AtomicUsize>,
) {
    let mut subscribers: Vec<(SubscriberId, mpsc::Sender<String>)> = Vec::new();

    while let Some(command) = rx.recv().await {
        match command {
            StreamCommand::Register { id, channel } => {
                if !subscribers.iter().any(|(existing, _)| *existing == id) {
                    subscribers.push((id, channel));
                }
                tracing::debug!(stream = %stream_name, subscriber = id, "subscriber registered");
            }
            StreamCommand::Deregister { id } => {
                subscribers.retain(|(existing, _)| *existing != id);
                tracing::debug!(stream = %stream_name, subscriber = id, "subscriber removed");
            }
            StreamCommand::Notify(xml) => {
                subscribers.retain(|(id, channel)| match channel.try_send(xml.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!(
                            stream = %stream_name,
                            subscriber = id,
                            "subscriber removed - channel is not active"
                        );
                        false
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            stream = %stream_name,
                            subscriber = id,
                            "subscriber channel full, notification dropped"
                        );
                        true
                    }
                });
            }
        }
        subscriber_count.store(subscribers.len(), Ordering::Relaxed);
    }
}
