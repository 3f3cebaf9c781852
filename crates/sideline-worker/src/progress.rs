//! Best-effort progress fan-out.
//!
//! A registry of live subscribers keyed by subscriber id. Events carry the
//! id of the job that produced them. Sending never blocks and never fails:
//! a missing subscriber is a no-op, a full buffer drops the message, and a
//! closed receiver is unregistered.

use std::collections::HashMap;
use std::sync::Arc;

use sideline_models::{JobId, ProgressEvent, ProgressMessage, Stage, SubscriberId};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::metrics;

/// Per-subscriber buffer. A job emits at most six messages.
pub const SUBSCRIBER_BUFFER_SIZE: usize = 32;

/// Shared subscriber registry. Cheap to clone; clones share the registry.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    subscribers: Arc<RwLock<HashMap<SubscriberId, mpsc::Sender<ProgressEvent>>>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` under `subscriber`, replacing any previous sink.
    pub async fn subscribe(&self, subscriber: SubscriberId, sink: mpsc::Sender<ProgressEvent>) {
        debug!(subscriber = %subscriber, "Progress subscriber registered");
        self.subscribers.write().await.insert(subscriber, sink);
    }

    /// Register a fresh bounded channel and return its receiving end.
    pub async fn subscribe_channel(&self, subscriber: SubscriberId) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER_SIZE);
        self.subscribe(subscriber, tx).await;
        rx
    }

    pub async fn unsubscribe(&self, subscriber: &SubscriberId) -> bool {
        self.subscribers.write().await.remove(subscriber).is_some()
    }

    pub async fn is_subscribed(&self, subscriber: &SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(subscriber)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Report that `job_id` completed `stage`.
    pub async fn notify(
        &self,
        subscriber: &SubscriberId,
        job_id: &JobId,
        stage: Stage,
        message: impl Into<String>,
    ) {
        self.deliver(subscriber, job_id, ProgressMessage::stage(stage, message))
            .await;
    }

    /// Send the terminal success message and drop the subscriber.
    pub async fn finish(&self, subscriber: &SubscriberId, job_id: &JobId, output: impl Into<String>) {
        self.deliver(subscriber, job_id, ProgressMessage::done(output))
            .await;
        self.unsubscribe(subscriber).await;
    }

    /// Send the terminal failure message and drop the subscriber.
    pub async fn fail(
        &self,
        subscriber: &SubscriberId,
        job_id: &JobId,
        stage: Option<Stage>,
        message: impl Into<String>,
    ) {
        self.deliver(subscriber, job_id, ProgressMessage::failed(stage, message))
            .await;
        self.unsubscribe(subscriber).await;
    }

    async fn deliver(&self, subscriber: &SubscriberId, job_id: &JobId, message: ProgressMessage) {
        let sender = match self.subscribers.read().await.get(subscriber) {
            Some(sender) => sender.clone(),
            None => return,
        };

        let event = ProgressEvent::new(job_id.clone(), message);
        match sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(
                    subscriber = %subscriber,
                    job_id = %job_id,
                    "Progress subscriber is behind, dropping {} message",
                    event.message.type_name()
                );
                metrics::record_progress_dropped("full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(subscriber = %subscriber, job_id = %job_id, "Progress subscriber disconnected");
                metrics::record_progress_dropped("closed");
                self.remove_if_closed(subscriber).await;
            }
        }
    }

    /// Another task may have re-subscribed in between; only drop a dead sink.
    async fn remove_if_closed(&self, subscriber: &SubscriberId) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.get(subscriber).is_some_and(|s| s.is_closed()) {
            subscribers.remove(subscriber);
        }
    }
}
