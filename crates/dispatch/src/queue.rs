use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::message::Notification;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery channel rejected the message: {0}")]
    Rejected(String),
    #[error("delivery channel unreachable: {0}")]
    Unreachable(String),
}

/// The wire that actually reaches users (chat, email, ...). Injected so the
/// queue logic stays transport-agnostic.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Transport for environments with no delivery wiring configured.
#[derive(Default)]
pub struct NoopDeliveryTransport;

#[async_trait]
impl DeliveryTransport for NoopDeliveryTransport {
    async fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Fire-and-forget handoff out of the decision path. Implementations must
/// not block and must not surface delivery failures to the caller.
pub trait NotificationDispatcher: Send + Sync {
    fn enqueue(&self, notification: Notification);
}

/// Dispatcher used when notifications are disabled by configuration.
#[derive(Default)]
pub struct NoopDispatcher;

impl NotificationDispatcher for NoopDispatcher {
    fn enqueue(&self, _notification: Notification) {}
}

/// Unbounded queue drained by a background worker. Failures are logged and
/// dropped; an applied transition is never undone by its notification.
pub struct QueueDispatcher {
    sender: mpsc::UnboundedSender<Notification>,
}

impl QueueDispatcher {
    pub fn start<T>(transport: T) -> (Self, JoinHandle<()>)
    where
        T: DeliveryTransport + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Notification>();
        let worker = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                match transport.deliver(&notification).await {
                    Ok(()) => {
                        debug!(
                            recipients = notification.recipients.len(),
                            "notification delivered"
                        );
                    }
                    Err(error) => {
                        warn!(%error, text = %notification.text, "notification delivery failed");
                    }
                }
            }
        });

        (Self { sender }, worker)
    }
}

impl NotificationDispatcher for QueueDispatcher {
    fn enqueue(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            warn!("notification queue is closed; message dropped");
        }
    }
}

/// Test fake that records everything enqueued.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingDispatcher {
    pub fn notifications(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(notifications) => notifications.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn enqueue(&self, notification: Notification) {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::message::{Notification, RecipientSelector};

    use super::{
        DeliveryError, DeliveryTransport, NotificationDispatcher, QueueDispatcher,
        RecordingDispatcher,
    };

    fn notification(text: &str) -> Notification {
        Notification {
            recipients: vec![RecipientSelector::Roles(vec![
                fieldops_core::identity::Role::Administrator,
            ])],
            text: text.to_string(),
        }
    }

    struct CountingTransport {
        delivered: Arc<AtomicUsize>,
        done: Arc<Notify>,
        fail: bool,
    }

    #[async_trait]
    impl DeliveryTransport for CountingTransport {
        async fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            self.done.notify_one();
            if self.fail {
                return Err(DeliveryError::Unreachable("simulated outage".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn queued_notifications_reach_the_transport() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        let (dispatcher, worker) = QueueDispatcher::start(CountingTransport {
            delivered: delivered.clone(),
            done: done.clone(),
            fail: false,
        });

        dispatcher.enqueue(notification("request created"));
        done.notified().await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        drop(dispatcher);
        worker.await.expect("worker exits once the queue closes");
    }

    #[tokio::test]
    async fn delivery_failure_never_escalates_to_the_caller() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        let (dispatcher, worker) = QueueDispatcher::start(CountingTransport {
            delivered: delivered.clone(),
            done: done.clone(),
            fail: true,
        });

        // enqueue has no Result; a failing transport is invisible here.
        dispatcher.enqueue(notification("will fail"));
        done.notified().await;
        dispatcher.enqueue(notification("queue keeps accepting"));
        done.notified().await;

        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        drop(dispatcher);
        worker.await.expect("worker survives delivery failures");
    }

    #[tokio::test]
    async fn recording_dispatcher_captures_in_order() {
        let dispatcher = RecordingDispatcher::default();
        dispatcher.enqueue(notification("first"));
        dispatcher.enqueue(notification("second"));

        let seen = dispatcher.notifications();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].text, "first");
        assert_eq!(seen[1].text, "second");
    }
}
