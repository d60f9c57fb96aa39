use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TrySendError};
use yamb_lib::event::Event;

/// Events waiting in a subscriber's inbox before new ones are dropped.
pub const INBOX_CAPACITY: usize = 5;

pub type SubscriptionId = u64;

/// Fans room events out to every subscriber without ever waiting on them.
///
/// Each subscriber gets a small bounded inbox. When an inbox is full the event is dropped
/// for that subscriber only. Since events only say that something changed, a subscriber
/// that missed one catches up by re-reading the room on the next event it does get.
#[derive(Clone, Debug, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<Subscribers>>,
}

#[derive(Debug, Default)]
struct Subscribers {
    next_id: SubscriptionId,
    inboxes: HashMap<SubscriptionId, mpsc::Sender<Event>>,
}

impl Broadcaster {
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let mut subscribers = self.subscribers();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.inboxes.insert(id, tx);
        tracing::debug!(subscription = id, "Subscribed to room events");

        Subscription {
            id,
            inbox: rx,
            broadcaster: self.clone(),
        }
    }

    /// Removes a subscriber. Dropping its sender closes the inbox in the same step, so
    /// nothing can be delivered to it afterwards.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers().inboxes.remove(&id).is_some() {
            tracing::debug!(subscription = id, "Unsubscribed from room events");
        }
    }

    pub fn publish(&self, event: Event) {
        for (id, inbox) in &self.subscribers().inboxes {
            match inbox.try_send(event) {
                Ok(()) => (),
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(subscription = id, %event, "Inbox full, dropping event");
                }
                // The receiving half is only dropped together with its registration
                Err(TrySendError::Closed(_)) => (),
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().inboxes.len()
    }

    fn subscribers(&self) -> MutexGuard<Subscribers> {
        // The lock is never held across anything that can panic.
        self.inner.lock().unwrap()
    }
}

/// A subscriber's inbox. Unsubscribes when dropped, which is what happens when the task
/// waiting on it is cancelled.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    inbox: mpsc::Receiver<Event>,
    broadcaster: Broadcaster,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.inbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.inbox.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
