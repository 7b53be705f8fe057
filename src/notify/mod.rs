//! Change notification bus.
//!
//! Publish/subscribe keyed by resource URI with no payload: a notification
//! means "re-check state associated with this identifier", never "this is
//! what changed". Publishing for an item URI also wakes subscribers of its
//! parent collection, so collection cursors observe item-level mutations.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::provider::ResourceUri;

/// Pending notifications retained per topic before slow subscribers lag.
/// Observers re-query on wake, so a lagged receiver loses nothing.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
pub struct ChangeBus {
    topics: Mutex<HashMap<String, broadcast::Sender<()>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to change notifications for `uri`.
    pub fn subscribe(&self, uri: &ResourceUri) -> broadcast::Receiver<()> {
        let mut topics = lock_topics(&self.topics);
        topics
            .entry(uri.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish a change notification for `uri`.
    ///
    /// Topics without live subscribers are skipped silently.
    pub fn publish(&self, uri: &ResourceUri) {
        let topics = lock_topics(&self.topics);
        notify_topic(&topics, &uri.to_string());
        if let Some(parent) = uri.parent() {
            notify_topic(&topics, &parent.to_string());
        }
        tracing::debug!(uri = %uri, "change published");
    }
}

fn lock_topics(
    topics: &Mutex<HashMap<String, broadcast::Sender<()>>>,
) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<()>>> {
    // The map is never left mid-mutation, so a poisoned lock is still usable
    topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn notify_topic(topics: &HashMap<String, broadcast::Sender<()>>, key: &str) {
    if let Some(sender) = topics.get(key) {
        let _ = sender.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn collection() -> ResourceUri {
        ResourceUri::new("tally", "constants")
    }

    #[test]
    fn publish_reaches_exact_subscriber_once() {
        let bus = ChangeBus::new();
        let uri = collection().item(7);
        let mut rx = bus.subscribe(&uri);

        bus.publish(&uri);

        assert!(rx.try_recv().is_ok());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn item_publish_wakes_collection_subscriber() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe(&collection());

        bus.publish(&collection().item(3));

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn collection_publish_does_not_wake_item_subscriber() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe(&collection().item(3));

        bus.publish(&collection());

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = ChangeBus::new();
        bus.publish(&collection());
    }
}
