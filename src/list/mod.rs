//! Retained list session.
//!
//! [`ListSession`] owns the loaded feed and the in-flight fetch task
//! independently of any display surface: a surface attaches (registers a
//! listener, takes an adapter), detaches, and reattaches freely, and an
//! already-loaded feed re-renders without a re-fetch. Dropping the session
//! cancels any outstanding fetch, so a late result is discarded unseen.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::feed::{FeedDocument, FeedItem, FetchTask};

/// Selection callback boundary, invoked on the control thread.
pub trait ItemListener: Send {
    fn on_item_selected(&self, item: &FeedItem);
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// A previous fetch is still unresolved; the new request is refused,
    /// not queued
    #[error("a fetch is already in progress")]
    AlreadyLoading,
}

pub struct ListSession {
    client: reqwest::Client,
    feed: Option<Arc<FeedDocument>>,
    task: Option<FetchTask>,
    delivery: Option<mpsc::Receiver<Arc<FeedDocument>>>,
    listener: Option<Box<dyn ItemListener>>,
}

impl ListSession {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            feed: None,
            task: None,
            delivery: None,
            listener: None,
        }
    }

    /// Start fetching `url`.
    ///
    /// At most one fetch may be unresolved per session; a second `load`
    /// while one is pending is refused with [`LoadError::AlreadyLoading`].
    pub fn load(&mut self, url: &str) -> Result<(), LoadError> {
        if self.delivery.is_some() {
            return Err(LoadError::AlreadyLoading);
        }

        let (tx, rx) = mpsc::channel(1);
        self.task = Some(FetchTask::spawn(self.client.clone(), url.to_string(), tx));
        self.delivery = Some(rx);
        tracing::debug!(url = %url, "feed load started");
        Ok(())
    }

    /// Whether a fetch has been issued and not yet resolved.
    pub fn is_loading(&self) -> bool {
        self.delivery.is_some()
    }

    /// Await the outcome of the in-flight fetch.
    ///
    /// This is the only point where a worker result crosses into session
    /// state. Returns `true` when a feed was delivered and stored; `false`
    /// when the task resolved without a delivery (failure or cancellation)
    /// or no fetch was in flight.
    pub async fn next_feed(&mut self) -> bool {
        let Some(rx) = self.delivery.as_mut() else {
            return false;
        };

        let delivered = match rx.recv().await {
            Some(document) => {
                self.feed = Some(document);
                true
            }
            None => false,
        };
        self.delivery = None;
        self.task = None;
        delivered
    }

    /// The loaded feed, if any.
    pub fn feed(&self) -> Option<&Arc<FeedDocument>> {
        self.feed.as_ref()
    }

    /// Adapter over the loaded feed for a display surface.
    pub fn adapter(&self) -> Option<FeedAdapter> {
        self.feed.as_ref().map(|feed| FeedAdapter {
            feed: Arc::clone(feed),
        })
    }

    /// Attach a selection listener (surface attach).
    pub fn set_listener(&mut self, listener: Box<dyn ItemListener>) {
        self.listener = Some(listener);
    }

    /// Detach the selection listener (surface detach). The feed and any
    /// in-flight task stay put.
    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Forward the item at `position` to the registered listener.
    ///
    /// No-op without a listener or when `position` is out of bounds.
    pub fn on_select(&self, position: usize) {
        let (Some(listener), Some(feed)) = (self.listener.as_deref(), self.feed.as_deref()) else {
            return;
        };
        if let Some(item) = feed.items.get(position) {
            listener.on_item_selected(item);
        }
    }
}

impl Drop for ListSession {
    fn drop(&mut self) {
        // The receiver drops with the session, so a send racing this flag
        // lands in a closed channel
        if let Some(task) = &self.task {
            task.cancel();
        }
    }
}

/// Displayable view over a loaded feed.
///
/// Positions are stable identities: feed order is fixed once loaded, and
/// the adapter holds the same `Arc` as the session, so lookups stay
/// consistent under re-render for as long as the feed reference is
/// unchanged.
pub struct FeedAdapter {
    feed: Arc<FeedDocument>,
}

impl FeedAdapter {
    pub fn len(&self) -> usize {
        self.feed.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feed.items.is_empty()
    }

    pub fn item(&self, position: usize) -> Option<&FeedItem> {
        self.feed.items.get(position)
    }

    /// Stable per-position identity.
    pub fn item_id(&self, position: usize) -> u64 {
        position as u64
    }

    /// The underlying document reference; two adapters over the same load
    /// compare equal by `Arc::ptr_eq`.
    pub fn document(&self) -> &Arc<FeedDocument> {
        &self.feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title>
    <item><title>First</title><link>https://example.com/1</link></item>
    <item><title>Second</title><link>https://example.com/2</link></item>
</channel></rss>"#;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ItemListener for Recorder {
        fn on_item_selected(&self, item: &FeedItem) {
            self.0
                .lock()
                .unwrap()
                .push(item.title.as_ref().to_string());
        }
    }

    async fn serve(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn load_is_refused_while_a_fetch_is_pending() {
        let server = serve(
            ResponseTemplate::new(200)
                .set_body_string(FEED_XML)
                .set_delay(Duration::from_millis(200)),
        )
        .await;
        let url = format!("{}/feed", server.uri());

        let mut session = ListSession::new(reqwest::Client::new());
        session.load(&url).unwrap();
        assert!(session.is_loading());
        assert!(matches!(session.load(&url), Err(LoadError::AlreadyLoading)));
    }

    #[tokio::test]
    async fn loaded_feed_survives_surface_reattach_without_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED_XML))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = ListSession::new(reqwest::Client::new());
        session.load(&format!("{}/feed", server.uri())).unwrap();
        assert!(session.next_feed().await);
        assert!(!session.is_loading());

        let first = session.adapter().expect("feed loaded");
        assert_eq!(first.len(), 2);

        // Surface detach/reattach: same document, no second request
        session.clear_listener();
        drop(first);
        let second = session.adapter().expect("feed retained");
        assert!(Arc::ptr_eq(
            second.document(),
            session.feed().expect("feed retained")
        ));
        assert_eq!(second.item(0).map(|i| i.title.as_ref()), Some("First"));
    }

    #[tokio::test]
    async fn failed_fetch_resolves_with_no_feed_and_allows_retry() {
        let server = serve(ResponseTemplate::new(200).set_body_string("<not valid xml")).await;
        let url = format!("{}/feed", server.uri());

        let mut session = ListSession::new(reqwest::Client::new());
        session.load(&url).unwrap();
        assert!(!session.next_feed().await);
        assert!(session.feed().is_none());

        // The failed task resolved; a new load is accepted
        assert!(session.load(&url).is_ok());
    }

    #[tokio::test]
    async fn selection_forwards_in_bounds_items_only() {
        let server = serve(ResponseTemplate::new(200).set_body_string(FEED_XML)).await;

        let mut session = ListSession::new(reqwest::Client::new());
        session.load(&format!("{}/feed", server.uri())).unwrap();
        assert!(session.next_feed().await);

        // No listener registered: no-op
        session.on_select(0);

        let selections = Arc::new(Mutex::new(Vec::new()));
        session.set_listener(Box::new(Recorder(Arc::clone(&selections))));

        session.on_select(1);
        session.on_select(99);

        assert_eq!(*selections.lock().unwrap(), vec!["Second".to_string()]);
    }

    #[tokio::test]
    async fn dropping_the_session_cancels_the_pending_fetch() {
        let server = serve(
            ResponseTemplate::new(200)
                .set_body_string(FEED_XML)
                .set_delay(Duration::from_millis(100)),
        )
        .await;

        let mut session = ListSession::new(reqwest::Client::new());
        session.load(&format!("{}/feed", server.uri())).unwrap();
        drop(session);

        // Give the worker time to finish; the discarded delivery must not panic
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}
