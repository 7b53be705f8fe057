use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::parser::{parse_document, FeedDocument};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving and parsing a feed document.
///
/// These never cross the fetch task boundary: the worker captures them,
/// logs them, and resolves the task as failed with zero deliveries.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("http error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Document could not be parsed as RSS or Atom
    #[error("parse error: {0}")]
    Parse(String),
}

/// Retrieve and parse one feed document.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
) -> Result<FeedDocument, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_DOCUMENT_SIZE).await?;
    let outcome = parse_document(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    if outcome.skipped > 0 {
        tracing::warn!(
            url = %url,
            skipped = outcome.skipped,
            "entries without a valid link skipped"
        );
    }
    Ok(outcome.document)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

// ============================================================================
// Fetch Task
// ============================================================================

/// A single background fetch: retrieve, parse, deliver once.
///
/// State machine: Idle -> Running -> {Succeeded, Failed, Cancelled}.
/// Exactly one delivery occurs on success; failure and cancellation deliver
/// nothing. Cancellation never interrupts in-flight I/O — it is a flag the
/// worker checks before the send, so a result produced after cancellation
/// is discarded rather than delivered.
pub struct FetchTask {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl FetchTask {
    /// Spawn the worker for `url`. The document, if the fetch succeeds and
    /// the task is still wanted, arrives on `tx`; the channel closing with
    /// no delivery means the task failed or was cancelled.
    pub fn spawn(
        client: reqwest::Client,
        url: String,
        tx: mpsc::Sender<Arc<FeedDocument>>,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = tokio::spawn(async move {
            match fetch_document(&client, &url).await {
                Ok(document) => {
                    // Guarded delivery: the sole hand-off point back to the
                    // control thread
                    if flag.load(Ordering::SeqCst) {
                        tracing::debug!(url = %url, "fetch cancelled, result discarded");
                        return;
                    }
                    if tx.send(Arc::new(document)).await.is_err() {
                        tracing::debug!(url = %url, "fetch consumer gone, result discarded");
                    }
                }
                Err(e) => {
                    // Best-effort policy: failures are logged, never delivered
                    tracing::error!(url = %url, error = %e, "feed fetch failed");
                }
            }
        });

        Self { cancelled, handle }
    }

    /// Mark the eventual delivery as void. In-flight I/O keeps running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News</title>
    <item><title>First</title><link>https://example.com/1</link></item>
    <item><title>Second</title><link>https://example.com/2</link></item>
</channel></rss>"#;

    async fn serve(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn successful_fetch_delivers_exactly_once_in_order() {
        let server = serve(ResponseTemplate::new(200).set_body_string(FEED_XML)).await;

        let (tx, mut rx) = mpsc::channel(1);
        let _task = FetchTask::spawn(reqwest::Client::new(), format!("{}/feed", server.uri()), tx);

        let document = rx.recv().await.expect("one delivery");
        let titles: Vec<&str> = document.items.iter().map(|i| i.title.as_ref()).collect();
        assert_eq!(titles, vec!["First", "Second"]);

        // Sender dropped after the single delivery
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn malformed_document_delivers_nothing() {
        let server = serve(ResponseTemplate::new(200).set_body_string("<not valid xml")).await;

        let (tx, mut rx) = mpsc::channel(1);
        let _task = FetchTask::spawn(reqwest::Client::new(), format!("{}/feed", server.uri()), tx);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn http_error_delivers_nothing() {
        let server = serve(ResponseTemplate::new(404)).await;

        let (tx, mut rx) = mpsc::channel(1);
        let _task = FetchTask::spawn(reqwest::Client::new(), format!("{}/feed", server.uri()), tx);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_task_discards_a_successful_result() {
        let server = serve(
            ResponseTemplate::new(200)
                .set_body_string(FEED_XML)
                .set_delay(Duration::from_millis(200)),
        )
        .await;

        let (tx, mut rx) = mpsc::channel(1);
        let task = FetchTask::spawn(reqwest::Client::new(), format!("{}/feed", server.uri()), tx);
        task.cancel();

        // The underlying fetch still succeeds; delivery is suppressed
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn fetch_document_reports_http_status() {
        let server = serve(ResponseTemplate::new(500)).await;
        let err = fetch_document(&reqwest::Client::new(), &format!("{}/feed", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(500)));
    }
}
