//! Remote feed retrieval and parsing.
//!
//! [`fetch_document`] retrieves and parses one document; [`FetchTask`] runs
//! it on a worker and delivers the parsed result through a single-consumer
//! channel, with cancellation realized as a guarded check before delivery.
//! Failures stay inside the task boundary: they are logged, never delivered.

mod fetcher;
mod parser;

pub use fetcher::{fetch_document, FetchError, FetchTask};
pub use parser::{parse_document, FeedDocument, FeedItem, ParseOutcome};
