//! URI-routed record access layer.
//!
//! [`RecordProvider`] classifies a [`ResourceUri`] as collection- or
//! item-scoped exactly once at the entry of each operation, validates
//! payloads before any store call, injects column defaults, and publishes a
//! change notification after every successful mutation. Notifications carry
//! no payload beyond the identifier; observers re-query instead of inferring
//! what changed.

use thiserror::Error;

mod records;
mod uri;

pub use records::{constants, RecordCursor, RecordProvider};
pub use uri::{ResourceUri, UriMatch, UriTable};

pub use crate::storage::{Record, Scalar};

/// Errors surfaced by the record access layer.
///
/// Validation problems (`InvalidArgument`, `NotFound`) are detected before
/// any store call is issued, so a failed mutation never leaves partial
/// state. Store-level faults propagate as `ReadFailure`/`WriteFailure` and
/// are never retried.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Bad or missing field, or a malformed resource URI
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Well-formed URI that matches no registered resource
    #[error("no such resource: {0}")]
    NotFound(String),

    /// Store-level fault during a read
    #[error("read failed: {0}")]
    ReadFailure(#[source] sqlx::Error),

    /// Store-level fault during a write
    #[error("write failed: {0}")]
    WriteFailure(#[source] sqlx::Error),
}
