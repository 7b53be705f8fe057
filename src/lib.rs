//! URI-routed record store over SQLite with an async feed list session.
//!
//! Two halves with real contracts:
//!
//! - [`provider`] routes opaque resource URIs to collection- or item-scoped
//!   CRUD over the [`storage`] layer, validating payloads fail-fast,
//!   injecting column defaults, and publishing zero-payload change
//!   notifications on the [`notify`] bus.
//! - [`feed`] fetches and parses a remote document on a worker task and
//!   delivers it exactly once (or not at all) to the [`list`] session, which
//!   retains the loaded feed across display-surface attach/detach cycles.

pub mod feed;
pub mod list;
pub mod notify;
pub mod provider;
pub mod storage;
