//! SQLite-backed record store.
//!
//! The relational engine itself is an external collaborator: this module owns
//! the connection pool, the idempotent schema migration, and the four
//! table-level CRUD primitives with `WHERE` predicates and bound arguments.
//! Everything above it (routing, validation, notifications) lives in
//! `provider`.

mod schema;
mod store;
mod types;

pub use schema::Database;
pub use store::SelectQuery;
pub use types::{Record, Scalar, StoreError};
