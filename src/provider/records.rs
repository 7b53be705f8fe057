use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::notify::ChangeBus;
use crate::storage::{Database, Record, Scalar, SelectQuery};

use super::uri::{ResourceUri, UriMatch, UriTable};
use super::ProviderError;

// ============================================================================
// Schema Constants
// ============================================================================

/// Column names, defaults, and type strings for the `constants` table.
pub mod constants {
    use super::ResourceUri;

    pub const AUTHORITY: &str = "tally";
    pub const COLLECTION: &str = "constants";
    pub const TABLE: &str = "constants";

    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const VALUE: &str = "value";

    pub const COLUMNS: [&str; 3] = [ID, TITLE, VALUE];
    pub const REQUIRED: [&str; 1] = [TITLE];
    pub const DEFAULT_SORT: &str = TITLE;

    /// MIME-like type strings for caller introspection.
    pub const DIR_TYPE: &str = "vnd.tally.cursor.dir/constant";
    pub const ITEM_TYPE: &str = "vnd.tally.cursor.item/constant";

    /// The collection-scoped content URI.
    pub fn content_uri() -> ResourceUri {
        ResourceUri::new(AUTHORITY, COLLECTION)
    }
}

// ============================================================================
// Record Provider
// ============================================================================

/// URI-routed CRUD access over the record store.
///
/// Owns an injected [`Database`] handle and a shared [`ChangeBus`]. Every
/// mutating operation publishes exactly one notification, synchronously
/// after the store call succeeds — including zero-affected-row updates and
/// deletes, so observers treat a notification as "re-check", not "something
/// changed".
pub struct RecordProvider {
    db: Database,
    bus: Arc<ChangeBus>,
    routes: UriTable,
}

impl RecordProvider {
    pub fn new(db: Database, bus: Arc<ChangeBus>) -> Self {
        let routes = UriTable::new(constants::AUTHORITY).register(constants::COLLECTION);
        Self { db, bus, routes }
    }

    /// MIME-like type string for a routed URI.
    pub fn record_type(&self, uri: &ResourceUri) -> Result<&'static str, ProviderError> {
        Ok(match self.routes.classify(uri)? {
            UriMatch::Collection => constants::DIR_TYPE,
            UriMatch::Item(_) => constants::ITEM_TYPE,
        })
    }

    /// Query records under `uri`.
    ///
    /// Item URIs conjoin an identity-equality clause ahead of the caller's
    /// filter. When `sort` is unspecified the declared default (`title`
    /// ascending) applies. The returned cursor stays subscribed to change
    /// notifications for `uri` and can be re-run in place.
    pub async fn query(
        &self,
        uri: &ResourceUri,
        projection: Option<&[&str]>,
        filter: Option<&str>,
        args: &[Scalar],
        sort: Option<&str>,
    ) -> Result<RecordCursor, ProviderError> {
        let scope = self.routes.classify(uri)?;
        let columns = validate_projection(projection)?;
        let order_by = validate_sort(sort)?;
        let (predicate, args) = scoped_predicate(scope, filter, args);

        let rows = self
            .run_select(columns.as_deref(), predicate.as_deref(), &args, &order_by)
            .await?;

        Ok(RecordCursor {
            rows,
            uri: uri.clone(),
            columns,
            predicate,
            args,
            order_by,
            changes: self.bus.subscribe(uri),
        })
    }

    /// Insert a record into the collection named by `uri`.
    ///
    /// Fails with `InvalidArgument` when `uri` names a single item or the
    /// payload is missing a required column, before any store call. Defaults
    /// are injected for optional columns not supplied. On success, returns
    /// the new item URI and publishes a creation notification for it.
    pub async fn insert(
        &self,
        uri: &ResourceUri,
        values: &Record,
    ) -> Result<ResourceUri, ProviderError> {
        match self.routes.classify(uri)? {
            UriMatch::Collection => {}
            UriMatch::Item(_) => {
                return Err(ProviderError::InvalidArgument(format!(
                    "cannot insert into item uri: {uri}"
                )))
            }
        }

        validate_payload(values)?;
        for column in constants::REQUIRED {
            if !values.contains(column) {
                return Err(ProviderError::InvalidArgument(format!(
                    "missing required column: {column}"
                )));
            }
        }

        let mut row = values.clone();
        apply_defaults(&mut row);

        let id = self
            .db
            .insert_row(constants::TABLE, &row)
            .await
            .map_err(ProviderError::WriteFailure)?;

        let created = uri.item(id);
        self.bus.publish(&created);
        tracing::debug!(uri = %created, "record inserted");
        Ok(created)
    }

    /// Update records under `uri`; returns the affected-row count.
    ///
    /// Item URIs conjoin the identity clause for that item regardless of the
    /// caller's filter. A notification for `uri` is published even when zero
    /// rows changed.
    pub async fn update(
        &self,
        uri: &ResourceUri,
        values: &Record,
        filter: Option<&str>,
        args: &[Scalar],
    ) -> Result<u64, ProviderError> {
        let scope = self.routes.classify(uri)?;
        if values.is_empty() {
            return Err(ProviderError::InvalidArgument(
                "no columns to update".to_string(),
            ));
        }
        validate_payload(values)?;

        let (predicate, args) = scoped_predicate(scope, filter, args);
        let count = self
            .db
            .update_rows(constants::TABLE, values, predicate.as_deref(), &args)
            .await
            .map_err(ProviderError::WriteFailure)?;

        self.bus.publish(uri);
        Ok(count)
    }

    /// Delete records under `uri`; returns the removed-row count.
    ///
    /// Same scope conjunction and unconditional-notification rules as
    /// [`update`](Self::update).
    pub async fn delete(
        &self,
        uri: &ResourceUri,
        filter: Option<&str>,
        args: &[Scalar],
    ) -> Result<u64, ProviderError> {
        let scope = self.routes.classify(uri)?;
        let (predicate, args) = scoped_predicate(scope, filter, args);

        let count = self
            .db
            .delete_rows(constants::TABLE, predicate.as_deref(), &args)
            .await
            .map_err(ProviderError::WriteFailure)?;

        self.bus.publish(uri);
        Ok(count)
    }

    async fn run_select(
        &self,
        columns: Option<&[String]>,
        predicate: Option<&str>,
        args: &[Scalar],
        order_by: &str,
    ) -> Result<Vec<Record>, ProviderError> {
        self.db
            .select(SelectQuery {
                table: constants::TABLE,
                columns,
                predicate,
                args,
                order_by,
            })
            .await
            .map_err(ProviderError::ReadFailure)
    }
}

// ============================================================================
// Record Cursor
// ============================================================================

/// A materialized query result.
///
/// Holds the rows as of the last run, the resolved query it came from, and a
/// live change subscription for the queried URI. Re-running the query on a
/// notification is the observer's job; the notification itself carries no
/// payload.
#[derive(Debug)]
pub struct RecordCursor {
    rows: Vec<Record>,
    uri: ResourceUri,
    columns: Option<Vec<String>>,
    predicate: Option<String>,
    args: Vec<Scalar>,
    order_by: String,
    changes: broadcast::Receiver<()>,
}

impl RecordCursor {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn uri(&self) -> &ResourceUri {
        &self.uri
    }

    /// Wait for the next change notification for this cursor's URI.
    ///
    /// Returns `false` only when the bus side has gone away. A lagged
    /// receiver still reports a change: the observer re-queries either way.
    pub async fn changed(&mut self) -> bool {
        match self.changes.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => true,
            Err(RecvError::Closed) => false,
        }
    }

    /// Non-blocking check for a pending change notification.
    pub fn has_pending_change(&mut self) -> bool {
        match self.changes.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
        }
    }

    /// Re-run the originating query in place, keeping the subscription.
    pub async fn requery(&mut self, provider: &RecordProvider) -> Result<(), ProviderError> {
        self.rows = provider
            .run_select(
                self.columns.as_deref(),
                self.predicate.as_deref(),
                &self.args,
                &self.order_by,
            )
            .await?;
        Ok(())
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Conjoin the scope-derived identity clause with the caller's filter.
///
/// Item scope always prepends `id = ?`; any id the caller smuggled into
/// their own filter is irrelevant because the conjunction can only narrow.
fn scoped_predicate(
    scope: UriMatch,
    filter: Option<&str>,
    args: &[Scalar],
) -> (Option<String>, Vec<Scalar>) {
    match scope {
        UriMatch::Collection => (filter.map(str::to_string), args.to_vec()),
        UriMatch::Item(id) => {
            let mut bound = Vec::with_capacity(args.len() + 1);
            bound.push(Scalar::Integer(id));
            bound.extend_from_slice(args);
            let predicate = match filter {
                Some(filter) => format!("{} = ? AND ({})", constants::ID, filter),
                None => format!("{} = ?", constants::ID),
            };
            (Some(predicate), bound)
        }
    }
}

/// Reject unknown columns, identity writes, and ill-typed known columns.
///
/// Column names are interpolated into SQL, so unknown names are refused
/// outright rather than quoted.
fn validate_payload(values: &Record) -> Result<(), ProviderError> {
    for (column, value) in values.columns() {
        match column {
            c if c == constants::ID => {
                return Err(ProviderError::InvalidArgument(
                    "identity column is store-assigned and immutable".to_string(),
                ))
            }
            c if c == constants::TITLE => match value {
                Scalar::Text(title) if !title.trim().is_empty() => {}
                _ => {
                    return Err(ProviderError::InvalidArgument(
                        "title must be non-empty text".to_string(),
                    ))
                }
            },
            c if c == constants::VALUE => {
                if value.as_real().is_none() {
                    return Err(ProviderError::InvalidArgument(
                        "value must be numeric".to_string(),
                    ));
                }
            }
            other => {
                return Err(ProviderError::InvalidArgument(format!(
                    "unknown column: {other}"
                )))
            }
        }
    }
    Ok(())
}

fn apply_defaults(values: &mut Record) {
    if !values.contains(constants::VALUE) {
        values.put(constants::VALUE, Scalar::Real(0.0));
    }
}

fn validate_projection(projection: Option<&[&str]>) -> Result<Option<Vec<String>>, ProviderError> {
    let Some(columns) = projection else {
        return Ok(None);
    };
    if columns.is_empty() {
        return Err(ProviderError::InvalidArgument(
            "empty projection".to_string(),
        ));
    }
    columns
        .iter()
        .map(|column| {
            if constants::COLUMNS.contains(column) {
                Ok((*column).to_string())
            } else {
                Err(ProviderError::InvalidArgument(format!(
                    "unknown projection column: {column}"
                )))
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn validate_sort(sort: Option<&str>) -> Result<String, ProviderError> {
    let Some(sort) = sort.filter(|s| !s.trim().is_empty()) else {
        return Ok(constants::DEFAULT_SORT.to_string());
    };

    let mut parts = sort.split_whitespace();
    let column = parts.next().unwrap_or_default();
    if !constants::COLUMNS.contains(&column) {
        return Err(ProviderError::InvalidArgument(format!(
            "unknown sort column: {column}"
        )));
    }

    match parts.next() {
        None => Ok(column.to_string()),
        Some(direction) => {
            let direction = direction.to_ascii_uppercase();
            if (direction == "ASC" || direction == "DESC") && parts.next().is_none() {
                Ok(format!("{column} {direction}"))
            } else {
                Err(ProviderError::InvalidArgument(format!(
                    "malformed sort order: {sort}"
                )))
            }
        }
    }
}
