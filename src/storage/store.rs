use sqlx::sqlite::SqliteArguments;
use sqlx::query::Query;
use sqlx::Sqlite;

use super::schema::Database;
use super::types::{decode_row, Record, Scalar};

// ============================================================================
// Store Primitives
// ============================================================================

/// Arguments for a table-level select.
///
/// `columns: None` selects everything; `predicate` is a raw `WHERE` body with
/// `?` placeholders bound from `args` in order. Identifier validation (column
/// and sort names) is the caller's responsibility; only values are bound.
pub struct SelectQuery<'a> {
    pub table: &'a str,
    pub columns: Option<&'a [String]>,
    pub predicate: Option<&'a str>,
    pub args: &'a [Scalar],
    pub order_by: &'a str,
}

impl Database {
    /// Select rows matching the query, decoded into [`Record`]s.
    pub async fn select(&self, q: SelectQuery<'_>) -> Result<Vec<Record>, sqlx::Error> {
        let projection = match q.columns {
            Some(columns) => columns.join(", "),
            None => "*".to_string(),
        };
        let mut sql = format!("SELECT {} FROM {}", projection, q.table);
        if let Some(predicate) = q.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(q.order_by);

        let mut query = sqlx::query(&sql);
        for arg in q.args {
            query = bind_scalar(query, arg);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    /// Insert one row and return the store-assigned integer key.
    pub async fn insert_row(&self, table: &str, values: &Record) -> Result<i64, sqlx::Error> {
        let columns: Vec<&str> = values.columns().map(|(name, _)| name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in values.columns() {
            query = bind_scalar(query, value);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.last_insert_rowid())
    }

    /// Update rows matching the predicate; returns the affected-row count.
    pub async fn update_rows(
        &self,
        table: &str,
        values: &Record,
        predicate: Option<&str>,
        args: &[Scalar],
    ) -> Result<u64, sqlx::Error> {
        let assignments = values
            .columns()
            .map(|(name, _)| format!("{} = ?", name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {}", table, assignments);
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }

        let mut query = sqlx::query(&sql);
        for (_, value) in values.columns() {
            query = bind_scalar(query, value);
        }
        for arg in args {
            query = bind_scalar(query, arg);
        }

        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    /// Delete rows matching the predicate; returns the removed-row count.
    pub async fn delete_rows(
        &self,
        table: &str,
        predicate: Option<&str>,
        args: &[Scalar],
    ) -> Result<u64, sqlx::Error> {
        let mut sql = format!("DELETE FROM {}", table);
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }

        let mut query = sqlx::query(&sql);
        for arg in args {
            query = bind_scalar(query, arg);
        }

        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

fn bind_scalar<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Scalar,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Scalar::Text(s) => query.bind(s.clone()),
        Scalar::Integer(i) => query.bind(*i),
        Scalar::Real(f) => query.bind(*f),
        Scalar::Null => query.bind(Option::<String>::None),
    }
}
