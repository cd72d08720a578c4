//! PostgreSQL record store
//!
//! Each table is `(id BIGINT PRIMARY KEY, doc JSONB)`. Reads use keyset
//! pagination on `id`; writes are a single `INSERT ... SELECT FROM UNNEST`
//! statement, so a batch either lands completely or not at all.

use super::client::PostgreSQLClient;
use crate::adapters::store::{InsertOutcome, RecordReader, RecordWriter, StoreResult};
use crate::domain::errors::StoreError;
use crate::domain::ids::RecordId;
use crate::domain::record::{Record, RecordFilter};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;

/// Filter predicate shared by page and count queries.
/// `$1` category, `$2` minimum value, `$3` unprocessed only.
const FILTER_PREDICATE: &str = "($1::text IS NULL OR doc->>'category' = $1) \
     AND ($2::float8 IS NULL OR (doc->>'value')::float8 >= $2) \
     AND (NOT $3::bool OR NOT COALESCE((doc->>'processed')::boolean, false))";

/// Keyset page query; `$4` is the last id seen, `$5` the page size
fn page_query(table: &str) -> String {
    format!("SELECT doc FROM {table} WHERE id > $4 AND {FILTER_PREDICATE} ORDER BY id LIMIT $5")
}

fn count_query(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE {FILTER_PREDICATE}")
}

/// Bound values for `$1`..`$3` of [`FILTER_PREDICATE`]
#[derive(Debug, PartialEq)]
struct FilterParams {
    category: Option<String>,
    min_value: Option<f64>,
    unprocessed_only: bool,
}

impl FilterParams {
    fn new(filter: &RecordFilter) -> Self {
        Self {
            category: filter.category.map(|c| c.as_str().to_string()),
            min_value: filter.min_value,
            unprocessed_only: filter.unprocessed_only,
        }
    }

    fn as_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.category as &(dyn ToSql + Sync),
            &self.min_value,
            &self.unprocessed_only,
        ]
    }
}

/// A record table in PostgreSQL
#[derive(Clone)]
pub struct PostgresRecordStore {
    client: Arc<PostgreSQLClient>,
    table: String,
}

impl PostgresRecordStore {
    /// Bind a store to `table`
    ///
    /// The name must already have passed configuration validation; it is
    /// interpolated into SQL.
    pub fn new(client: Arc<PostgreSQLClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Create the table if it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn ensure_table(&self) -> StoreResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                 id BIGINT PRIMARY KEY, \
                 doc JSONB NOT NULL, \
                 inserted_at TIMESTAMPTZ NOT NULL DEFAULT now()\
             )",
            table = self.table
        );
        self.client.batch_execute(&ddl).await?;
        tracing::debug!(table = %self.table, "Ensured record table exists");
        Ok(())
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }
}

fn to_db_id(id: RecordId) -> StoreResult<i64> {
    i64::try_from(id.get())
        .map_err(|_| StoreError::Write(format!("record id {id} exceeds BIGINT range")))
}

fn decode_row(doc: Value) -> StoreResult<Record> {
    serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl RecordReader for PostgresRecordStore {
    async fn fetch_page(
        &self,
        filter: &RecordFilter,
        after: Option<RecordId>,
        page_size: usize,
    ) -> StoreResult<Vec<Record>> {
        let filter = FilterParams::new(filter);
        let after = match after {
            Some(id) => to_db_id(id)?,
            None => 0,
        };
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);

        let mut params = filter.as_params();
        params.push(&after);
        params.push(&limit);

        let rows = self.client.query(&page_query(&self.table), &params).await?;

        rows.into_iter()
            .map(|row| {
                let doc: Value = row
                    .try_get(0)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                decode_row(doc)
            })
            .collect()
    }

    async fn count(&self, filter: &RecordFilter) -> StoreResult<u64> {
        let filter = FilterParams::new(filter);
        let rows = self
            .client
            .query(&count_query(&self.table), &filter.as_params())
            .await?;

        let count: i64 = rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()
            .map_err(|e| StoreError::Query(e.to_string()))?
            .unwrap_or(0);

        Ok(count.max(0) as u64)
    }

    fn describe(&self) -> String {
        format!(
            "postgresql:{} ({})",
            self.table,
            self.client.connection_string_safe()
        )
    }
}

#[async_trait]
impl RecordWriter for PostgresRecordStore {
    async fn insert_many(&self, records: &[Record]) -> StoreResult<InsertOutcome> {
        if records.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let ids = records
            .iter()
            .map(|r| to_db_id(r.id))
            .collect::<StoreResult<Vec<i64>>>()?;
        let docs = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let statement = format!(
            "INSERT INTO {table} (id, doc) SELECT * FROM UNNEST($1::bigint[], $2::jsonb[])",
            table = self.table
        );

        let client = self.client.connection().await?;
        match client.execute(statement.as_str(), &[&ids, &docs]).await {
            Ok(inserted) => Ok(InsertOutcome::new(inserted)),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(StoreError::DuplicateKey {
                    message: e.to_string(),
                    // The statement is atomic; nothing from this batch was kept
                    inserted_before_conflict: Some(0),
                })
            }
            Err(e) => Err(StoreError::Write(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        RecordReader::describe(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Category;
    use regex::Regex;
    use std::collections::BTreeSet;

    fn placeholders(sql: &str) -> BTreeSet<usize> {
        Regex::new(r"\$(\d+)")
            .unwrap()
            .captures_iter(sql)
            .map(|c| c[1].parse().unwrap())
            .collect()
    }

    #[test]
    fn test_page_query_binds_filter_then_cursor() {
        let sql = page_query("records");
        assert!(sql.starts_with("SELECT doc FROM records WHERE id > $4 AND "));
        assert!(sql.ends_with(" ORDER BY id LIMIT $5"));
        assert_eq!(placeholders(&sql), (1..=5).collect::<BTreeSet<_>>());

        // Filter values fill $1..$3; fetch_page appends the cursor and limit
        let params = FilterParams::new(&RecordFilter::default());
        assert_eq!(params.as_params().len() + 2, placeholders(&sql).len());
    }

    #[test]
    fn test_count_query_binds_only_filter() {
        let sql = count_query("processed_records");
        assert!(sql.starts_with("SELECT COUNT(*) FROM processed_records WHERE "));
        assert_eq!(placeholders(&sql), (1..=3).collect::<BTreeSet<_>>());

        let params = FilterParams::new(&RecordFilter::default());
        assert_eq!(params.as_params().len(), placeholders(&sql).len());
    }

    #[test]
    fn test_filter_params_follow_predicate_order() {
        let filter = RecordFilter {
            category: Some(Category::B),
            min_value: Some(12.5),
            unprocessed_only: true,
        };
        assert_eq!(
            FilterParams::new(&filter),
            FilterParams {
                category: Some("B".to_string()),
                min_value: Some(12.5),
                unprocessed_only: true,
            }
        );

        assert!(FILTER_PREDICATE.contains("$1::text IS NULL OR doc->>'category' = $1"));
        assert!(FILTER_PREDICATE.contains("(doc->>'value')::float8 >= $2"));
        assert!(FILTER_PREDICATE.contains("NOT $3::bool"));
    }

    #[test]
    fn test_unset_filter_binds_nulls() {
        let params = FilterParams::new(&RecordFilter::default());
        assert_eq!(params.category, None);
        assert_eq!(params.min_value, None);
        assert!(!params.unprocessed_only);
    }

    #[test]
    fn test_to_db_id_range() {
        assert_eq!(to_db_id(RecordId::new(42).unwrap()).unwrap(), 42);
        assert!(to_db_id(RecordId::new(u64::MAX).unwrap()).is_err());
    }

    #[test]
    fn test_decode_row_rejects_bad_document() {
        let err = decode_row(serde_json::json!({"id": 0})).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
