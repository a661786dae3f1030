//! Record store abstraction shared by the document and flat-file backends.

use crate::StoreError;
use async_trait::async_trait;
use roster_rs_protocol::Document;
use std::collections::HashSet;

/// Records returned by a bounded find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindPage {
    pub records: Vec<Document>,
    /// More records matched than the limit allowed.
    pub truncated: bool,
}

/// Counts reported by a bulk update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub matched: usize,
    pub modified: usize,
}

#[async_trait]
/// Storage backend the executor runs canonical operations against.
pub trait RecordStore: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Return at most `limit` records matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: Option<&Document>,
        limit: usize,
    ) -> Result<FindPage, StoreError>;

    /// Run an aggregation pipeline over a collection.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError>;

    /// Apply an operator update document to every matching record.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateCounts, StoreError>;

    /// Append records; identifiers must already be assigned.
    async fn insert_many(
        &self,
        collection: &str,
        records: Vec<Document>,
    ) -> Result<usize, StoreError>;

    /// Remove every matching record; returns the count removed.
    async fn delete_many(&self, collection: &str, filter: &Document)
    -> Result<usize, StoreError>;

    /// Remove every record of a collection.
    async fn delete_all(&self, collection: &str) -> Result<usize, StoreError>;

    /// Identifiers currently present in a collection.
    async fn ids(&self, collection: &str) -> Result<HashSet<String>, StoreError>;
}

/// Collection names map to file names, so only plain identifiers are allowed.
pub fn check_collection_name(collection: &str) -> Result<(), StoreError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(collection.to_string()))
    }
}

/// Apply an inclusion/exclusion projection to found records.
pub(crate) fn apply_projection(
    records: Vec<Document>,
    projection: Option<&Document>,
) -> Result<Vec<Document>, StoreError> {
    match projection {
        Some(spec) if !spec.is_empty() => {
            let stage = serde_json::json!({ "$project": spec });
            let stages: Vec<Document> = stage.as_object().cloned().into_iter().collect();
            crate::pipeline::run_pipeline(records, &stages, crate::FilterDialect::Document)
        }
        _ => Ok(records),
    }
}
