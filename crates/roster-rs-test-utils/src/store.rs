use async_trait::async_trait;
use roster_rs_protocol::Document;
use roster_rs_store::{FindPage, RecordStore, StoreError, UpdateCounts};
use std::collections::HashSet;

/// Record store that is never reachable.
#[derive(Debug, Clone, Default)]
pub struct UnavailableStore;

fn down() -> StoreError {
    StoreError::Unavailable("store is down".to_string())
}

#[async_trait]
impl RecordStore for UnavailableStore {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(down())
    }

    async fn find(
        &self,
        _collection: &str,
        _filter: &Document,
        _projection: Option<&Document>,
        _limit: usize,
    ) -> Result<FindPage, StoreError> {
        Err(down())
    }

    async fn aggregate(
        &self,
        _collection: &str,
        _pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        Err(down())
    }

    async fn update_many(
        &self,
        _collection: &str,
        _filter: &Document,
        _update: &Document,
    ) -> Result<UpdateCounts, StoreError> {
        Err(down())
    }

    async fn insert_many(
        &self,
        _collection: &str,
        _records: Vec<Document>,
    ) -> Result<usize, StoreError> {
        Err(down())
    }

    async fn delete_many(
        &self,
        _collection: &str,
        _filter: &Document,
    ) -> Result<usize, StoreError> {
        Err(down())
    }

    async fn delete_all(&self, _collection: &str) -> Result<usize, StoreError> {
        Err(down())
    }

    async fn ids(&self, _collection: &str) -> Result<HashSet<String>, StoreError> {
        Err(down())
    }
}
