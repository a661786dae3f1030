//! Runs canonical operations against the active record store.

use crate::error::{ExecutionError, RosterCoreError};
use log::{debug, info, warn};
use roster_rs_config::{MAX_FIND_LIMIT, RosterConfig, StoreProvider};
use roster_rs_protocol::{Action, ExecutionResult, Operation};
use roster_rs_store::{CsvStore, DocumentStore, RecordStore, assign_missing_ids};
use std::collections::HashSet;
use std::sync::Arc;

/// Executes operations on the primary store, or on the fallback store when
/// the primary does not answer.
pub struct QueryExecutor {
    primary: Arc<dyn RecordStore>,
    fallback: Option<Arc<dyn RecordStore>>,
    find_limit: usize,
    id_collision_check: bool,
}

impl QueryExecutor {
    pub fn new(primary: Arc<dyn RecordStore>) -> Self {
        Self {
            primary,
            fallback: None,
            find_limit: MAX_FIND_LIMIT,
            id_collision_check: true,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn RecordStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Cap on records returned by a find, clamped to the hard maximum.
    pub fn with_find_limit(mut self, limit: usize) -> Self {
        self.find_limit = limit.clamp(1, MAX_FIND_LIMIT);
        self
    }

    /// Toggle retrying generated identifiers against existing ones.
    pub fn with_id_collision_check(mut self, enabled: bool) -> Self {
        self.id_collision_check = enabled;
        self
    }

    /// Build the stores described by the config.
    pub fn from_config(config: &RosterConfig) -> Result<Self, RosterCoreError> {
        let store = &config.store;
        let primary: Arc<dyn RecordStore> = match store.provider {
            StoreProvider::Document => match store.path.as_deref() {
                Some(path) => Arc::new(DocumentStore::open(path)?),
                None => Arc::new(DocumentStore::in_memory()),
            },
            StoreProvider::Csv => Arc::new(CsvStore::new(store.path.as_deref().unwrap_or("."))),
        };
        let mut executor = Self::new(primary)
            .with_find_limit(config.executor.find_limit)
            .with_id_collision_check(store.id_collision_check);
        if store.fallback.enabled {
            if let Some(path) = store.fallback.path.as_deref() {
                executor = executor.with_fallback(Arc::new(CsvStore::new(path)));
            }
        }
        info!(
            "query executor ready (store={}, fallback={}, find_limit={})",
            executor.primary.name(),
            executor.fallback.is_some(),
            executor.find_limit
        );
        Ok(executor)
    }

    pub fn find_limit(&self) -> usize {
        self.find_limit
    }

    /// Store answering right now: the primary when reachable, else the fallback.
    async fn active_store(&self) -> Result<Arc<dyn RecordStore>, ExecutionError> {
        let primary_error = match self.primary.ping().await {
            Ok(()) => return Ok(self.primary.clone()),
            Err(err) => err,
        };
        let Some(fallback) = &self.fallback else {
            return Err(ExecutionError::NoStore(primary_error.to_string()));
        };
        warn!(
            "primary store unavailable, using fallback (primary={}, fallback={}, error={primary_error})",
            self.primary.name(),
            fallback.name()
        );
        match fallback.ping().await {
            Ok(()) => Ok(fallback.clone()),
            Err(err) => Err(ExecutionError::NoStore(format!(
                "{primary_error}; fallback: {err}"
            ))),
        }
    }

    /// Run one operation.
    pub async fn execute(&self, operation: &Operation) -> Result<ExecutionResult, ExecutionError> {
        guard(operation)?;
        let store = self.active_store().await?;
        let collection = operation.collection.as_str();
        debug!(
            "executing operation (action={}, collection={collection}, store={})",
            operation.action,
            store.name()
        );
        match operation.action {
            Action::Find => {
                let page = store
                    .find(
                        collection,
                        &operation.filter,
                        operation.projection.as_ref(),
                        self.find_limit,
                    )
                    .await?;
                Ok(ExecutionResult::Records {
                    count: page.records.len(),
                    truncated: page.truncated,
                    records: page.records,
                })
            }
            Action::Aggregate => {
                let rows = store.aggregate(collection, &operation.pipeline).await?;
                Ok(ExecutionResult::Aggregated {
                    count: rows.len(),
                    rows,
                })
            }
            Action::UpdateMany => {
                let update = operation
                    .update
                    .as_ref()
                    .filter(|update| !update.is_empty())
                    .ok_or_else(|| ExecutionError::Unsafe("update without changes".to_string()))?;
                let counts = store
                    .update_many(collection, &operation.filter, &update.to_document())
                    .await?;
                Ok(ExecutionResult::Updated {
                    matched: counts.matched,
                    modified: counts.modified,
                })
            }
            Action::InsertMany | Action::Create => {
                let mut records = operation.data.clone();
                let existing = if self.id_collision_check {
                    store.ids(collection).await?
                } else {
                    HashSet::new()
                };
                assign_missing_ids(&mut records, &existing, self.id_collision_check)?;
                let count = store.insert_many(collection, records.clone()).await?;
                Ok(ExecutionResult::Inserted { count, records })
            }
            Action::DeleteMany => {
                let deleted = store.delete_many(collection, &operation.filter).await?;
                Ok(ExecutionResult::Deleted { deleted })
            }
            Action::Unknown => Err(ExecutionError::UnsupportedAction(Action::Unknown)),
        }
    }

    /// Delete every record of `collection`. Only runs when `confirmation`
    /// repeats the collection name.
    pub async fn purge(
        &self,
        collection: &str,
        confirmation: &str,
    ) -> Result<usize, ExecutionError> {
        if confirmation != collection {
            return Err(ExecutionError::PurgeNotConfirmed {
                collection: collection.to_string(),
            });
        }
        let store = self.active_store().await?;
        let removed = store.delete_all(collection).await?;
        warn!(
            "purged collection (collection={collection}, store={}, removed={removed})",
            store.name()
        );
        Ok(removed)
    }
}

/// Bulk updates and deletes need a non-empty filter.
fn guard(operation: &Operation) -> Result<(), ExecutionError> {
    if operation.action.is_destructive() && operation.filter.is_empty() {
        warn!(
            "rejected operation without filter (action={}, collection={})",
            operation.action, operation.collection
        );
        return Err(ExecutionError::Unsafe(format!(
            "{} requires a non-empty filter",
            operation.action
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::QueryExecutor;
    use crate::error::ExecutionError;
    use pretty_assertions::assert_eq;
    use roster_rs_protocol::{Action, Document, ExecutionResult, Operation, UpdateDirective};
    use roster_rs_store::{DocumentStore, RecordStore};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn object(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn store() -> Arc<DocumentStore> {
        Arc::new(
            DocumentStore::in_memory()
                .with_records(
                    "employees",
                    vec![
                        object(json!({ "employee_id": "EMP000001", "name": "Ada", "department": "Sales" })),
                        object(json!({ "employee_id": "EMP000002", "name": "Bob", "department": "HR" })),
                    ],
                )
                .expect("seed"),
        )
    }

    #[tokio::test]
    async fn empty_destructive_filters_never_reach_the_store() {
        let store = store();
        let executor = QueryExecutor::new(store.clone());
        let mut delete = Operation::new(Action::DeleteMany, "employees");
        assert!(matches!(
            executor.execute(&delete).await,
            Err(ExecutionError::Unsafe(_))
        ));
        delete.action = Action::UpdateMany;
        delete.update = Some(UpdateDirective::FieldAssignment(object(json!({ "department": "x" }))));
        assert!(matches!(
            executor.execute(&delete).await,
            Err(ExecutionError::Unsafe(_))
        ));
        assert_eq!(store.ids("employees").await.expect("ids").len(), 2);
    }

    #[tokio::test]
    async fn find_respects_configured_limit() {
        let executor = QueryExecutor::new(store()).with_find_limit(1);
        let result = executor
            .execute(&Operation::new(Action::Find, "employees"))
            .await
            .expect("find");
        let ExecutionResult::Records { count, truncated, .. } = result else {
            panic!("expected records");
        };
        assert_eq!((count, truncated), (1, true));
    }

    #[tokio::test]
    async fn inserts_get_generated_identifiers() {
        let executor = QueryExecutor::new(store());
        let mut create = Operation::new(Action::Create, "employees");
        create.data = vec![object(json!({ "name": "Eve" }))];
        let ExecutionResult::Inserted { count, records } =
            executor.execute(&create).await.expect("insert")
        else {
            panic!("expected inserted records");
        };
        assert_eq!(count, 1);
        let id = records[0]["employee_id"].as_str().unwrap_or_default();
        assert!(id.starts_with("EMP") && id.len() == 9, "unexpected id {id}");
    }

    #[tokio::test]
    async fn unknown_actions_are_unsupported() {
        let executor = QueryExecutor::new(store());
        assert!(matches!(
            executor.execute(&Operation::new(Action::Unknown, "employees")).await,
            Err(ExecutionError::UnsupportedAction(Action::Unknown))
        ));
    }

    #[tokio::test]
    async fn purge_requires_matching_confirmation() {
        let store = store();
        let executor = QueryExecutor::new(store.clone());
        assert!(matches!(
            executor.purge("employees", "yes").await,
            Err(ExecutionError::PurgeNotConfirmed { .. })
        ));
        assert_eq!(executor.purge("employees", "employees").await.expect("purge"), 2);
        assert!(store.ids("employees").await.expect("ids").is_empty());
    }
}
