//! Document store: in-process collections, optionally persisted as JSONL.

use crate::filter::{FilterDialect, matches};
use crate::ids::ID_FIELD;
use crate::pipeline::run_pipeline;
use crate::store::{FindPage, RecordStore, UpdateCounts, apply_projection, check_collection_name};
use crate::update::{apply_update, validate_update};
use crate::value::scalar_text;
use crate::StoreError;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use roster_rs_protocol::Document;
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Primary record store with the full filter and pipeline language.
///
/// With a root directory each collection lives in `<root>/<collection>.jsonl`
/// and is loaded on first use; every mutation rewrites the file atomically.
#[derive(Debug, Default)]
pub struct DocumentStore {
    root: Option<PathBuf>,
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl DocumentStore {
    /// Memory-only store.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed store under `root`, created if missing.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!("initialized document store (root={})", root.display());
        Ok(Self {
            root: Some(root),
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Seed a collection, replacing its contents.
    pub fn with_records(self, collection: &str, records: Vec<Document>) -> Result<Self, StoreError> {
        check_collection_name(collection)?;
        self.write_collection(collection, records.clone())?;
        self.collections.write().insert(collection.to_string(), records);
        Ok(self)
    }

    fn collection_path(&self, collection: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{collection}.jsonl")))
    }

    /// Make sure a collection is resident, loading it from disk if needed.
    fn ensure_loaded(&self, collection: &str) -> Result<(), StoreError> {
        check_collection_name(collection)?;
        if self.collections.read().contains_key(collection) {
            return Ok(());
        }
        let records = self.load_collection(collection)?;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_insert(records);
        Ok(())
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let Some(path) = self.collection_path(collection) else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str::<Document>(&line)?);
        }
        debug!(
            "loaded collection (name={collection}, records={})",
            records.len()
        );
        Ok(records)
    }

    /// Rewrite a collection file atomically.
    fn write_collection(&self, collection: &str, records: Vec<Document>) -> Result<(), StoreError> {
        let Some(path) = self.collection_path(collection) else {
            return Ok(());
        };
        let temp_path = path.with_extension("jsonl.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for record in &records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
        }
        std::fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Run a read over a resident collection.
    fn read<T>(
        &self,
        collection: &str,
        reader: impl FnOnce(&[Document]) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.ensure_loaded(collection)?;
        let guard = self.collections.read();
        let records = guard.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        reader(records)
    }

    /// Mutate a resident collection and persist it when anything changed.
    fn mutate<T>(
        &self,
        collection: &str,
        mutator: impl FnOnce(&mut Vec<Document>) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        self.ensure_loaded(collection)?;
        let mut guard = self.collections.write();
        let records = guard.entry(collection.to_string()).or_default();
        let mut working = records.clone();
        let (outcome, changed) = mutator(&mut working)?;
        if changed {
            self.write_collection(collection, working.clone())?;
            *records = working;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match &self.root {
            Some(root) if !root.is_dir() => Err(StoreError::Unavailable(format!(
                "data directory missing: {}",
                root.display()
            ))),
            _ => Ok(()),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: Option<&Document>,
        limit: usize,
    ) -> Result<FindPage, StoreError> {
        let (records, truncated) = self.read(collection, |records| {
            let mut found = Vec::new();
            let mut truncated = false;
            for record in records {
                if matches(record, filter, FilterDialect::Document)? {
                    if found.len() == limit {
                        truncated = true;
                        break;
                    }
                    found.push(record.clone());
                }
            }
            Ok((found, truncated))
        })?;
        Ok(FindPage {
            records: apply_projection(records, projection)?,
            truncated,
        })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        let records = self.read(collection, |records| Ok(records.to_vec()))?;
        run_pipeline(records, pipeline, FilterDialect::Document)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateCounts, StoreError> {
        validate_update(update)?;
        self.mutate(collection, |records| {
            let mut counts = UpdateCounts::default();
            for record in records.iter_mut() {
                if matches(record, filter, FilterDialect::Document)? {
                    counts.matched += 1;
                    if apply_update(record, update)? {
                        counts.modified += 1;
                    }
                }
            }
            Ok((counts, counts.modified > 0))
        })
    }

    async fn insert_many(
        &self,
        collection: &str,
        records: Vec<Document>,
    ) -> Result<usize, StoreError> {
        let count = records.len();
        self.mutate(collection, move |existing| {
            existing.extend(records);
            Ok((count, count > 0))
        })
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: &Document,
    ) -> Result<usize, StoreError> {
        self.mutate(collection, |records| {
            let before = records.len();
            let mut kept = Vec::with_capacity(before);
            for record in records.drain(..) {
                if !matches(&record, filter, FilterDialect::Document)? {
                    kept.push(record);
                }
            }
            *records = kept;
            let removed = before - records.len();
            Ok((removed, removed > 0))
        })
    }

    async fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
        self.mutate(collection, |records| {
            let removed = records.len();
            records.clear();
            Ok((removed, removed > 0))
        })
    }

    async fn ids(&self, collection: &str) -> Result<HashSet<String>, StoreError> {
        self.read(collection, |records| {
            Ok(records
                .iter()
                .filter_map(|record| record.get(ID_FIELD))
                .map(scalar_text)
                .collect())
        })
    }
}
