//! Flat-file fallback store: one `<collection>.csv` file per collection.
//!
//! Cell values are typed on read (integers, floats, booleans, strings; empty
//! cells are absent fields). Filters use the reduced flat-file dialect.

use crate::filter::{FilterDialect, matches};
use crate::ids::ID_FIELD;
use crate::pipeline::run_pipeline;
use crate::store::{FindPage, RecordStore, UpdateCounts, apply_projection, check_collection_name};
use crate::update::{apply_update, validate_update};
use crate::value::scalar_text;
use crate::StoreError;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use roster_rs_protocol::Document;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// CSV-backed record store.
#[derive(Debug)]
pub struct CsvStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on the files.
    lock: Mutex<()>,
}

impl CsvStore {
    /// Store over `root`. The directory is not created: a missing directory
    /// makes `ping` fail.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        info!("initialized csv store (root={})", root.display());
        Self {
            root,
            lock: Mutex::new(()),
        }
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        check_collection_name(collection)?;
        Ok(self.root.join(format!("{collection}.csv")))
    }

    fn load(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let path = self.collection_path(collection)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&path)?;
        let headers = reader.headers()?.clone();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut record = Document::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if let Some(value) = parse_cell(cell) {
                    record.insert(header.to_string(), value);
                }
            }
            records.push(record);
        }
        debug!(
            "loaded csv collection (name={collection}, records={})",
            records.len()
        );
        Ok(records)
    }

    fn save(&self, collection: &str, records: &[Document]) -> Result<(), StoreError> {
        let path = self.collection_path(collection)?;
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        let temp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&temp_path)?;
            if !headers.is_empty() {
                writer.write_record(&headers)?;
            }
            for record in records {
                let row: Vec<String> = headers
                    .iter()
                    .map(|header| record.get(header).map(cell_text).unwrap_or_default())
                    .collect();
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(temp_path, path)?;
        Ok(())
    }

    fn mutate<T>(
        &self,
        collection: &str,
        mutator: impl FnOnce(&mut Vec<Document>) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        let mut records = self.load(collection)?;
        let (outcome, changed) = mutator(&mut records)?;
        if changed {
            self.save(collection, &records)?;
        }
        Ok(outcome)
    }
}

/// Text written for a value. Strings that would be typed as something else
/// on read are written as JSON string literals.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) if parse_cell(text).as_ref() != Some(value) => {
            Value::String(text.clone()).to_string()
        }
        other => scalar_text(other),
    }
}

/// Type a CSV cell. Integers with leading zeros stay strings; arrays,
/// objects and quoted strings are read as JSON.
fn parse_cell(cell: &str) -> Option<Value> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with(['[', '{', '"']) {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
    }
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if !leading_zero {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Value::Number(Number::from(int)));
        }
        if let Some(float) = trimmed
            .parse::<f64>()
            .ok()
            .filter(|float| float.is_finite())
            .and_then(Number::from_f64)
        {
            return Some(Value::Number(float));
        }
    }
    match trimmed {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => Some(Value::String(cell.to_string())),
    }
}

#[async_trait]
impl RecordStore for CsvStore {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "csv directory missing: {}",
                self.root.display()
            )))
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        projection: Option<&Document>,
        limit: usize,
    ) -> Result<FindPage, StoreError> {
        let records = {
            let _guard = self.lock.lock();
            self.load(collection)?
        };
        let mut found = Vec::new();
        let mut truncated = false;
        for record in records {
            if matches(&record, filter, FilterDialect::FlatFile)? {
                if found.len() == limit {
                    truncated = true;
                    break;
                }
                found.push(record);
            }
        }
        Ok(FindPage {
            records: apply_projection(found, projection)?,
            truncated,
        })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        let records = {
            let _guard = self.lock.lock();
            self.load(collection)?
        };
        run_pipeline(records, pipeline, FilterDialect::FlatFile)
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
                if matches(record, filter, FilterDialect::FlatFile)? {
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
            records.retain(|record| !matches(record, filter, FilterDialect::FlatFile).unwrap_or(false));
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
        let _guard = self.lock.lock();
        Ok(self
            .load(collection)?
            .iter()
            .filter_map(|record| record.get(ID_FIELD))
            .map(scalar_text)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{cell_text, parse_cell};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn cells_are_typed_on_read() {
        assert_eq!(parse_cell("42"), Some(json!(42)));
        assert_eq!(parse_cell("4.5"), Some(json!(4.5)));
        assert_eq!(parse_cell("true"), Some(json!(true)));
        assert_eq!(parse_cell("EMP000123"), Some(json!("EMP000123")));
        assert_eq!(parse_cell("00123"), Some(json!("00123")));
        assert_eq!(parse_cell("0.75"), Some(json!(0.75)));
        assert_eq!(parse_cell("   "), None);
        assert_eq!(parse_cell(r#"["sql","excel"]"#), Some(json!(["sql", "excel"])));
        assert_eq!(parse_cell(r#"{"city":"Oslo"}"#), Some(json!({ "city": "Oslo" })));
        assert_eq!(parse_cell("[draft"), Some(json!("[draft")));
    }

    #[test]
    fn strings_that_look_typed_are_quoted() {
        for text in ["5551234", "true", "", "[x]", "\"quoted\"", "Oslo"] {
            let value = json!(text);
            assert_eq!(parse_cell(&cell_text(&value)), Some(value));
        }
        assert_eq!(cell_text(&json!("Oslo")), "Oslo");
    }
}
