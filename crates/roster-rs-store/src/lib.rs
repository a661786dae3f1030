//! Record stores for Roster: the `RecordStore` trait, the JSONL document
//! store, the CSV fallback store, and the filter, pipeline and update engines
//! they share.

pub mod csv_store;
pub mod document;
pub mod error;
pub mod filter;
pub mod ids;
pub mod pipeline;
pub mod store;
pub mod update;
pub mod value;

/// Flat-file fallback store.
pub use csv_store::CsvStore;
/// Primary document store.
pub use document::DocumentStore;
/// Store error type.
pub use error::StoreError;
/// Filter dialects.
pub use filter::FilterDialect;
/// Identifier helpers.
pub use ids::{ID_FIELD, assign_missing_ids};
/// Store trait and result types.
pub use store::{FindPage, RecordStore, UpdateCounts};
