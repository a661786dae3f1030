//! Employee identifier generation.

use crate::StoreError;
use log::{debug, warn};
use rand::Rng;
use roster_rs_protocol::Document;
use serde_json::Value;
use std::collections::HashSet;

/// Field holding the unique record identifier.
pub const ID_FIELD: &str = "employee_id";
/// Prefix of generated identifiers.
pub const ID_PREFIX: &str = "EMP";
/// Attempts per record before giving up on finding a free identifier.
pub const MAX_ID_ATTEMPTS: usize = 32;

/// Generate a candidate identifier: `EMP` followed by six digits.
pub fn generate_id(rng: &mut impl Rng) -> String {
    format!("{ID_PREFIX}{:06}", rng.random_range(0..1_000_000u32))
}

/// True when a record carries a usable identifier.
pub fn has_id(doc: &Document) -> bool {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) => !id.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// Fill in missing identifiers.
///
/// With `check_collisions`, candidates are retried against `existing` and
/// against identifiers assigned earlier in the same batch. Without it, the
/// first candidate is used as is.
pub fn assign_missing_ids(
    records: &mut [Document],
    existing: &HashSet<String>,
    check_collisions: bool,
) -> Result<usize, StoreError> {
    let mut rng = rand::rng();
    let mut taken: HashSet<String> = existing.clone();
    for record in records.iter() {
        if let Some(id) = record.get(ID_FIELD).filter(|_| has_id(record)) {
            taken.insert(crate::value::scalar_text(id));
        }
    }

    let mut assigned = 0;
    for record in records.iter_mut() {
        if has_id(record) {
            continue;
        }
        let id = if check_collisions {
            next_free_id(&mut rng, &taken)?
        } else {
            generate_id(&mut rng)
        };
        debug!("assigned generated identifier (id={id})");
        taken.insert(id.clone());
        record.insert(ID_FIELD.to_string(), Value::String(id));
        assigned += 1;
    }
    Ok(assigned)
}

fn next_free_id(rng: &mut impl Rng, taken: &HashSet<String>) -> Result<String, StoreError> {
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let candidate = generate_id(rng);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        warn!("generated identifier collided (id={candidate}, attempt={attempt})");
    }
    Err(StoreError::IdExhausted(MAX_ID_ATTEMPTS))
}
