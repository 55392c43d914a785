//! Ordered, id-keyed record storage.
//!
//! # Invariants
//!
//! - Order is extraction order and is never re-sorted.
//! - Contents are replaced wholesale; records are never removed one by one.
//! - `patch` swaps in a new record value for one id and leaves every other
//!   record untouched. An unknown id is a silent no-op.

use rustc_hash::FxHashMap;

use crate::record::{AuditRecord, FieldUpdate, FieldValue, RecordId};
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{key}' expects a {expected} value")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("field '{key}' is locked while {trigger_key} is '{trigger_value}'")]
    FieldLocked {
        key: String,
        trigger_key: &'static str,
        trigger_value: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// The id is not in the store (stale reference). Nothing changed.
    Missing,
}

pub struct RecordStore<S: Schema> {
    records: Vec<AuditRecord<S>>,
    index: FxHashMap<RecordId, usize>,
}

impl<S: Schema> Default for RecordStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Clone for RecordStore<S> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            index: self.index.clone(),
        }
    }
}

impl<S: Schema> std::fmt::Debug for RecordStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("module", &S::MODULE)
            .field("records", &self.records)
            .finish()
    }
}

impl<S: Schema> RecordStore<S> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Discard prior contents and install `records` in the given order.
    pub fn replace_all(&mut self, records: Vec<AuditRecord<S>>) {
        self.index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id().clone(), i))
            .collect();
        self.records = records;
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    pub fn all(&self) -> &[AuditRecord<S>] {
        &self.records
    }

    pub fn get(&self, id: &RecordId) -> Option<&AuditRecord<S>> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `key` on record `id` is currently locked by the schema's
    /// lock policy.
    pub fn is_locked(&self, id: &RecordId, key: &str) -> bool {
        match (self.get(id), S::LOCK_POLICY) {
            (Some(record), Some(policy)) => {
                policy.locks(key) && record.text(policy.trigger_key) == policy.trigger_value
            }
            _ => false,
        }
    }

    /// Replace the given fields of record `id`. All updates are validated
    /// before any is applied.
    pub fn patch(&mut self, id: &RecordId, updates: &[FieldUpdate]) -> Result<PatchOutcome, PatchError> {
        let Some(&pos) = self.index.get(id) else {
            log::debug!("patch on missing id {} ignored", id);
            return Ok(PatchOutcome::Missing);
        };

        let mut resolved = Vec::with_capacity(updates.len());
        for update in updates {
            let index = S::field_index(&update.key)
                .ok_or_else(|| PatchError::UnknownField(update.key.clone()))?;
            let expected = S::FIELDS[index].kind;
            if update.value.kind() != expected {
                return Err(PatchError::TypeMismatch {
                    key: update.key.clone(),
                    expected: expected.as_str(),
                });
            }
            if let Some(policy) = S::LOCK_POLICY {
                if self.is_locked(id, &update.key) {
                    return Err(PatchError::FieldLocked {
                        key: update.key.clone(),
                        trigger_key: policy.trigger_key,
                        trigger_value: policy.trigger_value,
                    });
                }
            }
            resolved.push((index, update.value.clone()));
        }

        let mut record = self.records[pos].clone();
        for (index, value) in resolved {
            record = record.with_field(index, value);
        }
        self.records[pos] = record;
        Ok(PatchOutcome::Applied)
    }

    /// Count records per value of `key`: the column's enum values in order
    /// (zero counts included), then out-of-set values in first-seen order.
    pub fn tally(&self, key: &str) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = S::column(key)
            .map(|col| col.enum_values.iter().map(|v| (v.to_string(), 0)).collect())
            .unwrap_or_default();

        for record in &self.records {
            let value = match record.get(key) {
                Some(FieldValue::Text(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => continue,
            };
            match counts.iter_mut().find(|(v, _)| *v == value) {
                Some((_, n)) => *n += 1,
                None => counts.push((value, 1)),
            }
        }
        counts
    }
}
