//! Typed audit records.
//!
//! An `AuditRecord<S>` is a generated id plus one `FieldValue` per field of
//! schema `S`, stored in `S::FIELDS` order. Records are values: a patch
//! produces a new record for the same id.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Opaque record id. Stable for the record's lifetime, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(raw: impl Into<String>) -> Self {
        RecordId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// One `{year, count, status}` triple of a trend's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub year: String,
    pub count: f64,
    pub status: String,
}

impl fmt::Display for HistoryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.year, self.count, self.status)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    History(Vec<HistoryPoint>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn kind(&self) -> crate::schema::FieldKind {
        use crate::schema::FieldKind;
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::History(_) => FieldKind::History,
        }
    }
}

/// Grid/workbook rendering. History renders one triple per line.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::History(points) => {
                for (i, point) in points.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}", point)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<Vec<HistoryPoint>> for FieldValue {
    fn from(points: Vec<HistoryPoint>) -> Self {
        FieldValue::History(points)
    }
}

/// Anything addressable by a record id.
pub trait Identified {
    fn record_id(&self) -> &RecordId;
}

/// Keyed field access, independent of the concrete schema.
pub trait FieldAccess: Identified {
    fn field(&self, key: &str) -> Option<&FieldValue>;
}

/// One record of schema `S`.
pub struct AuditRecord<S: Schema> {
    id: RecordId,
    fields: Vec<FieldValue>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> AuditRecord<S> {
    /// Caller guarantees `fields` is aligned with `S::FIELDS`.
    pub(crate) fn from_parts(id: RecordId, fields: Vec<FieldValue>) -> Self {
        debug_assert_eq!(fields.len(), S::FIELDS.len());
        Self {
            id,
            fields,
            _schema: PhantomData,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        S::field_index(key).and_then(|i| self.fields.get(i))
    }

    /// Text value of `key`, or "" when absent or non-text.
    pub fn text(&self, key: &str) -> &str {
        self.get(key).and_then(FieldValue::as_text).unwrap_or("")
    }

    /// `(key, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        S::FIELDS.iter().map(|def| def.key).zip(self.fields.iter())
    }

    /// New record with the same id and one field replaced.
    pub(crate) fn with_field(&self, index: usize, value: FieldValue) -> Self {
        let mut fields = self.fields.clone();
        fields[index] = value;
        Self::from_parts(self.id.clone(), fields)
    }
}

impl<S: Schema> Clone for AuditRecord<S> {
    fn clone(&self) -> Self {
        Self::from_parts(self.id.clone(), self.fields.clone())
    }
}

impl<S: Schema> PartialEq for AuditRecord<S> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.fields == other.fields
    }
}

impl<S: Schema> fmt::Debug for AuditRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("AuditRecord");
        s.field("id", &self.id);
        for (key, value) in self.fields() {
            s.field(key, value);
        }
        s.finish()
    }
}

impl<S: Schema> Serialize for AuditRecord<S> {
    fn serialize<Ser: serde::Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in self.fields() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<S: Schema> Identified for AuditRecord<S> {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl<S: Schema> FieldAccess for AuditRecord<S> {
    fn field(&self, key: &str) -> Option<&FieldValue> {
        self.get(key)
    }
}

impl<T: Identified + ?Sized> Identified for &T {
    fn record_id(&self) -> &RecordId {
        (**self).record_id()
    }
}

impl<T: FieldAccess + ?Sized> FieldAccess for &T {
    fn field(&self, key: &str) -> Option<&FieldValue> {
        (**self).field(key)
    }
}

/// A field update for `RecordStore::patch`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub key: String,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Id generation
// ============================================================================

/// Source of fresh record ids. Implementations never repeat an id.
pub trait IdGenerator: Send {
    fn next_id(&mut self) -> RecordId;
}

/// Monotonic `<prefix>-<n>` ids. The counter never restarts.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> RecordId {
        let id = RecordId(format!("{}-{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

/// Random v4 UUID ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> RecordId {
        RecordId(uuid::Uuid::new_v4().to_string())
    }
}
