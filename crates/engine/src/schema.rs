//! Record schemas.
//!
//! A schema is a zero-sized marker type implementing [`Schema`]. It names
//! the module, the ordered field list, the column table, the searchable
//! fields and an optional lock policy. Decoding raw extraction output into
//! typed fields lives here too, since it is driven entirely by the field
//! list.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::column::{ColumnSpec, LockPolicy};
use crate::module::ModuleKind;
use crate::record::{FieldValue, HistoryPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    History,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::History => "history",
        }
    }
}

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Must be present in extraction output with the declared type.
    Required,
    /// Taken from extraction output if present and non-empty, else defaulted.
    Optional,
    /// Never read from extraction output; always set by the pipeline.
    Injected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub key: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldDef {
    pub const fn required(key: &'static str, kind: FieldKind) -> Self {
        Self { key, kind, presence: Presence::Required }
    }

    pub const fn optional(key: &'static str) -> Self {
        Self { key, kind: FieldKind::Text, presence: Presence::Optional }
    }

    pub const fn injected(key: &'static str) -> Self {
        Self { key, kind: FieldKind::Text, presence: Presence::Injected }
    }
}

pub trait Schema: 'static {
    const MODULE: ModuleKind;
    const FIELDS: &'static [FieldDef];
    const COLUMNS: &'static [ColumnSpec];
    const SEARCHABLE: &'static [&'static str];
    const LOCK_POLICY: Option<LockPolicy> = None;

    /// Value for an optional or injected field. `raw` is the extraction
    /// object being decoded, for defaults that depend on sibling fields.
    fn default_value(_key: &str, _raw: &Map<String, Value>) -> FieldValue {
        FieldValue::Text(String::new())
    }

    fn field_index(key: &str) -> Option<usize> {
        Self::FIELDS.iter().position(|f| f.key == key)
    }

    fn column(key: &str) -> Option<&'static ColumnSpec> {
        Self::COLUMNS.iter().find(|c| c.key == key)
    }
}

/// Why one raw element could not become a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("element is not an object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    Missing(&'static str),
    #[error("field '{key}' should be {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
}

/// Decode one raw extraction element into fields aligned with `S::FIELDS`.
/// Unknown keys are ignored.
pub fn decode_fields<S: Schema>(raw: &Value) -> Result<Vec<FieldValue>, DecodeError> {
    let obj = raw.as_object().ok_or(DecodeError::NotAnObject)?;
    let mut fields = Vec::with_capacity(S::FIELDS.len());

    for def in S::FIELDS {
        let value = match def.presence {
            Presence::Injected => S::default_value(def.key, obj),
            Presence::Optional => match obj.get(def.key) {
                Some(Value::String(s)) if !s.trim().is_empty() => FieldValue::Text(s.clone()),
                Some(Value::String(_)) | Some(Value::Null) | None => S::default_value(def.key, obj),
                Some(_) => {
                    return Err(DecodeError::WrongType { key: def.key, expected: "a string" })
                }
            },
            Presence::Required => {
                let v = match obj.get(def.key) {
                    None | Some(Value::Null) => return Err(DecodeError::Missing(def.key)),
                    Some(v) => v,
                };
                decode_value(def, v)?
            }
        };
        fields.push(value);
    }

    Ok(fields)
}

fn decode_value(def: &FieldDef, v: &Value) -> Result<FieldValue, DecodeError> {
    match def.kind {
        FieldKind::Text => v
            .as_str()
            .map(|s| FieldValue::Text(s.to_string()))
            .ok_or(DecodeError::WrongType { key: def.key, expected: "a string" }),
        FieldKind::Number => v
            .as_f64()
            .map(FieldValue::Number)
            .ok_or(DecodeError::WrongType { key: def.key, expected: "a number" }),
        FieldKind::History => {
            let wrong = DecodeError::WrongType {
                key: def.key,
                expected: "an array of {year, count, status}",
            };
            let items = v.as_array().ok_or_else(|| wrong.clone())?;
            items
                .iter()
                .map(|item| history_point(item).ok_or_else(|| wrong.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::History)
        }
    }
}

fn history_point(item: &Value) -> Option<HistoryPoint> {
    let obj = item.as_object()?;
    // Years come back as either "2024" or 2024.
    let year = match obj.get("year")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(HistoryPoint {
        year,
        count: obj.get("count")?.as_f64()?,
        status: obj.get("status")?.as_str()?.to_string(),
    })
}

/// Response-schema descriptor sent with each extraction request: an array of
/// objects listing every extracted field, its type, its enum values and the
/// required list. Injected fields are not requested.
pub fn response_schema<S: Schema>() -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for def in S::FIELDS {
        if def.presence == Presence::Injected {
            continue;
        }
        let mut prop = match def.kind {
            FieldKind::Text => json!({ "type": "STRING" }),
            FieldKind::Number => json!({ "type": "NUMBER" }),
            FieldKind::History => json!({
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "year": { "type": "STRING" },
                        "count": { "type": "NUMBER" },
                        "status": { "type": "STRING" }
                    },
                    "required": ["year", "count", "status"]
                }
            }),
        };
        if let Some(col) = S::column(def.key) {
            if col.kind.is_enumerated() {
                prop["enum"] = json!(col.enum_values);
            }
        }
        properties.insert(def.key.to_string(), prop);
        if def.presence == Presence::Required {
            required.push(def.key);
        }
    }

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": required
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{Compliance, GapAnalysis, Trend};

    #[test]
    fn test_decode_compliance_injects_status() {
        let raw = json!({
            "refId": "A-1", "requirement": "Keep logs", "procedure": "Inspect",
            "evidence": "Log export", "criteria": "90 days", "riskRating": "High",
            "domainTag": "Ops", "sourceExcerpt": "shall keep logs",
            "status": "Compliant", "extra": 42
        });
        let fields = decode_fields::<Compliance>(&raw).unwrap();
        let status = Compliance::field_index("status").unwrap();
        assert_eq!(fields[status], FieldValue::from("N/A"));
        assert_eq!(fields.len(), Compliance::FIELDS.len());
    }

    #[test]
    fn test_decode_missing_required() {
        let raw = json!({ "refId": "A-1" });
        assert_eq!(
            decode_fields::<Compliance>(&raw),
            Err(DecodeError::Missing("domainTag"))
        );
    }

    #[test]
    fn test_decode_gap_defaults_depend_on_status() {
        let base = json!({
            "refId": "R-1", "regulatoryRequirement": "Encrypt data",
            "gapDescription": "Not covered", "riskRating": "High",
            "remediationAction": "Write policy", "gapStatus": "Gap",
            "internalReference": ""
        });
        let fields = decode_fields::<GapAnalysis>(&base).unwrap();
        let text = GapAnalysis::field_index("internalText").unwrap();
        let reference = GapAnalysis::field_index("internalReference").unwrap();
        assert_eq!(fields[text], FieldValue::from("No explicit coverage detected."));
        assert_eq!(fields[reference], FieldValue::from("N/A"));

        let mut partial = base.clone();
        partial["gapStatus"] = json!("Partial");
        let fields = decode_fields::<GapAnalysis>(&partial).unwrap();
        assert_eq!(fields[text], FieldValue::from("Referenced section matches mandate."));
    }

    #[test]
    fn test_decode_trend_types() {
        let raw = json!({
            "theme": "Access reviews", "frequency": 3, "severityTrend": "Degrading",
            "historicalContext": [{ "year": 2023, "count": 1, "status": "Open" }],
            "aiSynthesis": "Recurring", "recommendedAction": "Automate"
        });
        let fields = decode_fields::<Trend>(&raw).unwrap();
        assert_eq!(fields[1], FieldValue::Number(3.0));
        assert_eq!(fields[3].to_string(), "2023: 1 (Open)");

        let mut bad = raw.clone();
        bad["frequency"] = json!("three");
        assert!(matches!(
            decode_fields::<Trend>(&bad),
            Err(DecodeError::WrongType { key: "frequency", .. })
        ));
    }

    #[test]
    fn test_response_schema_lists_enums_and_required() {
        let schema = response_schema::<Compliance>();
        let items = &schema["items"];
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(items["properties"]["riskRating"]["enum"], json!(["High", "Medium", "Low"]));
        assert!(items["properties"].get("status").is_none());
        assert!(items["required"].as_array().unwrap().contains(&json!("refId")));
    }
}
