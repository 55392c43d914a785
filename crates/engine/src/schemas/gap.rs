use serde::Serialize;
use serde_json::{Map, Value};

use crate::column::{ColorPair, ColumnSpec, LockPolicy, AMBER, EMERALD, RISK_COLORS, RISK_LEVELS, ROSE, SLATE};
use crate::module::ModuleKind;
use crate::record::{FieldAccess, FieldValue};
use crate::schema::{FieldDef, FieldKind, Schema};

pub const FULL_COMPLIANCE: &str = "Full Compliance";
pub const PARTIAL: &str = "Partial";
pub const GAP: &str = "Gap";

const GAP_STATUSES: &[&str] = &[FULL_COMPLIANCE, PARTIAL, GAP, "N/A"];
const GAP_COLORS: &[(&str, ColorPair)] = &[
    (FULL_COMPLIANCE, EMERALD),
    (PARTIAL, AMBER),
    (GAP, ROSE),
    ("N/A", SLATE),
];

/// A benchmark clause mapped against an internal policy.
#[derive(Debug, Clone, Copy)]
pub struct GapAnalysis;

impl Schema for GapAnalysis {
    const MODULE: ModuleKind = ModuleKind::Gap;

    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("refId", FieldKind::Text),
        FieldDef::required("regulatoryRequirement", FieldKind::Text),
        FieldDef::optional("internalReference"),
        FieldDef::optional("internalText"),
        FieldDef::required("gapStatus", FieldKind::Text),
        FieldDef::required("gapDescription", FieldKind::Text),
        FieldDef::required("riskRating", FieldKind::Text),
        FieldDef::required("remediationAction", FieldKind::Text),
    ];

    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::text("refId", "Ref ID", 15.0),
        ColumnSpec::text("regulatoryRequirement", "Regulatory Requirement", 50.0),
        ColumnSpec::text("internalReference", "Internal Reference", 25.0),
        ColumnSpec::text("internalText", "Internal Text Snippet", 50.0),
        ColumnSpec::color_coded("gapStatus", "Compliance Status", 25.0, GAP_STATUSES, GAP_COLORS),
        ColumnSpec::text("gapDescription", "Gap Description", 60.0),
        ColumnSpec::color_coded("riskRating", "Risk Rating", 15.0, RISK_LEVELS, RISK_COLORS),
        ColumnSpec::text("remediationAction", "Remediation Action", 60.0),
    ];

    const SEARCHABLE: &'static [&'static str] =
        &["refId", "regulatoryRequirement", "internalReference", "gapDescription"];

    const LOCK_POLICY: Option<LockPolicy> = Some(LockPolicy {
        trigger_key: "gapStatus",
        trigger_value: FULL_COMPLIANCE,
        locked_keys: &["riskRating", "remediationAction"],
    });

    fn default_value(key: &str, raw: &Map<String, Value>) -> FieldValue {
        match key {
            "internalReference" => FieldValue::from("N/A"),
            "internalText" => {
                if raw.get("gapStatus").and_then(Value::as_str) == Some(GAP) {
                    FieldValue::from("No explicit coverage detected.")
                } else {
                    FieldValue::from("Referenced section matches mandate.")
                }
            }
            _ => FieldValue::Text(String::new()),
        }
    }
}

/// Coverage summary over a gap result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapTally {
    pub total: usize,
    pub full_compliance: usize,
    pub partial: usize,
    pub gap: usize,
}

impl GapTally {
    pub fn from_records<R: FieldAccess>(records: impl IntoIterator<Item = R>) -> Self {
        let mut tally = GapTally::default();
        for record in records {
            tally.total += 1;
            match record.field("gapStatus").and_then(FieldValue::as_text).unwrap_or("") {
                FULL_COMPLIANCE => tally.full_compliance += 1,
                PARTIAL => tally.partial += 1,
                GAP => tally.gap += 1,
                _ => {}
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AuditRecord, RecordId};
    use crate::schema::decode_fields;
    use serde_json::json;

    fn row(status: &str, internal: Option<&str>) -> AuditRecord<GapAnalysis> {
        let mut raw = json!({
            "refId": "G-1", "regulatoryRequirement": "r", "gapStatus": status,
            "gapDescription": "d", "riskRating": "Low", "remediationAction": "a"
        });
        if let Some(text) = internal {
            raw["internalText"] = json!(text);
        }
        let fields = decode_fields::<GapAnalysis>(&raw).unwrap();
        AuditRecord::from_parts(RecordId::new(status), fields)
    }

    #[test]
    fn test_internal_text_default_depends_on_status() {
        assert_eq!(row(GAP, None).text("internalText"), "No explicit coverage detected.");
        assert_eq!(row(PARTIAL, None).text("internalText"), "Referenced section matches mandate.");
        assert_eq!(row(GAP, Some("")).text("internalText"), "No explicit coverage detected.");
        assert_eq!(row(GAP, Some("Section 4.2")).text("internalText"), "Section 4.2");
        assert_eq!(row(GAP, None).text("internalReference"), "N/A");
    }

    #[test]
    fn test_tally_counts_known_statuses() {
        let records = vec![row(FULL_COMPLIANCE, None), row(GAP, None), row(GAP, None), row("Unclear", None)];
        let tally = GapTally::from_records(&records);
        assert_eq!(
            tally,
            GapTally { total: 4, full_compliance: 1, partial: 0, gap: 2 }
        );
    }
}
