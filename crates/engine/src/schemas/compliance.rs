use serde_json::{Map, Value};

use crate::column::{ColumnSpec, RISK_COLORS, RISK_LEVELS};
use crate::module::ModuleKind;
use crate::record::FieldValue;
use crate::schema::{FieldDef, FieldKind, Schema};

/// Sentinel status for a finding nobody has assessed yet.
pub const NOT_ASSESSED: &str = "N/A";

const STATUSES: &[&str] = &["Compliant", "Non Compliant", "Partial Compliant", NOT_ASSESSED];

/// One requirement clause pulled from a regulatory document.
#[derive(Debug, Clone, Copy)]
pub struct Compliance;

impl Schema for Compliance {
    const MODULE: ModuleKind = ModuleKind::Compliance;

    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("refId", FieldKind::Text),
        FieldDef::required("domainTag", FieldKind::Text),
        FieldDef::required("riskRating", FieldKind::Text),
        FieldDef::required("requirement", FieldKind::Text),
        FieldDef::required("procedure", FieldKind::Text),
        FieldDef::required("evidence", FieldKind::Text),
        FieldDef::required("criteria", FieldKind::Text),
        FieldDef::required("sourceExcerpt", FieldKind::Text),
        FieldDef::injected("status"),
        FieldDef::injected("remarks"),
    ];

    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::text("refId", "Ref ID", 15.0),
        ColumnSpec::text("domainTag", "Domain", 25.0),
        ColumnSpec::color_coded("riskRating", "Risk Rating", 15.0, RISK_LEVELS, RISK_COLORS),
        ColumnSpec::text("requirement", "Requirement", 80.0),
        ColumnSpec::text("procedure", "Procedure", 60.0),
        ColumnSpec::text("evidence", "Evidence", 40.0),
        ColumnSpec::text("criteria", "Criteria", 40.0),
        ColumnSpec::text("sourceExcerpt", "Source Excerpt", 60.0),
        ColumnSpec::single_line("status", "Status", 25.0, STATUSES),
        ColumnSpec::text("remarks", "Remarks", 60.0),
    ];

    const SEARCHABLE: &'static [&'static str] = &["refId", "requirement", "domainTag", "procedure"];

    fn default_value(key: &str, _raw: &Map<String, Value>) -> FieldValue {
        match key {
            "status" => FieldValue::from(NOT_ASSESSED),
            _ => FieldValue::Text(String::new()),
        }
    }
}
