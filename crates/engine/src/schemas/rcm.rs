use crate::column::{ColumnSpec, RISK_COLORS, RISK_LEVELS};
use crate::module::ModuleKind;
use crate::schema::{FieldDef, FieldKind, Schema};

/// One process step of a risk control matrix.
#[derive(Debug, Clone, Copy)]
pub struct Rcm;

impl Schema for Rcm {
    const MODULE: ModuleKind = ModuleKind::Rcm;

    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("refId", FieldKind::Text),
        FieldDef::required("processName", FieldKind::Text),
        FieldDef::required("controlObjective", FieldKind::Text),
        FieldDef::required("riskDescription", FieldKind::Text),
        FieldDef::required("inherentRiskRating", FieldKind::Text),
        FieldDef::required("controlActivity", FieldKind::Text),
        FieldDef::required("controlType", FieldKind::Text),
        FieldDef::required("controlNature", FieldKind::Text),
        FieldDef::required("frequency", FieldKind::Text),
        FieldDef::required("controlOwner", FieldKind::Text),
        FieldDef::required("evidenceOfPerformance", FieldKind::Text),
        FieldDef::required("residualRiskRating", FieldKind::Text),
    ];

    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::text("refId", "Process ID / Ref", 15.0),
        ColumnSpec::text("processName", "Process Name", 30.0),
        ColumnSpec::text("controlObjective", "Control Objective", 40.0),
        ColumnSpec::text("riskDescription", "Risk Description", 50.0),
        ColumnSpec::color_coded(
            "inherentRiskRating",
            "Inherent Risk Rating",
            20.0,
            RISK_LEVELS,
            RISK_COLORS,
        ),
        ColumnSpec::text("controlActivity", "Control Activity", 50.0),
        ColumnSpec::single_line("controlType", "Control Type", 20.0, &["Preventive", "Detective"]),
        ColumnSpec::single_line(
            "controlNature",
            "Control Nature",
            20.0,
            &["Manual", "Automated", "Semi Automated"],
        ),
        ColumnSpec::text("frequency", "Frequency", 20.0),
        ColumnSpec::text("controlOwner", "Control Owner", 25.0),
        ColumnSpec::text("evidenceOfPerformance", "Evidence of Performance", 40.0),
        ColumnSpec::color_coded(
            "residualRiskRating",
            "Residual Risk Rating",
            20.0,
            RISK_LEVELS,
            RISK_COLORS,
        ),
    ];

    const SEARCHABLE: &'static [&'static str] =
        &["refId", "processName", "controlObjective", "riskDescription", "controlOwner"];
}
