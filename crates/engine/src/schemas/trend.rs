use crate::column::{ColorPair, ColumnSpec, EMERALD, ROSE, SLATE};
use crate::module::ModuleKind;
use crate::schema::{FieldDef, FieldKind, Schema};

const TRENDS: &[&str] = &["Improving", "Degrading", "Stable"];
const TREND_COLORS: &[(&str, ColorPair)] =
    &[("Improving", EMERALD), ("Degrading", ROSE), ("Stable", SLATE)];

/// A finding theme recurring across audit cycles.
#[derive(Debug, Clone, Copy)]
pub struct Trend;

impl Schema for Trend {
    const MODULE: ModuleKind = ModuleKind::Trend;

    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("theme", FieldKind::Text),
        FieldDef::required("frequency", FieldKind::Number),
        FieldDef::required("severityTrend", FieldKind::Text),
        FieldDef::required("historicalContext", FieldKind::History),
        FieldDef::required("aiSynthesis", FieldKind::Text),
        FieldDef::required("recommendedAction", FieldKind::Text),
    ];

    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::text("theme", "Theme", 30.0),
        ColumnSpec::text("frequency", "Frequency", 12.0),
        ColumnSpec::color_coded("severityTrend", "Severity Trend", 18.0, TRENDS, TREND_COLORS),
        ColumnSpec::text("historicalContext", "Historical Context", 40.0),
        ColumnSpec::text("aiSynthesis", "AI Synthesis", 60.0),
        ColumnSpec::text("recommendedAction", "Recommended Action", 50.0),
    ];

    const SEARCHABLE: &'static [&'static str] = &["theme", "aiSynthesis", "recommendedAction"];
}
