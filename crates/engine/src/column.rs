//! Column tables.
//!
//! A `ColumnSpec` describes one grid/workbook column. The table for a module
//! is a `&'static [ColumnSpec]` and drives both the editable grid and the
//! exported workbook, so the enum set attached to a column is exactly the
//! set that ends up in the workbook's drop-down validation.

use serde::Serialize;

/// Fill and text colour, `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ColorPair {
    pub fill: u32,
    pub text: u32,
}

impl ColorPair {
    pub const fn new(fill: u32, text: u32) -> Self {
        Self { fill, text }
    }
}

pub const ROSE: ColorPair = ColorPair::new(0xFFE4E6, 0x9F1239);
pub const AMBER: ColorPair = ColorPair::new(0xFEF3C7, 0x92400E);
pub const EMERALD: ColorPair = ColorPair::new(0xD1FAE5, 0x065F46);
pub const SLATE: ColorPair = ColorPair::new(0xF1F5F9, 0x475569);

/// Used for values missing from a column's colour map.
pub const NEUTRAL: ColorPair = ColorPair::new(0xFFFFFF, 0x000000);

pub const RISK_LEVELS: &[&str] = &["High", "Medium", "Low"];
pub const RISK_COLORS: &[(&str, ColorPair)] =
    &[("High", ROSE), ("Medium", AMBER), ("Low", EMERALD)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnKind {
    PlainText,
    SingleLineEnum,
    ColorCodedEnum,
}

impl ColumnKind {
    pub fn is_enumerated(&self) -> bool {
        !matches!(self, ColumnKind::PlainText)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub key: &'static str,
    pub header: &'static str,
    /// Layout hint in character units.
    pub width: f64,
    pub kind: ColumnKind,
    /// Allowed values, in display order. Empty for plain-text columns.
    pub enum_values: &'static [&'static str],
    #[serde(skip)]
    pub color_map: &'static [(&'static str, ColorPair)],
}

impl ColumnSpec {
    pub const fn text(key: &'static str, header: &'static str, width: f64) -> Self {
        Self {
            key,
            header,
            width,
            kind: ColumnKind::PlainText,
            enum_values: &[],
            color_map: &[],
        }
    }

    pub const fn single_line(
        key: &'static str,
        header: &'static str,
        width: f64,
        values: &'static [&'static str],
    ) -> Self {
        Self {
            key,
            header,
            width,
            kind: ColumnKind::SingleLineEnum,
            enum_values: values,
            color_map: &[],
        }
    }

    pub const fn color_coded(
        key: &'static str,
        header: &'static str,
        width: f64,
        values: &'static [&'static str],
        colors: &'static [(&'static str, ColorPair)],
    ) -> Self {
        Self {
            key,
            header,
            width,
            kind: ColumnKind::ColorCodedEnum,
            enum_values: values,
            color_map: colors,
        }
    }

    pub fn has_colors(&self) -> bool {
        !self.color_map.is_empty()
    }

    /// Colour pair for `value`, or [`NEUTRAL`] when unmapped.
    pub fn color_for(&self, value: &str) -> ColorPair {
        self.color_map
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, pair)| *pair)
            .unwrap_or(NEUTRAL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnTableError {
    #[error("column '{0}' is enumerated but has no values")]
    EmptyEnum(&'static str),
    #[error("duplicate column key '{0}'")]
    DuplicateKey(&'static str),
}

/// Check the structural rules of a column table.
pub fn validate(columns: &[ColumnSpec]) -> Result<(), ColumnTableError> {
    for (i, col) in columns.iter().enumerate() {
        if col.kind.is_enumerated() && col.enum_values.is_empty() {
            return Err(ColumnTableError::EmptyEnum(col.key));
        }
        if columns[..i].iter().any(|c| c.key == col.key) {
            return Err(ColumnTableError::DuplicateKey(col.key));
        }
    }
    Ok(())
}

/// Per-row lock: when `trigger_key` equals `trigger_value`, the
/// `locked_keys` of that row cannot be patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockPolicy {
    pub trigger_key: &'static str,
    pub trigger_value: &'static str,
    pub locked_keys: &'static [&'static str],
}

impl LockPolicy {
    pub fn locks(&self, key: &str) -> bool {
        self.locked_keys.contains(&key)
    }
}
