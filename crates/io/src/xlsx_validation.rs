//! Drop-down list validation for enumerated columns, and the worksheet XML
//! reader that recovers it.
//!
//! ## Key gotchas
//! - rust_xlsxwriter quotes inline lists: `<formula1>"High,Medium,Low"</formula1>`.
//! - Inline lists are limited to 255 characters including separators.
//! - `allowBlank="1"` corresponds to `ignore_blank(true)`.

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use rust_xlsxwriter::DataValidation;
use serde::Serialize;
use zip::ZipArchive;

use auditgrid_engine::column::ColumnSpec;

// ============================================================================
// Export
// ============================================================================

/// List validation restricting a column to its enum values. `None` for
/// plain-text columns.
pub fn list_validation(column: &ColumnSpec) -> Result<Option<DataValidation>, String> {
    if !column.kind.is_enumerated() {
        return Ok(None);
    }
    let dv = DataValidation::new()
        .allow_list_strings(column.enum_values)
        .map_err(|e| format!("invalid value list for column '{}': {}", column.key, e))?
        .ignore_blank(true);
    Ok(Some(dv))
}

// ============================================================================
// Import
// ============================================================================

/// 0-based inclusive rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl CellRange {
    pub fn new(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self { first_row, first_col, last_row, last_col }
    }
}

/// One list validation as stored in the worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListValidation {
    pub ranges: Vec<CellRange>,
    pub values: Vec<String>,
    pub allow_blank: bool,
}

/// Parse inline list `<dataValidation>` elements from worksheet XML. Other
/// validation types are skipped.
pub fn parse_list_validations(xml: &str) -> Result<Vec<ListValidation>, String> {
    let mut reader = Reader::from_str(xml);

    let mut validations = Vec::new();
    let mut buf = Vec::new();
    let mut attrs: HashMap<String, String> = HashMap::new();
    let mut formula1: Option<String> = None;
    let mut in_validation = false;
    let mut in_formula1 = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"dataValidation" => {
                in_validation = true;
                formula1 = None;
                attrs.clear();
                for attr in e.attributes().flatten() {
                    attrs.insert(
                        String::from_utf8_lossy(attr.key.as_ref()).to_string(),
                        String::from_utf8_lossy(&attr.value).to_string(),
                    );
                }
            }
            Ok(Event::Start(ref e)) if in_validation && e.name().as_ref() == b"formula1" => {
                in_formula1 = true;
                formula1 = Some(String::new());
            }
            // Entity references arrive as separate events between text runs.
            Ok(Event::Text(ref e)) if in_formula1 => {
                if let Some(f) = formula1.as_mut() {
                    f.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::GeneralRef(ref e)) if in_formula1 => {
                if let Some(f) = formula1.as_mut() {
                    f.push('&');
                    f.push_str(&String::from_utf8_lossy(e));
                    f.push(';');
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"formula1" => {
                in_formula1 = false;
                formula1 = formula1.map(|f| unescape_xml(&f));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"dataValidation" => {
                in_validation = false;
                if let Some(v) = list_from_attrs(&attrs, formula1.as_deref()) {
                    validations.push(v);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(validations)
}

/// Unescape the five predefined XML entities.
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn list_from_attrs(attrs: &HashMap<String, String>, formula1: Option<&str>) -> Option<ListValidation> {
    if attrs.get("type").map(String::as_str) != Some("list") {
        return None;
    }
    let formula = formula1?.trim();
    // Range or named-range sources are not inline lists.
    if !(formula.len() >= 2 && formula.starts_with('"') && formula.ends_with('"')) {
        return None;
    }
    let inner = &formula[1..formula.len() - 1];
    Some(ListValidation {
        ranges: parse_sqref(attrs.get("sqref")?),
        values: inner.split(',').map(|s| s.to_string()).collect(),
        allow_blank: attrs.get("allowBlank").is_some_and(|v| v == "1"),
    })
}

/// `"A1:B10 D4"` into ranges.
pub fn parse_sqref(sqref: &str) -> Vec<CellRange> {
    sqref.split_whitespace().filter_map(parse_range).collect()
}

/// `"A1"` or `"A1:B10"`.
pub fn parse_range(range: &str) -> Option<CellRange> {
    match range.trim().split_once(':') {
        Some((start, end)) => {
            let (r1, c1) = parse_cell_ref(start)?;
            let (r2, c2) = parse_cell_ref(end)?;
            Some(CellRange::new(r1, c1, r2, c2))
        }
        None => {
            let (r, c) = parse_cell_ref(range)?;
            Some(CellRange::new(r, c, r, c))
        }
    }
}

/// `"C12"` or `"$C$12"` to 0-based `(row, col)`.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u16)> {
    let cell_ref = cell_ref.trim().replace('$', "");
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    if split == 0 {
        return None;
    }
    let col = col_from_letters(&cell_ref[..split])?;
    let row: u32 = cell_ref[split..].parse().ok()?;
    Some((row.checked_sub(1)?, col))
}

/// A=0, Z=25, AA=26.
fn col_from_letters(letters: &str) -> Option<u16> {
    let mut col = 0u32;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    u16::try_from(col.checked_sub(1)?).ok()
}

// ============================================================================
// Archive helpers
// ============================================================================

/// Worksheet XML path for `sheet_name`, via workbook.xml and its rels.
pub(crate) fn find_worksheet_xml_path<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    sheet_name: &str,
) -> Result<String, String> {
    let workbook_xml = read_zip_file(archive, "xl/workbook.xml")?;
    let rid = find_sheet_rid(&workbook_xml, sheet_name)?;
    let rels_xml = read_zip_file(archive, "xl/_rels/workbook.xml.rels")?;
    let target = find_relationship_target(&rels_xml, &rid)?;
    Ok(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    })
}

fn find_sheet_rid(workbook_xml: &str, sheet_name: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"r:id" => rid = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if name.as_deref() == Some(sheet_name) {
                    if let Some(r) = rid {
                        return Ok(r);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Err(format!("Sheet '{}' not found in workbook.xml", sheet_name))
}

fn find_relationship_target(rels_xml: &str, rid: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rid) {
                    if let Some(t) = target {
                        return Ok(t);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Err(format!("Relationship '{}' not found", rid))
}

pub(crate) fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

    Ok(content)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use auditgrid_engine::column::{RISK_COLORS, RISK_LEVELS};

    #[test]
    fn test_plain_column_has_no_validation() {
        let col = ColumnSpec::text("refId", "Ref ID", 15.0);
        assert!(list_validation(&col).unwrap().is_none());
    }

    #[test]
    fn test_enum_column_builds_validation() {
        let col = ColumnSpec::color_coded("riskRating", "Risk Rating", 15.0, RISK_LEVELS, RISK_COLORS);
        assert!(list_validation(&col).unwrap().is_some());
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("$C$12"), Some((11, 2)));
        assert_eq!(parse_cell_ref("AA3"), Some((2, 26)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A0"), None);
    }

    #[test]
    fn test_parse_sqref_multiple() {
        assert_eq!(
            parse_sqref("C2:C5 E7"),
            vec![CellRange::new(1, 2, 4, 2), CellRange::new(6, 4, 6, 4)]
        );
    }

    #[test]
    fn test_parse_list_validations() {
        let xml = r#"<worksheet><dataValidations count="2">
            <dataValidation type="list" allowBlank="1" showInputMessage="1" showErrorMessage="1" sqref="C2:C4">
              <formula1>"High,Medium,Low"</formula1>
            </dataValidation>
            <dataValidation type="whole" sqref="D2"><formula1>5</formula1></dataValidation>
          </dataValidations></worksheet>"#;
        let parsed = parse_list_validations(xml).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].values, vec!["High", "Medium", "Low"]);
        assert_eq!(parsed[0].ranges, vec![CellRange::new(1, 2, 3, 2)]);
        assert!(parsed[0].allow_blank);
    }

    #[test]
    fn test_list_values_with_entities() {
        let xml = r#"<worksheet><dataValidations count="1">
            <dataValidation type="list" sqref="B2:B3"><formula1>"R&amp;D,Ops &quot;core&quot;"</formula1></dataValidation>
          </dataValidations></worksheet>"#;
        let parsed = parse_list_validations(xml).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].values, vec!["R&D", "Ops \"core\""]);
        assert!(!parsed[0].allow_blank);
    }
}
