//! Read a synthesized workbook back into a structural report.
//!
//! Values come from calamine. Autofilter, list validations and cell styles
//! are not exposed by calamine, so those are read from the worksheet and
//! styles XML directly.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use quick_xml::events::Event;
use serde::Serialize;
use zip::ZipArchive;

use crate::xlsx_styles::{parse_cell_style_ids, parse_styles_xml, CellStyle};
use crate::xlsx_validation::{find_worksheet_xml_path, parse_list_validations, read_zip_file, ListValidation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InspectError {
    #[error("failed to open workbook: {0}")]
    Open(String),
    #[error("workbook contains no sheets")]
    NoSheets,
    #[error("failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },
    #[error("failed to read workbook XML: {0}")]
    Xml(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellReport {
    pub row: u32,
    pub col: u16,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<CellStyle>,
}

/// Structure of the first worksheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookReport {
    pub sheet_name: String,
    /// Used rows, header included.
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<String>,
    /// `ref` of the autofilter, e.g. `"A1:J4"`.
    pub autofilter: Option<String>,
    pub validations: Vec<ListValidation>,
    pub cells: Vec<CellReport>,
}

impl WorkbookReport {
    fn find(&self, row: usize, col: usize) -> Option<&CellReport> {
        self.cells
            .binary_search_by(|c| (c.row as usize, c.col as usize).cmp(&(row, col)))
            .ok()
            .map(|i| &self.cells[i])
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.find(row, col).map(|c| c.value.as_str())
    }

    pub fn style_at(&self, row: usize, col: usize) -> Option<&CellStyle> {
        self.find(row, col).and_then(|c| c.style.as_ref())
    }

    /// Rows below the header.
    pub fn data_rows(&self) -> usize {
        self.rows.saturating_sub(1)
    }
}

pub fn inspect_file(path: &Path) -> Result<WorkbookReport, InspectError> {
    let bytes = std::fs::read(path).map_err(|e| InspectError::Open(format!("{}: {}", path.display(), e)))?;
    inspect(&bytes)
}

pub fn inspect(bytes: &[u8]) -> Result<WorkbookReport, InspectError> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|e: calamine::XlsxError| InspectError::Open(e.to_string()))?;

    let sheet_name = workbook.sheet_names().first().cloned().ok_or(InspectError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name).map_err(|e| InspectError::Sheet {
        sheet: sheet_name.clone(),
        message: e.to_string(),
    })?;

    let (height, width) = range.get_size();
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let mut cells: BTreeMap<(u32, u16), CellReport> = BTreeMap::new();
    for (row_idx, row) in range.rows().enumerate() {
        for (col_idx, data) in row.iter().enumerate() {
            let value = match data {
                Data::Empty => continue,
                other => render(other),
            };
            let key = (start_row + row_idx as u32, (start_col as usize + col_idx) as u16);
            cells.insert(key, CellReport { row: key.0, col: key.1, value, style: None });
        }
    }

    let rows = if height == 0 { 0 } else { start_row as usize + height };
    let columns = if width == 0 { 0 } else { start_col as usize + width };
    let headers = (0..columns as u16)
        .map(|col| cells.get(&(0, col)).map(|c| c.value.clone()).unwrap_or_default())
        .collect();

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| InspectError::Open(e.to_string()))?;
    let sheet_path = find_worksheet_xml_path(&mut archive, &sheet_name).map_err(InspectError::Xml)?;
    let sheet_xml = read_zip_file(&mut archive, &sheet_path).map_err(InspectError::Xml)?;
    let styles = read_zip_file(&mut archive, "xl/styles.xml")
        .map(|xml| parse_styles_xml(&xml))
        .unwrap_or_default();

    for (row, col, style_id) in parse_cell_style_ids(&sheet_xml) {
        let style = styles.get(style_id).cloned();
        cells
            .entry((row, col))
            .or_insert_with(|| CellReport { row, col, value: String::new(), style: None })
            .style = style;
    }

    Ok(WorkbookReport {
        sheet_name,
        rows,
        columns,
        headers,
        autofilter: parse_autofilter_ref(&sheet_xml),
        validations: parse_list_validations(&sheet_xml).map_err(InspectError::Xml)?,
        cells: cells.into_values().collect(),
    })
}

/// Integers without decimals, everything else as displayed text.
fn render(data: &Data) -> String {
    match data {
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        other => other.to_string(),
    }
}

fn parse_autofilter_ref(sheet_xml: &str) -> Option<String> {
    let mut reader = quick_xml::Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"autoFilter" => {
                return e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"ref")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
