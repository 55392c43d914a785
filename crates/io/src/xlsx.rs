//! Workbook synthesis.
//!
//! Turns a column table plus a record snapshot into an XLSX byte buffer and
//! a dated filename. Delivery (disk, HTTP, browser) is the caller's job.
//!
//! Layout:
//! - Row 0: headers, bold white on dark, fixed height, centred.
//! - Rows 1..=N: one row per record in store order.
//! - Every enumerated column gets a drop-down list over rows 1..=N.
//! - Colour-mapped columns fill and colour each data cell by value,
//!   falling back to the neutral pair for unmapped values.
//! - Autofilter spans the header and every data row.
//! - Every data cell wraps, aligns top and has a thin border.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};

use auditgrid_engine::column::{self, ColumnSpec};
use auditgrid_engine::matrix::RecordMatrix;
use auditgrid_engine::module::ModuleKind;
use auditgrid_engine::record::{FieldAccess, FieldValue};
use auditgrid_engine::schema::Schema;

use crate::xlsx_styles::{data_format, header_format, HEADER_ROW_HEIGHT};
use crate::xlsx_validation::list_validation;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid column table: {0}")]
    Columns(#[from] column::ColumnTableError),
    #[error("{0} records do not fit in one worksheet")]
    TooManyRows(usize),
    #[error("workbook construction failed: {0}")]
    Build(String),
    #[error("export task failed: {0}")]
    Task(String),
}

impl From<rust_xlsxwriter::XlsxError> for SynthesisError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        SynthesisError::Build(e.to_string())
    }
}

/// What goes into a workbook besides the records.
#[derive(Debug, Clone, Copy)]
pub struct SheetSpec<'a> {
    pub sheet_name: &'a str,
    pub file_prefix: &'a str,
    pub columns: &'a [ColumnSpec],
}

impl SheetSpec<'static> {
    pub fn for_schema<S: Schema>() -> Self {
        Self {
            sheet_name: S::MODULE.sheet_name(),
            file_prefix: S::MODULE.export_prefix(),
            columns: S::COLUMNS,
        }
    }
}

/// A finished workbook, ready for delivery.
#[derive(Debug, Clone)]
pub struct SynthesizedWorkbook {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Header row plus one row per record.
    pub rows: usize,
    pub columns: usize,
    pub validations: usize,
    pub colored_cells: usize,
    pub duration_ms: u128,
}

impl SynthesizedWorkbook {
    /// Write to `dir/filename`, returning the full path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// `<prefix>_<YYYY-MM-DD>.xlsx`
pub fn export_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.xlsx", prefix, date.format("%Y-%m-%d"))
}

/// Build the workbook for `records` under `spec`.
pub fn synthesize<R: FieldAccess>(
    spec: &SheetSpec<'_>,
    records: &[R],
    date: NaiveDate,
) -> Result<SynthesizedWorkbook, SynthesisError> {
    let start_time = Instant::now();
    column::validate(spec.columns)?;
    let last_row = u32::try_from(records.len()).map_err(|_| SynthesisError::TooManyRows(records.len()))?;

    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook.add_worksheet().set_name(spec.sheet_name)?;

    write_header(worksheet, spec.columns)?;
    let colored_cells = write_rows(worksheet, spec.columns, records)?;
    let validations = add_validations(worksheet, spec.columns, last_row)?;

    if let Some(last_col) = last_col(spec.columns) {
        worksheet.autofilter(0, 0, last_row, last_col)?;
    }

    let bytes = workbook.save_to_buffer()?;

    let result = SynthesizedWorkbook {
        filename: export_filename(spec.file_prefix, date),
        bytes,
        rows: records.len() + 1,
        columns: spec.columns.len(),
        validations,
        colored_cells,
        duration_ms: start_time.elapsed().as_millis(),
    };
    log::debug!(
        "synthesized {} ({} rows, {} validations, {} coloured cells) in {}ms",
        result.filename,
        result.rows,
        result.validations,
        result.colored_cells,
        result.duration_ms
    );
    Ok(result)
}

fn last_col(columns: &[ColumnSpec]) -> Option<u16> {
    columns.len().checked_sub(1).and_then(|c| u16::try_from(c).ok())
}

fn write_header(worksheet: &mut Worksheet, columns: &[ColumnSpec]) -> Result<(), SynthesisError> {
    let format = header_format();
    worksheet.set_row_height(0, HEADER_ROW_HEIGHT)?;
    for (col, spec) in columns.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, spec.width)?;
        worksheet.write_string_with_format(0, col, spec.header, &format)?;
    }
    Ok(())
}

/// Returns the number of colour-coded cells written.
fn write_rows<R: FieldAccess>(
    worksheet: &mut Worksheet,
    columns: &[ColumnSpec],
    records: &[R],
) -> Result<usize, SynthesisError> {
    let plain = data_format(None);
    let mut colored = 0;

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, spec) in columns.iter().enumerate() {
            let col = col as u16;
            let value = record.field(spec.key);

            let colored_format;
            let format = if spec.has_colors() {
                let text = value.map(|v| v.to_string()).unwrap_or_default();
                colored_format = data_format(Some(spec.color_for(&text)));
                colored += 1;
                &colored_format
            } else {
                &plain
            };

            match value {
                Some(FieldValue::Number(n)) => {
                    worksheet.write_number_with_format(row, col, *n, format)?;
                }
                Some(other) => {
                    worksheet.write_string_with_format(row, col, other.to_string(), format)?;
                }
                None => {
                    worksheet.write_blank(row, col, format)?;
                }
            }
        }
    }

    Ok(colored)
}

/// One list validation per enumerated column, over every data row.
fn add_validations(worksheet: &mut Worksheet, columns: &[ColumnSpec], last_row: u32) -> Result<usize, SynthesisError> {
    if last_row == 0 {
        return Ok(0);
    }
    let mut added = 0;
    for (col, spec) in columns.iter().enumerate() {
        if let Some(dv) = list_validation(spec).map_err(SynthesisError::Build)? {
            let col = col as u16;
            worksheet.add_data_validation(1, col, last_row, col, &dv)?;
            added += 1;
        }
    }
    Ok(added)
}

// ============================================================================
// Matrix export
// ============================================================================

/// Synthesize the matrix's full, unfiltered store and narrate the outcome.
/// The store is never modified, whatever the result.
pub fn export_matrix<S: Schema>(
    matrix: &mut RecordMatrix<S>,
    date: NaiveDate,
) -> Result<SynthesizedWorkbook, SynthesisError> {
    matrix.log_mut().info(S::MODULE.export_start_message());
    let result = synthesize(&SheetSpec::for_schema::<S>(), matrix.store().all(), date);
    narrate_export(matrix, S::MODULE, &result);
    result
}

/// Off-thread variant: snapshots the store at call time and builds the
/// workbook on the blocking pool. Edits made while it runs are not included.
pub async fn export_matrix_detached<S: Schema>(
    matrix: &mut RecordMatrix<S>,
    date: NaiveDate,
) -> Result<SynthesizedWorkbook, SynthesisError> {
    matrix.log_mut().info(S::MODULE.export_start_message());
    let snapshot = matrix.store().all().to_vec();
    let result = smol::unblock(move || synthesize(&SheetSpec::for_schema::<S>(), &snapshot, date)).await;
    narrate_export(matrix, S::MODULE, &result);
    result
}

fn narrate_export<S: Schema>(
    matrix: &mut RecordMatrix<S>,
    module: ModuleKind,
    result: &Result<SynthesizedWorkbook, SynthesisError>,
) {
    match result {
        Ok(book) => matrix
            .log_mut()
            .success(format!("Export complete: {} ({} records).", book.filename, book.rows - 1)),
        Err(e) => {
            log::warn!("{} export failed: {}", module, e);
            matrix.log_mut().error(format!("Export error: {}", e));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
