// Workbook synthesis and read-back

pub mod inspect;
pub mod xlsx;
pub mod xlsx_styles;
pub mod xlsx_validation;
