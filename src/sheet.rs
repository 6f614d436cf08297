//! Spreadsheet sources
//!
//! Per-trial files are read through the [`SheetReader`] trait so the parsers
//! only ever see a header and rows of typed [`Cell`]s. [`CalamineReader`]
//! reads `.xls`/`.xlsx` workbooks from disk.

use crate::error::ParseError;
use crate::records::Header;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Extensions accepted for per-trial spreadsheet files.
pub const SHEET_EXTENSIONS: &[&str] = &["xls", "xlsx"];

/// File-name prefix of transient lock files written by office suites.
pub const LOCK_FILE_PREFIX: &str = "~$";

/// A typed spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Text form of the cell. Whole numbers print without a fractional part,
    /// so a numeric participant id `1234.0` reads back as `"1234"`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// Format a number the way it would be typed: `800` rather than `800.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Conversion applied to every numeric cell of a per-trial file.
pub type CellCoercion = fn(&Cell) -> f64;

/// Coerce a cell to a number, yielding NaN for anything that is not one.
pub fn coerce_nan_tolerant(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        Cell::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Cell::Empty => f64::NAN,
    }
}

/// The first worksheet of a workbook: header row plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub header: Header,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(header: Header, rows: Vec<Vec<Cell>>) -> Self {
        Self { header, rows }
    }
}

/// Source of per-trial sheets.
pub trait SheetReader: Send + Sync {
    /// Read the first worksheet of the file at `path`.
    fn read(&self, path: &Path) -> Result<Sheet, ParseError>;
}

/// Reads `.xls`/`.xlsx` workbooks with `calamine`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineReader;

impl SheetReader for CalamineReader {
    fn read(&self, path: &Path) -> Result<Sheet, ParseError> {
        let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_error(path, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ParseError::Spreadsheet {
                path: path.to_path_buf(),
                message: "workbook has no worksheets".to_string(),
            })?
            .map_err(|e| spreadsheet_error(path, e))?;

        let mut rows = range.rows();
        let header = match rows.next() {
            Some(first) => Header::new(first.iter().map(|c| cell_from_data(c).as_text())),
            None => Header::new(Vec::<String>::new()),
        };
        let rows = rows
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();
        Ok(Sheet::new(header, rows))
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        other => Cell::Text(other.to_string()),
    }
}

fn spreadsheet_error(path: &Path, e: calamine::Error) -> ParseError {
    ParseError::Spreadsheet {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
