use crate::utils::error::Result;
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// A sheet as rows of optional text cells. `None` is an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Builds a sheet from string literals; empty strings become empty cells.
    pub fn from_strs(name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect()
            })
            .collect();
        Self::new(name, rows)
    }

    /// First row as trimmed header names; empty header cells become "".
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|c| c.as_deref().map(str::trim).unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn data_rows(&self) -> &[Vec<Option<String>>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// In-memory copy of a workbook, read once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Sheet lookup ignoring case.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name.trim().eq_ignore_ascii_case(name.trim()))
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Reads every sheet of an `.xlsx`, `.xlsm`, `.xls` or `.ods` file.
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    tracing::debug!("Opening workbook: {}", path.display());
    collect_sheets(open_workbook_auto(path)?)
}

/// Reads a workbook held in memory. The format is detected from the content.
pub fn read_workbook_bytes(bytes: Vec<u8>) -> Result<Workbook> {
    tracing::debug!("Opening workbook from {} bytes", bytes.len());
    collect_sheets(open_workbook_auto_from_rs(Cursor::new(bytes))?)
}

fn collect_sheets<RS: Read + Seek>(mut source: Sheets<RS>) -> Result<Workbook> {
    let mut sheets = Vec::new();
    for name in source.sheet_names() {
        let range = source.worksheet_range(&name)?;
        let rows: Vec<Vec<Option<String>>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_text).collect())
            .collect();
        tracing::debug!("Sheet '{}': {} rows", name, rows.len());
        sheets.push(Sheet::new(name, rows));
    }

    Ok(Workbook::new(sheets))
}

fn cell_to_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(float_to_text(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

// Spreadsheets store every number as a float; whole numbers read back as "2020", not "2020.0".
fn float_to_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
