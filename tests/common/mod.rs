#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

pub const ECB_EXR_SCHEMA: &str = include_str!("../fixtures/ecb_exr_schema.json");

pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Empty,
}

/// Writes an xlsx with one sheet per `(name, rows)` pair. Empty strings leave the cell blank.
pub fn write_workbook(path: &Path, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
    let typed: Vec<(&str, Vec<Vec<Cell>>)> = sheets
        .iter()
        .map(|(name, rows)| {
            let rows = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| if c.is_empty() { Cell::Empty } else { Cell::Text(*c) })
                        .collect()
                })
                .collect();
            (*name, rows)
        })
        .collect();
    write_typed_workbook(path, &typed)
}

pub fn write_typed_workbook(path: &Path, sheets: &[(&str, Vec<Vec<Cell>>)]) -> PathBuf {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(text) => {
                        sheet.write_string(r as u32, c as u16, *text).unwrap();
                    }
                    Cell::Number(value) => {
                        sheet.write_number(r as u32, c as u16, *value).unwrap();
                    }
                    Cell::Empty => {}
                }
            }
        }
    }
    workbook.save(path).unwrap();
    path.to_path_buf()
}
