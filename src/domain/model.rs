use crate::core::artefact::ArtefactReference;
use crate::domain::mapping::MappingTemplate;
use crate::domain::schema::Schema;
use crate::utils::error::{Result, SdmxError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column).filter(|v| !v.is_null())
    }

    /// Cell rendered as text; `None` for missing or null cells.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).map(value_to_text)
    }
}

/// Column-ordered tabular data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Builds a table from rows of optional text cells lined up with `columns`.
    pub fn from_rows<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<Option<&str>>>) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let records = rows
            .into_iter()
            .map(|row| Record {
                data: columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| {
                        let value = cell
                            .map(|s| serde_json::Value::String(s.to_string()))
                            .unwrap_or(serde_json::Value::Null);
                        (column.clone(), value)
                    })
                    .collect(),
            })
            .collect();
        Self { columns, records }
    }

    /// Reads CSV with a header row. Empty cells become nulls.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let data = columns
                .iter()
                .zip(row.iter())
                .map(|(column, cell)| {
                    let value = if cell.is_empty() {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(cell.to_string())
                    };
                    (column.clone(), value)
                })
                .collect();
            records.push(Record { data });
        }

        tracing::debug!("Read {} rows x {} columns from CSV", records.len(), columns.len());
        Ok(Self { columns, records })
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_csv_reader(bytes)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Adds the column at the end unless it already exists.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn column_values(&self, column: &str) -> Vec<Option<&serde_json::Value>> {
        self.records.iter().map(|r| r.get(column)).collect()
    }

    /// Keeps only `columns`, in that order.
    pub fn select(&self, columns: &[String]) -> Table {
        let records = self
            .records
            .iter()
            .map(|record| Record {
                data: columns
                    .iter()
                    .map(|c| {
                        (
                            c.clone(),
                            record.data.get(c).cloned().unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect(),
            })
            .collect();
        Table {
            columns: columns.to_vec(),
            records,
        }
    }

    pub fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for record in &self.records {
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|c| record.text(c).unwrap_or_default())
                .collect();
            writer.write_record(&row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_csv(&self) -> Result<String> {
        self.to_delimited(b',')
    }

    pub fn to_tsv(&self) -> Result<String> {
        self.to_delimited(b'\t')
    }
}

pub fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Output of the standardization transformer: only mapped target fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedTable {
    pub table: Table,
    pub validated_against: Option<ArtefactReference>,
}

impl StandardizedTable {
    pub fn fields(&self) -> &[String] {
        &self.table.columns
    }
}

/// Everything the transform stage needs, gathered by extract.
#[derive(Debug, Clone)]
pub struct ExtractedInput {
    pub table: Table,
    pub template: MappingTemplate,
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Any invalid value fails the run.
    #[default]
    Strict,
    /// Rows with values outside the code lists are dropped and reported as rejected.
    Filter,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Strict => write!(f, "strict"),
            ValidationMode::Filter => write!(f, "filter"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = SdmxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "filter" => Ok(ValidationMode::Filter),
            other => Err(SdmxError::InvalidConfigValueError {
                field: "validation".to_string(),
                value: other.to_string(),
                reason: "Valid modes: strict, filter".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub standardized: StandardizedTable,
    pub csv_output: String,
    pub tsv_output: String,
    pub rejected: Table,
}
