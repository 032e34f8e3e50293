use crate::domain::model::{value_to_text, Table};
use crate::domain::schema::{Component, Role, Schema};
use crate::utils::error::{Result, SdmxError};
use std::collections::{BTreeMap, HashSet};

/// Component lists and allowed codes derived from a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationInfo {
    pub valid_comp: Vec<String>,
    pub mandatory_comp: Vec<String>,
    pub coded_comp: Vec<String>,
    pub codelist_ids: BTreeMap<String, Vec<String>>,
    pub dim_comp: Vec<String>,
}

pub fn extract_validation_info(schema: &Schema) -> ValidationInfo {
    let ids = |pred: &dyn Fn(&Component) -> bool| {
        schema
            .components
            .iter()
            .filter(|c| pred(c))
            .map(|c| c.id.clone())
            .collect::<Vec<_>>()
    };

    ValidationInfo {
        valid_comp: ids(&|_: &Component| true),
        mandatory_comp: ids(&|c: &Component| c.required),
        coded_comp: ids(&|c: &Component| c.is_coded()),
        codelist_ids: codelist_ids(schema),
        dim_comp: schema
            .components_with_role(Role::Dimension)
            .map(|c| c.id.clone())
            .collect(),
    }
}

pub fn codelist_ids(schema: &Schema) -> BTreeMap<String, Vec<String>> {
    schema
        .components
        .iter()
        .filter_map(|c| c.codes.as_ref().map(|codes| (c.id.clone(), codes.code_ids())))
        .collect()
}

/// A non-null value outside the allowed codes of its column.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeViolation {
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// Lists every out-of-list value, comparing as strings. Columns absent from the table are ignored.
pub fn code_violations(
    table: &Table,
    codelist_ids: &BTreeMap<String, Vec<String>>,
) -> Vec<CodeViolation> {
    let allowed: Vec<(&String, HashSet<&str>)> = codelist_ids
        .iter()
        .filter(|(column, _)| table.has_column(column))
        .map(|(column, codes)| (column, codes.iter().map(String::as_str).collect()))
        .collect();

    let mut violations = Vec::new();
    for (row, record) in table.records.iter().enumerate() {
        for (column, codes) in &allowed {
            if let Some(value) = record.get(column) {
                let text = value_to_text(value);
                if !codes.contains(text.as_str()) {
                    violations.push(CodeViolation {
                        row,
                        column: (*column).clone(),
                        value: text,
                    });
                }
            }
        }
    }
    violations
}

/// Splits rows into kept and dropped by code list membership. The input is left untouched.
pub fn partition_rows(
    table: &Table,
    codelist_ids: &BTreeMap<String, Vec<String>>,
) -> (Table, Table) {
    let rejected_rows: HashSet<usize> = code_violations(table, codelist_ids)
        .into_iter()
        .map(|v| v.row)
        .collect();

    let mut kept = Table::new(table.columns.clone());
    let mut rejected = Table::new(table.columns.clone());
    for (idx, record) in table.records.iter().enumerate() {
        if rejected_rows.contains(&idx) {
            rejected.records.push(record.clone());
        } else {
            kept.records.push(record.clone());
        }
    }
    (kept, rejected)
}

pub fn filter_rows(table: &Table, codelist_ids: &BTreeMap<String, Vec<String>>) -> Table {
    partition_rows(table, codelist_ids).0
}

pub fn filter_raw(table: &Table, schema: &Schema) -> Table {
    let info = extract_validation_info(schema);
    let filtered = filter_rows(table, &info.codelist_ids);
    tracing::debug!(
        "Filtered {} of {} rows against {}",
        table.len() - filtered.len(),
        table.len(),
        schema.reference
    );
    filtered
}

/// Fails when a mandatory component has no column in the table.
pub fn check_mandatory(table: &Table, schema: &Schema) -> Result<()> {
    let missing: Vec<String> = extract_validation_info(schema)
        .mandatory_comp
        .into_iter()
        .filter(|c| !table.has_column(c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SdmxError::validation(format!(
            "Mandatory components missing from table: {}",
            missing.join(", ")
        )))
    }
}
