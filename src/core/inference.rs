use crate::core::artefact::{ArtefactKind, ArtefactReference};
use crate::domain::model::{value_to_text, Table};
use crate::domain::schema::{Code, Codelist, Component, DataType, Role, Schema};
use crate::utils::error::{Result, SdmxError};
use std::collections::{BTreeSet, HashSet};

pub const DEFAULT_INFERRED_AGENCY: &str = "WB";
pub const DEFAULT_INFERRED_ID: &str = "INFERRED_SCHEMA";
pub const TIME_PERIOD: &str = "TIME_PERIOD";
pub const TIME_PERIOD_CONCEPT_URN: &str =
    "urn:sdmx:org.sdmx.infomodel.conceptscheme.Concept=SDMX:CROSS_DOMAIN_CONCEPTS(2.0).TIME_PERIOD";
pub const TIME_PERIOD_DESCRIPTION: &str =
    "Timespan or point in time to which the observation actually refers.";

const MAX_LOCAL_CODES: usize = 500;
const DIMENSION_UNIQUE_RATIO: f64 = 0.5;

/// Smallest column combinations, excluding `value_col`, that identify every row.
///
/// Each key is a sorted list of columns; single-column keys have one element.
/// Rows whose key columns are all empty are ignored.
pub fn infer_role_dimension(table: &Table, value_col: &str) -> Result<Vec<Vec<String>>> {
    if !table.has_column(value_col) {
        return Err(SdmxError::validation(format!(
            "Observation column '{}' not found in table",
            value_col
        )));
    }

    let candidates: Vec<&str> = table
        .columns
        .iter()
        .map(String::as_str)
        .filter(|c| *c != value_col)
        .collect();
    let rows: Vec<Vec<Option<String>>> = table
        .records
        .iter()
        .map(|r| candidates.iter().map(|c| r.text(c)).collect::<Vec<_>>())
        .filter(|row| row.iter().any(Option::is_some))
        .collect();
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    for size in 1..=candidates.len() {
        let mut keys: Vec<Vec<String>> = combinations(candidates.len(), size)
            .into_iter()
            .filter(|combo| is_unique_key(&rows, combo))
            .map(|combo| {
                let mut key: Vec<String> =
                    combo.iter().map(|idx| candidates[*idx].to_string()).collect();
                key.sort();
                key
            })
            .collect();
        if !keys.is_empty() {
            keys.sort();
            return Ok(keys);
        }
    }
    Ok(Vec::new())
}

fn is_unique_key(rows: &[Vec<Option<String>>], combo: &[usize]) -> bool {
    let mut seen = HashSet::new();
    rows.iter().all(|row| {
        let key: Vec<&Option<String>> = combo.iter().map(|idx| &row[*idx]).collect();
        seen.insert(key)
    })
}

/// Index combinations of `size` out of `n`, in lexicographic order.
fn combinations(n: usize, size: usize) -> Vec<Vec<usize>> {
    fn extend(
        start: usize,
        n: usize,
        size: usize,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if current.len() == size {
            out.push(current.clone());
            return;
        }
        for idx in start..n {
            current.push(idx);
            extend(idx + 1, n, size, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    if size <= n {
        extend(0, n, size, &mut Vec::with_capacity(size), &mut out);
    }
    out
}

fn is_numeric_column(table: &Table, column: &str) -> bool {
    let mut seen_value = false;
    for value in table.column_values(column).into_iter().flatten() {
        seen_value = true;
        let numeric = value.is_number() || value_to_text(value).trim().parse::<f64>().is_ok();
        if !numeric {
            return false;
        }
    }
    seen_value
}

fn unique_values(table: &Table, column: &str) -> BTreeSet<String> {
    table
        .column_values(column)
        .into_iter()
        .flatten()
        .map(value_to_text)
        .collect()
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut start_of_word = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if start_of_word {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(c);
            start_of_word = true;
        }
    }
    out
}

// Column names may hold characters that are reserved in artefact ids.
fn codelist_id(column: &str) -> String {
    let cleaned: String = column
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, ':' | '(' | ')' | '=') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("CL_{}", cleaned)
}

/// Guesses roles, types and local code lists from the data itself.
pub fn infer_schema(table: &Table, agency: &str, id: &str, value_col: &str) -> Result<Schema> {
    let keys = infer_role_dimension(table, value_col)?;
    let key_columns: HashSet<&str> = keys.iter().flatten().map(String::as_str).collect();
    let rows = table.len();

    let mut components = Vec::new();
    for column in &table.columns {
        let numeric = is_numeric_column(table, column);
        let uniques = unique_values(table, column);

        let role = if key_columns.contains(column.as_str()) {
            Role::Dimension
        } else if numeric {
            Role::Measure
        } else {
            let ratio = if rows == 0 {
                0.0
            } else {
                uniques.len() as f64 / rows as f64
            };
            if ratio < DIMENSION_UNIQUE_RATIO {
                Role::Dimension
            } else {
                Role::Attribute
            }
        };
        let dtype = if numeric { DataType::Float } else { DataType::String };

        let mut component = Component::new(column.clone(), role, dtype, role != Role::Attribute);
        component.name = Some(title_case(column));

        if role == Role::Dimension && dtype == DataType::String && uniques.len() <= MAX_LOCAL_CODES
        {
            component.codes = Some(Codelist {
                reference: ArtefactReference::new(agency, codelist_id(column), "1.0")?,
                name: Some(format!("{} Codes", column)),
                codes: uniques
                    .iter()
                    .map(|v| Code {
                        id: v.clone(),
                        name: Some(v.clone()),
                    })
                    .collect(),
            });
        }
        components.push(component);
    }

    tracing::debug!(
        "Inferred {} components for {}:{} from {} rows",
        components.len(),
        agency,
        id,
        rows
    );
    Ok(Schema {
        context: ArtefactKind::DataStructure,
        reference: ArtefactReference::new(agency, id, "1.0")?,
        name: None,
        components,
    })
}

/// Builds a schema from explicitly assigned roles. The time column becomes `TIME_PERIOD`.
pub fn create_schema_from_table(
    table: &Table,
    dimensions: &[&str],
    time_dimension: &str,
    measure: &str,
    attributes: &[&str],
) -> Result<Schema> {
    let missing: Vec<&str> = dimensions
        .iter()
        .chain([time_dimension, measure].iter())
        .chain(attributes.iter())
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        return Err(SdmxError::validation(format!(
            "Columns not found in table: {}",
            missing.join(", ")
        )));
    }

    let dtype_of = |column: &str| {
        if is_numeric_column(table, column) {
            DataType::Float
        } else {
            DataType::String
        }
    };

    let mut components: Vec<Component> = dimensions
        .iter()
        .map(|d| Component::new(*d, Role::Dimension, dtype_of(*d), true))
        .collect();

    let mut time = Component::new(TIME_PERIOD, Role::Dimension, DataType::Period, true);
    time.name = Some("Time period".to_string());
    time.description = Some(TIME_PERIOD_DESCRIPTION.to_string());
    time.concept_urn = Some(TIME_PERIOD_CONCEPT_URN.to_string());
    components.push(time);

    components.push(Component::new(measure, Role::Measure, DataType::Float, true));
    components.extend(
        attributes
            .iter()
            .map(|a| Component::new(*a, Role::Attribute, dtype_of(*a), false)),
    );

    Ok(Schema {
        context: ArtefactKind::DataStructure,
        reference: ArtefactReference::new(DEFAULT_INFERRED_AGENCY, DEFAULT_INFERRED_ID, "1.0")?,
        name: None,
        components,
    })
}
