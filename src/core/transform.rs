//! Standardization of source tables through a mapping template.
//!
//! Rules are applied by kind: fixed values, then implicit copies, then
//! component lookups, then multi-column lookups. Each step returns a new
//! table; the source is never modified.

use crate::core::validation::{code_violations, codelist_ids, partition_rows};
use crate::domain::mapping::{
    ComponentMap, FixedValueMap, ImplicitComponentMap, MappingRule, MappingTemplate,
    MultiComponentMap, REGEX_PREFIX,
};
use crate::domain::model::{StandardizedTable, Table};
use crate::domain::schema::Schema;
use crate::utils::error::{Result, SdmxError};
use regex::Regex;
use serde_json::Value;

const MAX_REPORTED_VIOLATIONS: usize = 5;

fn require_column(table: &Table, column: &str, target: &str) -> Result<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(SdmxError::validation(format!(
            "Source column '{}' for target '{}' not found in input table",
            column, target
        )))
    }
}

pub fn apply_fixed_value_maps<'a, I>(table: &Table, maps: I) -> Table
where
    I: IntoIterator<Item = &'a FixedValueMap>,
{
    let mut result = table.clone();
    for map in maps {
        result.ensure_column(&map.target);
        for record in &mut result.records {
            record
                .data
                .insert(map.target.clone(), Value::String(map.value.clone()));
        }
    }
    result
}

pub fn apply_implicit_component_maps<'a, I>(table: &Table, maps: I) -> Result<Table>
where
    I: IntoIterator<Item = &'a ImplicitComponentMap>,
{
    let mut result = table.clone();
    for map in maps {
        require_column(&result, &map.source, &map.target)?;
        result.ensure_column(&map.target);
        for record in &mut result.records {
            let value = record.data.get(&map.source).cloned().unwrap_or(Value::Null);
            record.data.insert(map.target.clone(), value);
        }
        tracing::debug!("Copied column '{}' into '{}'", map.source, map.target);
    }
    Ok(result)
}

pub fn apply_component_map(table: &Table, map: &ComponentMap) -> Result<Table> {
    require_column(table, &map.source, &map.target)?;

    let mut result = table.clone();
    result.ensure_column(&map.target);
    let mut unmapped = 0;
    for record in &mut result.records {
        let mapped = record
            .text(&map.source)
            .and_then(|value| map.values.lookup(&value))
            .map(|target| Value::String(target.to_string()));
        if mapped.is_none() {
            unmapped += 1;
        }
        record
            .data
            .insert(map.target.clone(), mapped.unwrap_or(Value::Null));
    }

    tracing::debug!(
        "Mapped '{}' -> '{}' using {} pairs",
        map.source,
        map.target,
        map.values.maps.len()
    );
    if unmapped > 0 {
        tracing::debug!("{} values could not be mapped into '{}'", unmapped, map.target);
    }
    Ok(result)
}

enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn compile(pattern: &str) -> Result<Self> {
        match pattern.strip_prefix(REGEX_PREFIX) {
            Some(expr) => Regex::new(&format!("^(?:{})$", expr))
                .map(Matcher::Pattern)
                .map_err(|e| SdmxError::format(format!("invalid pattern '{}': {}", pattern, e))),
            None => Ok(Matcher::Exact(pattern.to_string())),
        }
    }

    // Null cells are treated as the empty string.
    fn is_match(&self, cell: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == cell,
            Matcher::Pattern(re) => re.is_match(cell),
        }
    }
}

/// Ordered lookup over several columns; the first rule whose patterns all match wins.
pub fn apply_multi_component_map(table: &Table, map: &MultiComponentMap) -> Result<Table> {
    let missing: Vec<&str> = map
        .sources
        .iter()
        .filter(|c| !table.has_column(c))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(SdmxError::validation(format!(
            "Source columns for target '{}' not found in input table: {}",
            map.target,
            missing.join(", ")
        )));
    }

    let rules = map
        .values
        .maps
        .iter()
        .map(|vm| {
            let matchers = vm
                .sources
                .iter()
                .map(|p| Matcher::compile(p))
                .collect::<Result<Vec<_>>>()?;
            Ok((matchers, vm.target.as_str()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = table.clone();
    result.ensure_column(&map.target);
    let mut unmapped = 0;
    for record in &mut result.records {
        let cells: Vec<String> = map
            .sources
            .iter()
            .map(|c| record.text(c).unwrap_or_default())
            .collect();
        let mapped = rules
            .iter()
            .find(|(matchers, _)| {
                matchers.len() == cells.len()
                    && matchers.iter().zip(&cells).all(|(m, cell)| m.is_match(cell))
            })
            .map(|(_, target)| Value::String(target.to_string()));
        if mapped.is_none() {
            unmapped += 1;
        }
        record
            .data
            .insert(map.target.clone(), mapped.unwrap_or(Value::Null));
    }

    tracing::debug!(
        "Mapped {:?} -> '{}' using {} ordered rules",
        map.sources,
        map.target,
        rules.len()
    );
    if unmapped > 0 {
        tracing::debug!("{} rows could not be mapped into '{}'", unmapped, map.target);
    }
    Ok(result)
}

/// Applies every rule of the template; source columns stay in the result.
pub fn map_structures(table: &Table, template: &MappingTemplate) -> Result<Table> {
    let mut fixed = Vec::new();
    let mut implicit = Vec::new();
    let mut component = Vec::new();
    let mut multi = Vec::new();
    for rule in &template.rules {
        match rule {
            MappingRule::Fixed(m) => fixed.push(m),
            MappingRule::Implicit(m) => implicit.push(m),
            MappingRule::Component(m) => component.push(m),
            MappingRule::MultiComponent(m) => multi.push(m),
        }
    }

    let mut result = apply_fixed_value_maps(table, fixed.iter().copied());
    if !fixed.is_empty() {
        tracing::debug!("Applied {} fixed value maps", fixed.len());
    }
    result = apply_implicit_component_maps(&result, implicit.iter().copied())?;
    for map in component {
        result = apply_component_map(&result, map)?;
    }
    for map in multi {
        result = apply_multi_component_map(&result, map)?;
    }
    Ok(result)
}

fn output_fields(mapping: &MappingTemplate, schema: Option<&Schema>) -> Result<Vec<String>> {
    let targets = mapping.targets();
    match schema {
        Some(schema) => {
            if let Some(unknown) = targets.iter().find(|t| schema.component(t).is_none()) {
                return Err(SdmxError::validation(format!(
                    "Target field '{}' is not a component of {} {}",
                    unknown, schema.context, schema.reference
                )));
            }
            Ok(schema
                .components
                .iter()
                .filter(|c| targets.contains(&c.id.as_str()))
                .map(|c| c.id.clone())
                .collect())
        }
        None => Ok(targets.iter().map(|t| t.to_string()).collect()),
    }
}

/// Maps `source` into the target structure, keeping only mapped fields.
///
/// With a schema, fields follow the schema's component order, every target must
/// be a schema component and coded values must belong to their code list.
pub fn standardize_output(
    source: &Table,
    mapping: &MappingTemplate,
    schema: Option<&Schema>,
) -> Result<StandardizedTable> {
    let mapped = map_structures(source, mapping)?;
    let fields = output_fields(mapping, schema)?;
    let table = mapped.select(&fields);

    if let Some(schema) = schema {
        let violations = code_violations(&table, &codelist_ids(schema));
        if !violations.is_empty() {
            let examples: Vec<String> = violations
                .iter()
                .take(MAX_REPORTED_VIOLATIONS)
                .map(|v| format!("row {} {}='{}'", v.row + 1, v.column, v.value))
                .collect();
            return Err(SdmxError::validation(format!(
                "{} values are not in their code lists: {}",
                violations.len(),
                examples.join(", ")
            )));
        }
    }

    tracing::info!(
        "Standardized {} rows into {} fields",
        table.len(),
        table.columns.len()
    );
    Ok(StandardizedTable {
        table,
        validated_against: schema.map(|s| s.reference.clone()),
    })
}

/// Like [`standardize_output`], but rows with out-of-list codes are split off
/// instead of failing the run. Returns the kept table and the rejected rows.
pub fn standardize_filtered(
    source: &Table,
    mapping: &MappingTemplate,
    schema: &Schema,
) -> Result<(StandardizedTable, Table)> {
    let mapped = map_structures(source, mapping)?;
    let fields = output_fields(mapping, Some(schema))?;
    let (kept, rejected) = partition_rows(&mapped.select(&fields), &codelist_ids(schema));

    if !rejected.is_empty() {
        tracing::warn!(
            "Dropped {} rows with values outside their code lists",
            rejected.len()
        );
    }
    tracing::info!(
        "Standardized {} rows into {} fields",
        kept.len(),
        kept.columns.len()
    );
    Ok((
        StandardizedTable {
            table: kept,
            validated_against: Some(schema.reference.clone()),
        },
        rejected,
    ))
}
