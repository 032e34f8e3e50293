//! Mapping template workbooks.
//!
//! A template carries an optional `INFO` sheet (headerless key/value pairs), a
//! required `COMP_MAPPING` sheet (`SOURCE`, `TARGET`, `MAPPING_RULES`) and the
//! value maps used by representation rules, either in a shared `REP_MAPPING`
//! sheet (`S:`/`T:` prefixed columns) or in a sheet named after the target.

use crate::core::artefact::{parse_artefact_id, ArtefactReference};
use crate::core::workbook::{read_workbook, read_workbook_bytes, Sheet, Workbook};
use crate::domain::mapping::{
    ComponentMap, FixedValueMap, ImplicitComponentMap, MappingRule, MappingTemplate,
    MultiComponentMap, MultiRepresentationMap, MultiValueMap, RepresentationMap, ValueMap,
    REGEX_PREFIX,
};
use crate::utils::error::{Result, SdmxError};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::Path;

pub const INFO_SHEET: &str = "INFO";
pub const COMP_MAPPING_SHEET: &str = "COMP_MAPPING";
pub const REP_MAPPING_SHEET: &str = "REP_MAPPING";
pub const DEFAULT_AGENCY: &str = "SDMX";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_TEMPLATE_ID: &str = "WB_STRUCTURE_MAP";

const SECTION_HEADER: &str = "DATA CURATION PROCESS";
const SOURCE_PREFIX: &str = "S:";
const TARGET_PREFIX: &str = "T:";
const RESERVED_SHEET_HEADERS: [&str; 3] = ["target", "valid_from", "valid_to"];

#[derive(Debug, Clone, PartialEq)]
pub struct InfoEntry {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompMappingRow {
    pub source: Option<String>,
    pub target: Option<String>,
    pub rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// `REP_MAPPING` split into its source and target columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RepMapping {
    pub source: Vec<RepColumn>,
    pub target: Vec<RepColumn>,
}

impl RepMapping {
    fn source_names(&self) -> Vec<String> {
        self.source.iter().map(|c| c.name.clone()).collect()
    }

    fn target_names(&self) -> Vec<String> {
        self.target.iter().map(|c| c.name.clone()).collect()
    }

    fn source_column(&self, name: &str) -> Option<&RepColumn> {
        self.source.iter().find(|c| c.name == name)
    }

    fn target_column(&self, name: &str) -> Option<&RepColumn> {
        self.target.iter().find(|c| c.name == name)
    }
}

/// Trimmed cell text; empty cells and pandas-style `nan` count as missing.
fn clean(cell: &Option<String>) -> Option<String> {
    cell.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
        .map(str::to_string)
}

pub fn parse_info_sheet(workbook: &Workbook) -> Result<Vec<InfoEntry>> {
    let sheet = workbook
        .sheet(INFO_SHEET)
        .ok_or_else(|| SdmxError::format(format!("Sheet '{}' not found", INFO_SHEET)))?;

    let mut entries = Vec::new();
    for row in &sheet.rows {
        let cells: Vec<String> = row.iter().filter_map(clean).collect();
        if cells.iter().any(|c| c.eq_ignore_ascii_case(SECTION_HEADER)) {
            continue;
        }
        match cells.as_slice() {
            [key] => entries.push(InfoEntry {
                key: key.clone(),
                value: None,
            }),
            [key, value] => entries.push(InfoEntry {
                key: key.clone(),
                value: Some(value.clone()),
            }),
            _ => {}
        }
    }
    Ok(entries)
}

/// Value of the first INFO entry whose key matches `key`, ignoring case.
pub fn info_value<'a>(entries: &'a [InfoEntry], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|e| e.key.eq_ignore_ascii_case(key))
        .and_then(|e| e.value.as_deref())
}

pub fn parse_comp_mapping_sheet(workbook: &Workbook) -> Result<Vec<CompMappingRow>> {
    let sheet = workbook.sheet(COMP_MAPPING_SHEET).ok_or_else(|| {
        SdmxError::format(format!(
            "Sheet '{}' not found. Available sheets: {:?}",
            COMP_MAPPING_SHEET,
            workbook.sheet_names()
        ))
    })?;

    let headers = sheet.headers();
    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (source, target, rule) = (find("SOURCE"), find("TARGET"), find("MAPPING_RULES"));

    let missing: Vec<&str> = [("SOURCE", source), ("TARGET", target), ("MAPPING_RULES", rule)]
        .iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| *name)
        .collect();
    let (Some(source), Some(target), Some(rule)) = (source, target, rule) else {
        return Err(SdmxError::format(format!(
            "Sheet '{}' is missing required columns: {}",
            COMP_MAPPING_SHEET,
            missing.join(", ")
        )));
    };

    let cell = |row: &[Option<String>], idx: usize| row.get(idx).and_then(clean);
    Ok(sheet
        .data_rows()
        .iter()
        .map(|row| CompMappingRow {
            source: cell(row, source),
            target: cell(row, target),
            rule: cell(row, rule),
        })
        .filter(|r| r.source.is_some() || r.target.is_some() || r.rule.is_some())
        .collect())
}

pub fn parse_rep_mapping_sheet(workbook: &Workbook) -> Result<RepMapping> {
    let sheet = workbook
        .sheet(REP_MAPPING_SHEET)
        .ok_or_else(|| SdmxError::format(format!("Sheet '{}' not found", REP_MAPPING_SHEET)))?;

    let column = |idx: usize, name: &str| RepColumn {
        name: name.trim().to_string(),
        values: sheet
            .data_rows()
            .iter()
            .map(|row| row.get(idx).and_then(clean))
            .collect(),
    };

    let mut source = Vec::new();
    let mut target = Vec::new();
    for (idx, header) in sheet.headers().iter().enumerate() {
        if let Some(name) = header.strip_prefix(SOURCE_PREFIX) {
            source.push(column(idx, name));
        } else if let Some(name) = header.strip_prefix(TARGET_PREFIX) {
            target.push(column(idx, name));
        }
    }

    if source.is_empty() {
        return Err(SdmxError::format(format!(
            "No source columns (prefixed '{}') found in '{}'",
            SOURCE_PREFIX, REP_MAPPING_SHEET
        )));
    }
    if target.is_empty() {
        return Err(SdmxError::format(format!(
            "No target columns (prefixed '{}') found in '{}'",
            TARGET_PREFIX, REP_MAPPING_SHEET
        )));
    }
    Ok(RepMapping { source, target })
}

/// Resolves a business name against column headers: exact match first, then a
/// comparison ignoring case, spaces and underscores that also accepts containment.
pub fn match_column_name(target_name: &str, available_columns: &[String]) -> Result<String> {
    if let Some(exact) = available_columns.iter().find(|c| c.as_str() == target_name) {
        return Ok(exact.clone());
    }

    let normalize = |s: &str| s.replace([' ', '_'], "").to_lowercase();
    let wanted = normalize(target_name);
    if !wanted.is_empty() {
        for column in available_columns {
            let candidate = normalize(column);
            if candidate.is_empty() {
                continue;
            }
            if candidate == wanted || wanted.contains(&candidate) || candidate.contains(&wanted) {
                return Ok(column.clone());
            }
        }
    }

    Err(SdmxError::format(format!(
        "Could not find a column matching '{}'. Available: {:?}",
        target_name, available_columns
    )))
}

/// Metadata seeded from the INFO sheet.
struct TemplateContext {
    agency: String,
    version: String,
    artefact: Option<ArtefactReference>,
}

fn template_context(workbook: &Workbook) -> TemplateContext {
    let mut context = TemplateContext {
        agency: DEFAULT_AGENCY.to_string(),
        version: DEFAULT_VERSION.to_string(),
        artefact: None,
    };
    if workbook.sheet(INFO_SHEET).is_none() {
        return context;
    }

    let entries = match parse_info_sheet(workbook) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Ignoring INFO sheet: {}", e);
            return context;
        }
    };

    let artefact_id = ["dataflow", "dsd"]
        .iter()
        .find_map(|key| info_value(&entries, key));
    match artefact_id.map(parse_artefact_id) {
        Some(Ok(reference)) => {
            context.agency = reference.agency().to_string();
            context.version = reference.version().to_string();
            context.artefact = Some(reference);
        }
        Some(Err(e)) => tracing::warn!("Ignoring INFO artefact: {}", e),
        None => {
            if let Some(agency) = info_value(&entries, "FMR_AGENCY") {
                context.agency = agency.to_string();
            }
        }
    }
    context
}

/// Builds the mapping template from an already loaded workbook.
pub fn build_mapping_template(workbook: &Workbook) -> Result<MappingTemplate> {
    let context = template_context(workbook);
    let rows = parse_comp_mapping_sheet(workbook)?;

    let rep_mapping = match workbook.sheet(REP_MAPPING_SHEET) {
        Some(_) => match parse_rep_mapping_sheet(workbook) {
            Ok(rep) => Some(rep),
            Err(e) => {
                tracing::warn!("Ignoring REP_MAPPING sheet: {}", e);
                None
            }
        },
        None => None,
    };

    let mut rules = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let (Some(target), Some(rule)) = (&row.target, &row.rule) else {
            tracing::warn!(
                "Skipping COMP_MAPPING row {}: target and mapping rule are required",
                idx + 2
            );
            continue;
        };

        let built = build_rule(
            workbook,
            rep_mapping.as_ref(),
            &context,
            row.source.as_deref(),
            target,
            rule,
        )
        .map_err(|e| match e {
            SdmxError::FormatError { message } => SdmxError::format(format!(
                "Error processing mapping for target '{}': {}",
                target, message
            )),
            other => other,
        })?;
        tracing::debug!("Rule for {}: {}", target, built.kind());
        rules.push(built);
    }

    let name_suffix = context
        .artefact
        .as_ref()
        .map(|a| a.to_string())
        .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string());
    tracing::info!("Mapping template has {} rules", rules.len());

    Ok(MappingTemplate {
        id: DEFAULT_TEMPLATE_ID.to_string(),
        agency: context.agency,
        version: context.version,
        name: format!("Structure Map generated for {}", name_suffix),
        artefact: context.artefact,
        rules,
    })
}

fn build_rule(
    workbook: &Workbook,
    rep_mapping: Option<&RepMapping>,
    context: &TemplateContext,
    source: Option<&str>,
    target: &str,
    rule: &str,
) -> Result<MappingRule> {
    let fixed = rule
        .get(..6)
        .filter(|prefix| prefix.eq_ignore_ascii_case("fixed:"))
        .and_then(|_| rule.get(6..));
    if let Some(value) = fixed {
        let value = value.trim();
        if value.is_empty() {
            return Err(SdmxError::format(format!(
                "fixed value cannot be empty in rule '{}'",
                rule
            )));
        }
        return Ok(MappingRule::Fixed(FixedValueMap {
            target: target.to_string(),
            value: value.to_string(),
        }));
    }

    if rule.eq_ignore_ascii_case("implicit") {
        let source = source.ok_or_else(|| {
            SdmxError::format("implicit rule requires a 'SOURCE' component")
        })?;
        return Ok(MappingRule::Implicit(ImplicitComponentMap {
            source: source.to_string(),
            target: target.to_string(),
        }));
    }

    if rule == target {
        // An empty source maps the target column onto itself.
        let sources: Vec<String> = source
            .unwrap_or(target)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        return if sources.len() > 1 {
            let maps = multi_value_maps(workbook, rep_mapping, &sources, target)?;
            Ok(MappingRule::MultiComponent(MultiComponentMap {
                target: target.to_string(),
                values: MultiRepresentationMap {
                    id: format!("MAP_{}", target),
                    name: format!("Mapping for {}", target),
                    agency: context.agency.clone(),
                    version: context.version.clone(),
                    maps,
                },
                sources,
            }))
        } else {
            let source = sources
                .into_iter()
                .next()
                .unwrap_or_else(|| target.to_string());
            let maps = value_maps(workbook, rep_mapping, &source, target)?;
            Ok(MappingRule::Component(ComponentMap {
                values: RepresentationMap {
                    id: format!("MAP_{}", target),
                    name: format!("Mapping for {}", target),
                    agency: context.agency.clone(),
                    version: context.version.clone(),
                    description: None,
                    maps,
                },
                source,
                target: target.to_string(),
            }))
        };
    }

    Err(SdmxError::format(format!("Unknown mapping rule: '{}'", rule)))
}

fn value_maps(
    workbook: &Workbook,
    rep_mapping: Option<&RepMapping>,
    source: &str,
    target: &str,
) -> Result<Vec<ValueMap>> {
    if let Some(rep) = rep_mapping {
        if let Some(maps) = rep_value_maps(rep, source, target)? {
            return Ok(maps);
        }
    }
    if let Some(sheet) = workbook.sheet(target) {
        return sheet_value_maps(sheet);
    }
    Err(SdmxError::format(format!(
        "representation rule needs '{}' columns for '{}' and '{}' or a sheet named '{}'",
        REP_MAPPING_SHEET, source, target, target
    )))
}

/// `Ok(None)` when REP_MAPPING has no columns for this pair.
fn rep_value_maps(rep: &RepMapping, source: &str, target: &str) -> Result<Option<Vec<ValueMap>>> {
    let (Ok(source_name), Ok(target_name)) = (
        match_column_name(source, &rep.source_names()),
        match_column_name(target, &rep.target_names()),
    ) else {
        return Ok(None);
    };
    let (Some(sources), Some(targets)) =
        (rep.source_column(&source_name), rep.target_column(&target_name))
    else {
        return Ok(None);
    };

    let mut maps: Vec<ValueMap> = Vec::new();
    for (s, t) in sources.values.iter().zip(&targets.values) {
        if let (Some(s), Some(t)) = (s, t) {
            let map = ValueMap::new(s.clone(), t.clone());
            if !maps.contains(&map) {
                maps.push(map);
            }
        }
    }

    if maps.is_empty() {
        return Err(SdmxError::format(format!(
            "No valid mapping rows found between source column '{}' and target column '{}'",
            source_name, target_name
        )));
    }
    Ok(Some(maps))
}

/// Columns of a dedicated representation sheet, located by header.
struct ValueSheetColumns {
    target: usize,
    valid_from: Option<usize>,
    valid_to: Option<usize>,
}

fn value_sheet_columns(sheet: &Sheet) -> Result<ValueSheetColumns> {
    let headers = sheet.headers();
    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let target = find("target").ok_or_else(|| {
        SdmxError::format(format!("sheet '{}' has no 'target' column", sheet.name))
    })?;
    Ok(ValueSheetColumns {
        target,
        valid_from: find("valid_from"),
        valid_to: find("valid_to"),
    })
}

fn sheet_value_maps(sheet: &Sheet) -> Result<Vec<ValueMap>> {
    let headers = sheet.headers();
    let source = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("source"))
        .ok_or_else(|| {
            SdmxError::format(format!("sheet '{}' has no 'source' column", sheet.name))
        })?;
    let columns = value_sheet_columns(sheet)?;

    let mut maps = Vec::new();
    for row in sheet.data_rows() {
        let cell = |idx: usize| row.get(idx).and_then(clean);
        let (Some(s), Some(t)) = (cell(source), cell(columns.target)) else {
            continue;
        };
        maps.push(ValueMap {
            source: s,
            target: t,
            valid_from: parse_validity(columns.valid_from.and_then(cell))?,
            valid_to: parse_validity(columns.valid_to.and_then(cell))?,
        });
    }

    if maps.is_empty() {
        return Err(SdmxError::format(format!(
            "No valid mapping rows found between 'source' and 'target' in sheet '{}'",
            sheet.name
        )));
    }
    Ok(maps)
}

fn multi_value_maps(
    workbook: &Workbook,
    rep_mapping: Option<&RepMapping>,
    sources: &[String],
    target: &str,
) -> Result<Vec<MultiValueMap>> {
    let from_rep = rep_mapping.and_then(|rep| rep_multi_value_maps(rep, sources, target));
    let maps = if let Some(maps) = from_rep {
        maps
    } else if let Some(sheet) = workbook.sheet(target) {
        sheet_multi_value_maps(sheet, sources)?
    } else {
        return Err(SdmxError::format(format!(
            "multi-column rule needs '{}' columns for {:?} and '{}' or a sheet named '{}'",
            REP_MAPPING_SHEET, sources, target, target
        )));
    };

    for map in &maps {
        for pattern in &map.sources {
            if let Some(expr) = pattern.strip_prefix(REGEX_PREFIX) {
                Regex::new(expr).map_err(|e| {
                    SdmxError::format(format!("invalid pattern '{}': {}", pattern, e))
                })?;
            }
        }
    }
    Ok(maps)
}

fn rep_multi_value_maps(
    rep: &RepMapping,
    sources: &[String],
    target: &str,
) -> Option<Vec<MultiValueMap>> {
    let source_names = rep.source_names();
    let columns: Vec<&RepColumn> = sources
        .iter()
        .map(|s| {
            match_column_name(s, &source_names)
                .ok()
                .and_then(|name| rep.source_column(&name))
        })
        .collect::<Option<Vec<_>>>()?;
    let target_name = match_column_name(target, &rep.target_names()).ok()?;
    let targets = rep.target_column(&target_name)?;

    let mut maps: Vec<MultiValueMap> = Vec::new();
    for (row, t) in targets.values.iter().enumerate() {
        let Some(t) = t else { continue };
        let map = MultiValueMap {
            sources: columns
                .iter()
                .map(|c| c.values.get(row).cloned().flatten().unwrap_or_default())
                .collect(),
            target: t.clone(),
            valid_from: None,
            valid_to: None,
        };
        if !maps.contains(&map) {
            maps.push(map);
        }
    }
    Some(maps)
}

fn sheet_multi_value_maps(sheet: &Sheet, sources: &[String]) -> Result<Vec<MultiValueMap>> {
    let headers = sheet.headers();
    let candidates: Vec<String> = headers
        .iter()
        .filter(|h| !RESERVED_SHEET_HEADERS.iter().any(|r| h.eq_ignore_ascii_case(r)))
        .cloned()
        .collect();
    let source_idx = sources
        .iter()
        .map(|s| {
            let name = match_column_name(s, &candidates)?;
            headers
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| SdmxError::format(format!("column '{}' not found", name)))
        })
        .collect::<Result<Vec<usize>>>()?;
    let columns = value_sheet_columns(sheet)?;

    let mut maps = Vec::new();
    for row in sheet.data_rows() {
        let cell = |idx: usize| row.get(idx).and_then(clean);
        let Some(t) = cell(columns.target) else {
            continue;
        };
        maps.push(MultiValueMap {
            sources: source_idx
                .iter()
                .map(|idx| cell(*idx).unwrap_or_default())
                .collect(),
            target: t,
            valid_from: parse_validity(columns.valid_from.and_then(cell))?,
            valid_to: parse_validity(columns.valid_to.and_then(cell))?,
        });
    }
    Ok(maps)
}

fn parse_validity(value: Option<String>) -> Result<Option<NaiveDateTime>> {
    let Some(value) = value else {
        return Ok(None);
    };
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&value, format) {
            return Ok(Some(parsed));
        }
    }
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Some)
        .ok_or_else(|| SdmxError::format(format!("invalid validity date '{}'", value)))
}

/// Builds a template from workbook file contents, e.g. bytes served by a `Storage`.
pub fn parse_mapping_template_bytes(bytes: Vec<u8>) -> Result<MappingTemplate> {
    let workbook = read_workbook_bytes(bytes)?;
    build_mapping_template(&workbook)
}

/// Reads a mapping workbook from disk and builds its template.
pub fn parse_mapping_template_wb<P: AsRef<Path>>(path: P) -> Result<MappingTemplate> {
    let workbook = read_workbook(&path)?;
    let template = build_mapping_template(&workbook)?;
    tracing::info!(
        "Loaded mapping template from {} ({} rules)",
        path.as_ref().display(),
        template.rules.len()
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workbook::Sheet;

    fn comp_mapping(rows: &[&[&str]]) -> Sheet {
        let mut all: Vec<&[&str]> = vec![&["SOURCE", "TARGET", "MAPPING_RULES"]];
        all.extend_from_slice(rows);
        Sheet::from_strs("COMP_MAPPING", &all)
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_info_sheet_keeps_pairs_and_single_keys() {
        let wb = Workbook::new(vec![Sheet::from_strs(
            "INFO",
            &[
                &["Dataset_ID", "WB_ASPIRE"],
                &["DATA CURATION PROCESS", "Some Description"],
                &["OnlyOne"],
                &["Key", "Value", "Extra"],
                &["", "  Key2 ", "nan", "Value2\t"],
                &["", "", ""],
            ],
        )]);

        let entries = parse_info_sheet(&wb).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key, "Dataset_ID");
        assert_eq!(entries[0].value.as_deref(), Some("WB_ASPIRE"));
        assert_eq!(entries[1].key, "OnlyOne");
        assert_eq!(entries[1].value, None);
        assert_eq!(entries[2].key, "Key2");
        assert_eq!(entries[2].value.as_deref(), Some("Value2"));
    }

    #[test]
    fn test_info_sheet_missing() {
        let err = parse_info_sheet(&Workbook::default()).unwrap_err();
        assert!(err.to_string().contains("Sheet 'INFO' not found"));
    }

    #[test]
    fn test_comp_mapping_headers_are_case_insensitive() {
        let wb = Workbook::new(vec![Sheet::from_strs(
            "comp_mapping",
            &[
                &["Source", "Target", "Mapping_Rules", ""],
                &["Series code", "INDICATOR", "INDICATOR"],
                &["", "FREQ", "fixed:A"],
                &["", "", ""],
            ],
        )]);

        let rows = parse_comp_mapping_sheet(&wb).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source.as_deref(), Some("Series code"));
        assert_eq!(rows[1].source, None);
        assert_eq!(rows[1].rule.as_deref(), Some("fixed:A"));
    }

    #[test]
    fn test_comp_mapping_missing_column() {
        let wb = Workbook::new(vec![Sheet::from_strs(
            "COMP_MAPPING",
            &[&["SOURCE", "TARGET"], &["A", "B"]],
        )]);
        let err = parse_comp_mapping_sheet(&wb).unwrap_err();
        match err {
            SdmxError::FormatError { message } => {
                assert!(message.contains("missing required columns"));
                assert!(message.contains("MAPPING_RULES"));
            }
            other => panic!("expected FormatError, got {:?}", other),
        }
    }

    #[test]
    fn test_rep_mapping_splits_prefixed_columns() {
        let wb = Workbook::new(vec![Sheet::from_strs(
            "REP_MAPPING",
            &[
                &["S:Series", "S:Name", "T:Indicator", "Notes"],
                &["A", "Alpha", "IND_A", "ignore"],
                &["B", "Beta", "IND_B", "ignore"],
            ],
        )]);

        let rep = parse_rep_mapping_sheet(&wb).unwrap();
        assert_eq!(rep.source_names(), vec!["Series", "Name"]);
        assert_eq!(rep.target_names(), vec!["Indicator"]);
        assert_eq!(rep.target[0].values[1].as_deref(), Some("IND_B"));
    }

    #[test]
    fn test_rep_mapping_requires_both_sides() {
        let no_source = Workbook::new(vec![Sheet::from_strs(
            "REP_MAPPING",
            &[&["T:Indicator", "Other"]],
        )]);
        assert!(parse_rep_mapping_sheet(&no_source)
            .unwrap_err()
            .to_string()
            .contains("No source columns"));

        let no_target = Workbook::new(vec![Sheet::from_strs(
            "REP_MAPPING",
            &[&["S:Series", "Other"]],
        )]);
        assert!(parse_rep_mapping_sheet(&no_target)
            .unwrap_err()
            .to_string()
            .contains("No target columns"));
    }

    #[test]
    fn test_match_column_name() {
        let available = columns(&[
            "INDICATOR_CODE",
            "Time Period",
            "REF AREA",
            "OBS_VALUE_CLEAN",
            "ShortName",
            "LONG_NAME_TEST",
        ]);

        assert_eq!(match_column_name("REF AREA", &available).unwrap(), "REF AREA");
        assert_eq!(match_column_name("indicatorcode", &available).unwrap(), "INDICATOR_CODE");
        assert_eq!(match_column_name("RefArea", &available).unwrap(), "REF AREA");
        assert_eq!(
            match_column_name("The Short Name Field", &available).unwrap(),
            "ShortName"
        );
        assert_eq!(match_column_name("Long", &available).unwrap(), "LONG_NAME_TEST");
        assert_eq!(match_column_name("  Time Period  ", &available).unwrap(), "Time Period");

        let err = match_column_name("Totally Different Name", &available).unwrap_err();
        assert!(err.to_string().contains("Could not find a column"));
        assert!(match_column_name("Any Name", &[]).is_err());
    }

    #[test]
    fn test_build_template_with_all_rule_kinds() {
        let wb = Workbook::new(vec![
            Sheet::from_strs(
                "INFO",
                &[&["dataflow", "WB:WDI(2.1)"], &["FMR_AGENCY", "IGNORED"]],
            ),
            comp_mapping(&[
                &["", "FREQ", "fixed:A"],
                &["year", "TIME_PERIOD", "implicit"],
                &["Series code", "INDICATOR", "INDICATOR"],
                &["country, currency", "REF_AREA", "REF_AREA"],
                &["", "UNIT", ""],
            ]),
            Sheet::from_strs(
                "REP_MAPPING",
                &[
                    &["S:Series", "T:Indicator"],
                    &["SP.POP", "POP"],
                    &["SP.POP", "POP"],
                    &["NY.GDP", "GDP"],
                ],
            ),
            Sheet::from_strs(
                "REF_AREA",
                &[
                    &["country", "currency", "target", "valid_from", "valid_to"],
                    &["DE", "EUR", "DEU", "", ""],
                    &["regex:^A.*", "", "ARG", "2020-01-01", "2024-12-31 00:00:00"],
                ],
            ),
        ]);

        let template = build_mapping_template(&wb).unwrap();
        assert_eq!(template.agency, "WB");
        assert_eq!(template.version, "2.1");
        assert_eq!(template.artefact.as_ref().unwrap().to_string(), "WB:WDI(2.1)");
        assert_eq!(template.name, "Structure Map generated for WB:WDI(2.1)");
        assert_eq!(template.rules.len(), 4);
        assert_eq!(
            template.targets(),
            vec!["FREQ", "TIME_PERIOD", "INDICATOR", "REF_AREA"]
        );

        match &template.rules[2] {
            MappingRule::Component(ComponentMap { source, values, .. }) => {
                assert_eq!(source, "Series code");
                assert_eq!(values.id, "MAP_INDICATOR");
                assert_eq!(values.maps.len(), 2);
                assert_eq!(values.lookup("NY.GDP"), Some("GDP"));
            }
            other => panic!("expected component rule, got {:?}", other),
        }

        match &template.rules[3] {
            MappingRule::MultiComponent(MultiComponentMap { sources, values, .. }) => {
                assert_eq!(sources, &vec!["country".to_string(), "currency".to_string()]);
                assert_eq!(values.maps.len(), 2);
                assert_eq!(values.maps[1].sources, vec!["regex:^A.*", ""]);
                assert!(values.maps[1].valid_from.is_some());
                assert!(values.maps[1].valid_to.is_some());
            }
            other => panic!("expected multi-component rule, got {:?}", other),
        }
    }

    #[test]
    fn test_dedicated_sheet_and_source_inference() {
        let wb = Workbook::new(vec![
            comp_mapping(&[&["", "T3_REP", "T3_REP"], &["SRC_4", "T4_REP", "T4_REP"]]),
            Sheet::from_strs(
                "T3_REP",
                &[&["source", "target", "valid_from", "valid_to"], &["X", "Y", "", ""]],
            ),
            Sheet::from_strs(
                "T4_REP",
                &[&["source", "target", "valid_from", "valid_to"], &["S1", "T1", "", ""]],
            ),
        ]);

        let template = build_mapping_template(&wb).unwrap();
        assert_eq!(template.agency, DEFAULT_AGENCY);
        assert_eq!(template.version, DEFAULT_VERSION);
        assert!(template.artefact.is_none());

        match &template.rules[0] {
            MappingRule::Component(ComponentMap { source, values, .. }) => {
                assert_eq!(source, "T3_REP");
                assert_eq!(values.lookup("X"), Some("Y"));
            }
            other => panic!("expected component rule, got {:?}", other),
        }
        match &template.rules[1] {
            MappingRule::Component(ComponentMap { source, values, .. }) => {
                assert_eq!(source, "SRC_4");
                assert_eq!(values.lookup("S1"), Some("T1"));
            }
            other => panic!("expected component rule, got {:?}", other),
        }
    }

    #[test]
    fn test_fmr_agency_fallback_and_bad_artefact() {
        let with_agency = Workbook::new(vec![
            Sheet::from_strs("INFO", &[&["FMR_AGENCY", "IMF"]]),
            comp_mapping(&[&["", "FREQ", "fixed:A"]]),
        ]);
        assert_eq!(build_mapping_template(&with_agency).unwrap().agency, "IMF");

        let bad_artefact = Workbook::new(vec![
            Sheet::from_strs("INFO", &[&["dsd", "not-an-id"]]),
            comp_mapping(&[&["", "FREQ", "fixed:A"]]),
        ]);
        let template = build_mapping_template(&bad_artefact).unwrap();
        assert_eq!(template.agency, DEFAULT_AGENCY);
        assert!(template.artefact.is_none());
    }

    #[test]
    fn test_rule_errors_are_prefixed_with_target() {
        let unknown = Workbook::new(vec![comp_mapping(&[&["", "T_BAD", "unknown_type"]])]);
        let message = build_mapping_template(&unknown).unwrap_err().to_string();
        assert!(message.contains("Unknown mapping rule"));
        assert!(message.contains("T_BAD"));

        let empty_fixed = Workbook::new(vec![comp_mapping(&[&["", "FREQ", "fixed: "]])]);
        assert!(build_mapping_template(&empty_fixed)
            .unwrap_err()
            .to_string()
            .contains("cannot be empty"));

        let implicit = Workbook::new(vec![comp_mapping(&[&["", "TIME_PERIOD", "implicit"]])]);
        assert!(build_mapping_template(&implicit)
            .unwrap_err()
            .to_string()
            .contains("requires a 'SOURCE'"));

        let no_values = Workbook::new(vec![comp_mapping(&[&["code", "INDICATOR", "INDICATOR"]])]);
        assert!(matches!(
            build_mapping_template(&no_values).unwrap_err(),
            SdmxError::FormatError { .. }
        ));
    }

    #[test]
    fn test_dedicated_sheet_without_pairs_is_format_error() {
        let wb = Workbook::new(vec![
            comp_mapping(&[&["src", "X", "X"]]),
            Sheet::from_strs("X", &[&["source", "target"], &["a", ""], &["", "b"]]),
        ]);
        let err = build_mapping_template(&wb).unwrap_err();
        match err {
            SdmxError::FormatError { message } => {
                assert!(message.contains("No valid mapping rows"));
                assert!(message.contains("'X'"));
            }
            other => panic!("expected FormatError, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_sheet_sources_never_match_reserved_headers() {
        let wb = Workbook::new(vec![
            comp_mapping(&[&["from, to", "ROUTE", "ROUTE"]]),
            Sheet::from_strs(
                "ROUTE",
                &[
                    &["from_city", "to_city", "target", "valid_from", "valid_to"],
                    &["Paris", "Rome", "PR", "", ""],
                ],
            ),
        ]);
        let template = build_mapping_template(&wb).unwrap();
        match &template.rules[0] {
            MappingRule::MultiComponent(MultiComponentMap { values, .. }) => {
                assert_eq!(values.maps[0].sources, vec!["Paris", "Rome"]);
                assert_eq!(values.maps[0].target, "PR");
            }
            other => panic!("expected multi-component rule, got {:?}", other),
        }

        let only_reserved = Workbook::new(vec![
            comp_mapping(&[&["from, to", "ROUTE", "ROUTE"]]),
            Sheet::from_strs("ROUTE", &[&["target", "valid_from", "valid_to"], &["PR", "", ""]]),
        ]);
        assert!(build_mapping_template(&only_reserved).is_err());
    }

    #[test]
    fn test_template_from_bytes_requires_a_workbook() {
        let err = parse_mapping_template_bytes(b"SOURCE,TARGET\n".to_vec()).unwrap_err();
        assert!(matches!(err, SdmxError::WorkbookError(_)));
    }

    #[test]
    fn test_invalid_regex_pattern_is_rejected() {
        let wb = Workbook::new(vec![
            comp_mapping(&[&["a, b", "X", "X"]]),
            Sheet::from_strs("X", &[&["a", "b", "target"], &["regex:([", "1", "Y"]]),
        ]);
        let message = build_mapping_template(&wb).unwrap_err().to_string();
        assert!(message.contains("invalid pattern"));
    }

    #[test]
    fn test_invalid_validity_date() {
        let wb = Workbook::new(vec![
            comp_mapping(&[&["src", "X", "X"]]),
            Sheet::from_strs("X", &[&["source", "target", "valid_from"], &["a", "b", "soon"]]),
        ]);
        assert!(build_mapping_template(&wb)
            .unwrap_err()
            .to_string()
            .contains("invalid validity date"));
    }
}
