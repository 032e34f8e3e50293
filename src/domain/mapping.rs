use crate::core::artefact::ArtefactReference;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Prefix marking a multi-value pattern as a regular expression.
pub const REGEX_PREFIX: &str = "regex:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMap {
    pub source: String,
    pub target: String,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_to: Option<NaiveDateTime>,
}

impl ValueMap {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            valid_from: None,
            valid_to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationMap {
    pub id: String,
    pub name: String,
    pub agency: String,
    pub version: String,
    pub description: Option<String>,
    pub maps: Vec<ValueMap>,
}

impl RepresentationMap {
    /// Looks up the target for a source value. The first entry wins.
    pub fn lookup(&self, source: &str) -> Option<&str> {
        self.maps
            .iter()
            .find(|vm| vm.source == source)
            .map(|vm| vm.target.as_str())
    }
}

/// One ordered rule of a multi-column lookup. `sources` line up with the
/// source columns of the owning map; a `regex:` entry must match the whole cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiValueMap {
    pub sources: Vec<String>,
    pub target: String,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_to: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiRepresentationMap {
    pub id: String,
    pub name: String,
    pub agency: String,
    pub version: String,
    pub maps: Vec<MultiValueMap>,
}

/// Constant value written to every row of the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedValueMap {
    pub target: String,
    pub value: String,
}

/// Straight copy of a source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicitComponentMap {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMap {
    pub source: String,
    pub target: String,
    pub values: RepresentationMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiComponentMap {
    pub sources: Vec<String>,
    pub target: String,
    pub values: MultiRepresentationMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingRule {
    Fixed(FixedValueMap),
    Implicit(ImplicitComponentMap),
    Component(ComponentMap),
    MultiComponent(MultiComponentMap),
}

impl MappingRule {
    pub fn target(&self) -> &str {
        match self {
            MappingRule::Fixed(m) => &m.target,
            MappingRule::Implicit(m) => &m.target,
            MappingRule::Component(m) => &m.target,
            MappingRule::MultiComponent(m) => &m.target,
        }
    }

    /// Source columns this rule reads from the input table.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            MappingRule::Fixed(_) => Vec::new(),
            MappingRule::Implicit(m) => vec![m.source.as_str()],
            MappingRule::Component(m) => vec![m.source.as_str()],
            MappingRule::MultiComponent(m) => m.sources.iter().map(String::as_str).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MappingRule::Fixed(_) => "fixed",
            MappingRule::Implicit(_) => "implicit",
            MappingRule::Component(_) => "component",
            MappingRule::MultiComponent(_) => "multi_component",
        }
    }
}

/// Ordered source-to-target rules read from a mapping workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTemplate {
    pub id: String,
    pub agency: String,
    pub version: String,
    pub name: String,
    pub artefact: Option<ArtefactReference>,
    pub rules: Vec<MappingRule>,
}

impl MappingTemplate {
    /// Target fields in first-appearance order.
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !targets.contains(&rule.target()) {
                targets.push(rule.target());
            }
        }
        targets
    }
}
