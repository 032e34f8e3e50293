use crate::core::artefact::{ArtefactKind, ArtefactReference};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Dimension,
    Measure,
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    Period,
}

impl DataType {
    /// Maps an SDMX text format data type onto the simplified set used here.
    pub fn from_sdmx(data_type: &str) -> Self {
        match data_type {
            "Integer" | "Long" | "Short" | "BigInteger" | "Count" | "InclusiveValueRange"
            | "ExclusiveValueRange" | "Incremental" => DataType::Integer,
            "Decimal" | "Float" | "Double" => DataType::Float,
            "Boolean" => DataType::Boolean,
            "ObservationalTimePeriod" | "StandardTimePeriod" | "BasicTimePeriod"
            | "GregorianTimePeriod" | "GregorianYear" | "GregorianYearMonth" | "GregorianDay"
            | "ReportingTimePeriod" | "ReportingYear" | "ReportingSemester"
            | "ReportingTrimester" | "ReportingQuarter" | "ReportingMonth" | "ReportingWeek"
            | "ReportingDay" | "DateTime" | "TimeRange" | "Month" | "MonthDay" | "Day"
            | "Time" | "Duration" => DataType::Period,
            _ => DataType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codelist {
    pub reference: ArtefactReference,
    pub name: Option<String>,
    pub codes: Vec<Code>,
}

impl Codelist {
    pub fn contains(&self, code_id: &str) -> bool {
        self.codes.iter().any(|code| code.id == code_id)
    }

    pub fn code_ids(&self) -> Vec<String> {
        self.codes.iter().map(|code| code.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub required: bool,
    pub role: Role,
    pub dtype: DataType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub concept_urn: Option<String>,
    pub codes: Option<Codelist>,
    pub facets: Option<Facets>,
}

impl Component {
    pub fn new(id: impl Into<String>, role: Role, dtype: DataType, required: bool) -> Self {
        Self {
            id: id.into(),
            required,
            role,
            dtype,
            name: None,
            description: None,
            concept_urn: None,
            codes: None,
            facets: None,
        }
    }

    pub fn with_codes(mut self, codes: Codelist) -> Self {
        self.codes = Some(codes);
        self
    }

    pub fn is_coded(&self) -> bool {
        self.codes.is_some()
    }
}

/// The validation view of a DSD, Dataflow or Provision Agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub context: ArtefactKind,
    pub reference: ArtefactReference,
    pub name: Option<String>,
    pub components: Vec<Component>,
}

impl Schema {
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn component_ids(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn components_with_role(&self, role: Role) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.role == role)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }
}
