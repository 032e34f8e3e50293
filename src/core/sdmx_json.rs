use crate::core::artefact::{parse_urn, ArtefactKind, ArtefactReference};
use crate::domain::schema::{Code, Codelist, Component, DataType, Facets, Role, Schema};
use crate::utils::error::{Result, SdmxError};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct StructureMessage {
    pub data: StructureData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureData {
    #[serde(default)]
    pub data_structures: Vec<DataStructureJson>,
    #[serde(default)]
    pub dataflows: Vec<DataflowJson>,
    #[serde(default)]
    pub provision_agreements: Vec<ProvisionAgreementJson>,
    #[serde(default)]
    pub codelists: Vec<CodelistJson>,
    #[serde(default)]
    pub concept_schemes: Vec<ConceptSchemeJson>,
}

/// Identification shared by every maintainable artefact.
#[derive(Debug, Deserialize)]
pub struct Header {
    pub id: String,
    #[serde(rename = "agencyID")]
    pub agency_id: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub name: Option<String>,
    pub names: Option<HashMap<String, String>>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Header {
    fn matches(&self, reference: &ArtefactReference) -> bool {
        reference.matches(&self.agency_id, &self.id, &self.version)
    }

    fn display_name(&self) -> Option<String> {
        localized(&self.name, &self.names)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStructureJson {
    #[serde(flatten)]
    pub header: Header,
    pub data_structure_components: ComponentsJson,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsJson {
    pub dimension_list: DimensionListJson,
    pub measure_list: Option<MeasureListJson>,
    pub attribute_list: Option<AttributeListJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionListJson {
    #[serde(default)]
    pub dimensions: Vec<ComponentJson>,
    /// SDMX-JSON 1.0 list form.
    #[serde(default)]
    pub time_dimensions: Vec<ComponentJson>,
    /// SDMX-JSON 2.0 single time dimension.
    #[serde(default)]
    pub time_dimension: Option<ComponentJson>,
}

// SDMX-JSON 1.0 carries a single primaryMeasure, 2.0 a list of measures.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureListJson {
    #[serde(default)]
    pub measures: Vec<ComponentJson>,
    pub primary_measure: Option<ComponentJson>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeListJson {
    #[serde(default)]
    pub attributes: Vec<ComponentJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentJson {
    pub id: String,
    pub concept_identity: Option<String>,
    pub local_representation: Option<RepresentationJson>,
    pub usage: Option<String>,
    pub assignment_status: Option<String>,
}

impl ComponentJson {
    fn is_mandatory(&self) -> bool {
        self.usage
            .as_deref()
            .map(|u| u.eq_ignore_ascii_case("mandatory"))
            .or_else(|| {
                self.assignment_status
                    .as_deref()
                    .map(|s| s.eq_ignore_ascii_case("mandatory"))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepresentationJson {
    pub enumeration: Option<String>,
    pub format: Option<FormatJson>,
    pub text_format: Option<FormatJson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatJson {
    pub data_type: Option<String>,
    pub text_type: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CodelistJson {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub codes: Vec<CodeJson>,
}

#[derive(Debug, Deserialize)]
pub struct CodeJson {
    pub id: String,
    pub name: Option<String>,
    pub names: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct ConceptSchemeJson {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub concepts: Vec<ConceptJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptJson {
    pub id: String,
    pub name: Option<String>,
    pub names: Option<HashMap<String, String>>,
    pub description: Option<String>,
    pub descriptions: Option<HashMap<String, String>>,
    pub core_representation: Option<RepresentationJson>,
}

#[derive(Debug, Deserialize)]
pub struct DataflowJson {
    #[serde(flatten)]
    pub header: Header,
    pub structure: String,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionAgreementJson {
    #[serde(flatten)]
    pub header: Header,
    pub dataflow: String,
}

fn localized(text: &Option<String>, texts: &Option<HashMap<String, String>>) -> Option<String> {
    text.clone().or_else(|| {
        texts
            .as_ref()
            .and_then(|t| t.get("en").or_else(|| t.values().next()).cloned())
    })
}

/// Decodes a registry structure message into the schema of the requested artefact.
pub fn decode_schema(
    body: &[u8],
    reference: &ArtefactReference,
    kind: ArtefactKind,
) -> Result<Schema> {
    let message: StructureMessage = serde_json::from_slice(body)
        .map_err(|e| SdmxError::format(format!("invalid SDMX-JSON structure message: {}", e)))?;
    schema_from_message(&message.data, reference, kind)
}

pub fn schema_from_message(
    data: &StructureData,
    reference: &ArtefactReference,
    kind: ArtefactKind,
) -> Result<Schema> {
    let not_found = || SdmxError::NotFoundError {
        kind: kind.to_string(),
        reference: reference.to_string(),
    };

    let (name, dsd) = match kind {
        ArtefactKind::DataStructure => {
            let dsd = find_dsd(data, reference).ok_or_else(not_found)?;
            (dsd.header.display_name(), dsd)
        }
        ArtefactKind::Dataflow => {
            let flow = find_dataflow(data, reference).ok_or_else(not_found)?;
            (flow.header.display_name(), dsd_for_dataflow(data, flow)?)
        }
        ArtefactKind::ProvisionAgreement => {
            let agreement = data
                .provision_agreements
                .iter()
                .find(|pa| pa.header.matches(reference))
                .ok_or_else(not_found)?;
            let flow_ref = parse_urn(&agreement.dataflow)?.reference;
            let flow = find_dataflow(data, &flow_ref).ok_or_else(|| {
                SdmxError::format(format!(
                    "dataflow {} used by provision agreement {} is missing from the message",
                    flow_ref, reference
                ))
            })?;
            (agreement.header.display_name(), dsd_for_dataflow(data, flow)?)
        }
    };

    let components = build_components(data, &dsd.data_structure_components)?;
    tracing::debug!(
        "Decoded {} {} with {} components",
        kind,
        reference,
        components.len()
    );

    Ok(Schema {
        context: kind,
        reference: reference.clone(),
        name,
        components,
    })
}

fn find_dsd<'a>(
    data: &'a StructureData,
    reference: &ArtefactReference,
) -> Option<&'a DataStructureJson> {
    data.data_structures
        .iter()
        .find(|dsd| dsd.header.matches(reference))
}

fn find_dataflow<'a>(
    data: &'a StructureData,
    reference: &ArtefactReference,
) -> Option<&'a DataflowJson> {
    data.dataflows.iter().find(|df| df.header.matches(reference))
}

fn dsd_for_dataflow<'a>(
    data: &'a StructureData,
    flow: &DataflowJson,
) -> Result<&'a DataStructureJson> {
    let dsd_ref = parse_urn(&flow.structure)?.reference;
    find_dsd(data, &dsd_ref).ok_or_else(|| {
        SdmxError::format(format!(
            "data structure {} used by dataflow {}:{}({}) is missing from the message",
            dsd_ref, flow.header.agency_id, flow.header.id, flow.header.version
        ))
    })
}

fn build_components(data: &StructureData, list: &ComponentsJson) -> Result<Vec<Component>> {
    let mut components = Vec::new();

    for dim in &list.dimension_list.dimensions {
        components.push(build_component(data, dim, Role::Dimension, true, false)?);
    }
    let dimensions = &list.dimension_list;
    for dim in dimensions.time_dimensions.iter().chain(&dimensions.time_dimension) {
        components.push(build_component(data, dim, Role::Dimension, true, true)?);
    }
    if let Some(measures) = &list.measure_list {
        for measure in &measures.measures {
            components.push(build_component(
                data,
                measure,
                Role::Measure,
                measure.is_mandatory(),
                false,
            )?);
        }
        // The 1.0 primary measure has no usage flag and is always present.
        if let Some(primary) = &measures.primary_measure {
            components.push(build_component(data, primary, Role::Measure, true, false)?);
        }
    }
    if let Some(attributes) = &list.attribute_list {
        for attribute in &attributes.attributes {
            components.push(build_component(
                data,
                attribute,
                Role::Attribute,
                attribute.is_mandatory(),
                false,
            )?);
        }
    }

    Ok(components)
}

fn build_component(
    data: &StructureData,
    json: &ComponentJson,
    role: Role,
    required: bool,
    is_time: bool,
) -> Result<Component> {
    let concept = match &json.concept_identity {
        Some(urn) => find_concept(data, urn)?,
        None => None,
    };

    let representation = json
        .local_representation
        .as_ref()
        .or_else(|| concept.and_then(|c| c.core_representation.as_ref()));

    let mut component = Component::new(json.id.clone(), role, DataType::String, required);
    component.concept_urn = json.concept_identity.clone();
    if let Some(concept) = concept {
        component.name = localized(&concept.name, &concept.names);
        component.description = localized(&concept.description, &concept.descriptions);
    }

    if let Some(representation) = representation {
        if let Some(enumeration) = &representation.enumeration {
            component.codes = Some(find_codelist(data, enumeration, &json.id)?);
        }
        let format = representation
            .format
            .as_ref()
            .or(representation.text_format.as_ref());
        if let Some(format) = format {
            if let Some(data_type) = format.data_type.as_deref().or(format.text_type.as_deref()) {
                component.dtype = DataType::from_sdmx(data_type);
            }
            if format.min_length.is_some() || format.max_length.is_some() {
                component.facets = Some(Facets {
                    min_length: format.min_length,
                    max_length: format.max_length,
                });
            }
        }
    }

    if is_time {
        component.dtype = DataType::Period;
    }

    Ok(component)
}

fn find_concept<'a>(data: &'a StructureData, urn: &str) -> Result<Option<&'a ConceptJson>> {
    let parsed = parse_urn(urn)?;
    let Some(item) = parsed.item else {
        return Ok(None);
    };
    Ok(data
        .concept_schemes
        .iter()
        .filter(|scheme| scheme.header.matches(&parsed.reference))
        .flat_map(|scheme| scheme.concepts.iter())
        .find(|concept| concept.id == item))
}

fn find_codelist(data: &StructureData, urn: &str, component_id: &str) -> Result<Codelist> {
    let reference = parse_urn(urn)?.reference;
    let codelist = data
        .codelists
        .iter()
        .find(|cl| cl.header.matches(&reference))
        .ok_or_else(|| {
            SdmxError::format(format!(
                "codelist {} used by component {} is missing from the message",
                reference, component_id
            ))
        })?;

    Ok(Codelist {
        name: codelist.header.display_name(),
        codes: codelist
            .codes
            .iter()
            .map(|code| Code {
                id: code.id.clone(),
                name: localized(&code.name, &code.names),
            })
            .collect(),
        reference,
    })
}
