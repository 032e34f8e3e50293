//! SDMX artefact identifiers.
//!
//! Every maintainable artefact is addressed by `agency:id(version)`. The same
//! triple appears inside SDMX URNs, so both forms are parsed here.

use crate::utils::error::{Result, SdmxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const EXPECTED_FORMAT: &str = "expected format 'agency:id(version)'";

/// A validated `agency:id(version)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtefactReference {
    agency: String,
    id: String,
    version: String,
}

impl ArtefactReference {
    pub fn new(
        agency: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let agency = agency.into();
        let id = id.into();
        let version = version.into();
        let display = format!("{}:{}({})", agency, id, version);

        for (segment, value) in [("agency", &agency), ("id", &id), ("version", &version)] {
            if value.is_empty() {
                return Err(SdmxError::parse(
                    &display,
                    format!("{} segment is empty; {}", segment, EXPECTED_FORMAT),
                ));
            }
            if value
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ':' | '(' | ')' | '='))
            {
                return Err(SdmxError::parse(
                    &display,
                    format!("{} segment contains a reserved character", segment),
                ));
            }
        }

        if !is_dotted_numeric(&version) {
            return Err(SdmxError::parse(
                &display,
                format!("version '{}' is not dotted numeric (e.g. 1.0)", version),
            ));
        }

        Ok(Self {
            agency,
            id,
            version,
        })
    }

    pub fn agency(&self) -> &str {
        &self.agency
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// True when `agency`, `id` and `version` all match.
    pub fn matches(&self, agency: &str, id: &str, version: &str) -> bool {
        self.agency == agency && self.id == id && self.version == version
    }
}

impl fmt::Display for ArtefactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.agency, self.id, self.version)
    }
}

impl FromStr for ArtefactReference {
    type Err = SdmxError;

    fn from_str(s: &str) -> Result<Self> {
        parse_artefact_id(s)
    }
}

impl TryFrom<String> for ArtefactReference {
    type Error = SdmxError;

    fn try_from(value: String) -> Result<Self> {
        parse_artefact_id(&value)
    }
}

impl From<ArtefactReference> for String {
    fn from(value: ArtefactReference) -> Self {
        value.to_string()
    }
}

/// The structural artefacts a schema can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtefactKind {
    #[serde(alias = "dsd")]
    DataStructure,
    Dataflow,
    ProvisionAgreement,
}

impl ArtefactKind {
    /// Context segment used by the SDMX REST `schema` resource.
    pub fn as_path(&self) -> &'static str {
        match self {
            ArtefactKind::DataStructure => "datastructure",
            ArtefactKind::Dataflow => "dataflow",
            ArtefactKind::ProvisionAgreement => "provisionagreement",
        }
    }
}

impl fmt::Display for ArtefactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for ArtefactKind {
    type Err = SdmxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "datastructure" | "dsd" => Ok(ArtefactKind::DataStructure),
            "dataflow" => Ok(ArtefactKind::Dataflow),
            "provisionagreement" => Ok(ArtefactKind::ProvisionAgreement),
            _ => Err(SdmxError::parse(
                s,
                "unknown artefact kind; expected datastructure, dataflow or provisionagreement",
            )),
        }
    }
}

/// Parses `agency:id(version)` into an [`ArtefactReference`].
///
/// Surrounding whitespace is ignored. Exactly one `:` and one `(...)`
/// group are accepted, and the group must close the string.
pub fn parse_artefact_id(raw_id: &str) -> Result<ArtefactReference> {
    let raw = raw_id.trim();
    let invalid =
        |message: &str| SdmxError::parse(raw_id, format!("{}; {}", message, EXPECTED_FORMAT));

    let (agency, rest) = raw
        .split_once(':')
        .ok_or_else(|| invalid("missing ':' between agency and id"))?;
    if rest.contains(':') {
        return Err(invalid("more than one ':'"));
    }

    let (id, version) = rest
        .split_once('(')
        .ok_or_else(|| invalid("missing '(version)' segment"))?;
    let version = version
        .strip_suffix(')')
        .ok_or_else(|| invalid("version must be closed by ')' at the end"))?;
    if version.contains(['(', ')']) || id.contains(')') {
        return Err(invalid("unbalanced parentheses"));
    }

    ArtefactReference::new(agency, id, version)
        .map_err(|e| match e {
            SdmxError::ParseError { message, .. } => SdmxError::parse(raw_id, message),
            other => other,
        })
}

/// Deprecated DSD-only parser kept for callers of the old API.
#[deprecated(note = "use parse_artefact_id, which accepts any artefact type")]
pub fn parse_dsd_id(dsd_id: &str) -> Result<(String, String, String)> {
    let reference = parse_artefact_id(dsd_id)?;
    Ok((
        reference.agency().to_string(),
        reference.id().to_string(),
        reference.version().to_string(),
    ))
}

/// A parsed SDMX URN such as
/// `urn:sdmx:org.sdmx.infomodel.conceptscheme.Concept=SDMX:CROSS_DOMAIN_CONCEPTS(2.0).FREQ`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urn {
    pub class: String,
    pub reference: ArtefactReference,
    pub item: Option<String>,
}

pub fn parse_urn(urn: &str) -> Result<Urn> {
    let trimmed = urn.trim();
    let (prefix, body) = trimmed
        .split_once('=')
        .ok_or_else(|| SdmxError::parse(urn, "URN has no '=' separator"))?;
    if !prefix.starts_with("urn:sdmx:") {
        return Err(SdmxError::parse(urn, "URN must start with 'urn:sdmx:'"));
    }
    let class = prefix.rsplit('.').next().unwrap_or(prefix).to_string();

    let close = body
        .rfind(')')
        .ok_or_else(|| SdmxError::parse(urn, "URN has no '(version)' segment"))?;
    let reference = parse_artefact_id(&body[..=close])?;
    let item = match &body[close + 1..] {
        "" => None,
        tail => Some(
            tail.strip_prefix('.')
                .filter(|item| !item.is_empty())
                .ok_or_else(|| SdmxError::parse(urn, "unexpected text after version"))?
                .to_string(),
        ),
    };

    Ok(Urn {
        class,
        reference,
        item,
    })
}

fn is_dotted_numeric(version: &str) -> bool {
    version
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
