use crate::core::artefact::{parse_artefact_id, ArtefactKind, ArtefactReference};
use crate::core::sdmx_json;
use crate::domain::ports::SchemaSource;
use crate::domain::schema::Schema;
use crate::utils::error::{Result, SdmxError};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const FMR_API_PATH: &str = "/FMR/sdmx/v2/";
pub const SDMX_JSON_STRUCTURE: &str =
    "application/vnd.sdmx.structure+json;version=2.0.0, application/json;q=0.9";

/// Client for the `schema` resource of an SDMX REST v2 registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    client: Client,
}

impl RegistryClient {
    /// `base_url` is the REST API root, e.g. `https://host/FMR/sdmx/v2/`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| SdmxError::InvalidConfigValueError {
            field: "registry_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    /// Builds a client for a registry host by joining the FMR API path onto it.
    pub fn for_environment(fmr_url: &str) -> Result<Self> {
        Self::for_environment_with_timeout(fmr_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn for_environment_with_timeout(fmr_url: &str, timeout: Duration) -> Result<Self> {
        let host = Url::parse(fmr_url).map_err(|e| SdmxError::InvalidConfigValueError {
            field: "registry_url".to_string(),
            value: fmr_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        let base = host.join(FMR_API_PATH).map_err(|e| SdmxError::InvalidConfigValueError {
            field: "registry_url".to_string(),
            value: fmr_url.to_string(),
            reason: format!("Cannot build API URL: {}", e),
        })?;
        Self::with_timeout(base.as_str(), timeout)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn schema_url(&self, reference: &ArtefactReference, kind: ArtefactKind) -> Result<Url> {
        let path = format!(
            "schema/{}/{}/{}/{}",
            kind.as_path(),
            reference.agency(),
            reference.id(),
            reference.version()
        );
        self.base_url
            .join(&path)
            .map_err(|e| SdmxError::parse(reference.to_string(), e.to_string()))
    }

    /// Fetches and decodes the schema of one artefact. One request, no retries.
    pub async fn fetch_schema(
        &self,
        reference: &ArtefactReference,
        kind: ArtefactKind,
    ) -> Result<Schema> {
        let url = self.schema_url(reference, kind)?;
        tracing::debug!("Making registry request to: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, SDMX_JSON_STRUCTURE)
            .send()
            .await?;
        let status = response.status();
        tracing::debug!("Registry response status: {}", status);

        if status == StatusCode::NOT_FOUND {
            return Err(SdmxError::NotFoundError {
                kind: kind.to_string(),
                reference: reference.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SdmxError::TransportError {
                message: format!("registry returned {} for {}", status, url),
            });
        }

        let body = response.bytes().await?;
        let schema = sdmx_json::decode_schema(&body, reference, kind)?;
        tracing::info!(
            "Fetched {} {} ({} components)",
            kind,
            reference,
            schema.components.len()
        );
        Ok(schema)
    }

    #[deprecated(note = "use fetch_schema with ArtefactKind::DataStructure")]
    pub async fn fetch_dsd_schema(&self, dsd_id: &str) -> Result<Schema> {
        let reference = parse_artefact_id(dsd_id)?;
        self.fetch_schema(&reference, ArtefactKind::DataStructure).await
    }
}

impl SchemaSource for RegistryClient {
    async fn fetch_schema(
        &self,
        reference: &ArtefactReference,
        kind: ArtefactKind,
    ) -> Result<Schema> {
        RegistryClient::fetch_schema(self, reference, kind).await
    }
}
