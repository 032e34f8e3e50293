pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::artefact::{parse_artefact_id, ArtefactKind};
#[cfg(feature = "cli")]
use crate::core::registry::DEFAULT_TIMEOUT_SECS;
#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::model::ValidationMode;
#[cfg(feature = "cli")]
use crate::utils::error::{Result, SdmxError};
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_output_formats, validate_path,
    validate_range, validate_required_field, validate_url, Validate, WORKBOOK_EXTENSIONS,
};

/// Name of the environment variable holding the registry URL of a named environment.
pub fn environment_variable(env: &str) -> String {
    format!("FMR_{}_URL", env.trim().to_uppercase())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, clap::Parser)]
#[command(name = "tidysdmx")]
#[command(about = "Standardize tabular data into an SDMX structure using a mapping template")]
pub struct CliConfig {
    /// Registry SDMX REST root, e.g. https://fmr.example.org/FMR/sdmx/v2/
    #[arg(long, conflicts_with = "env")]
    pub registry_url: Option<String>,

    /// Named registry environment; its host is read from FMR_<ENV>_URL
    #[arg(long)]
    pub env: Option<String>,

    /// Artefact to validate against, e.g. WB:WDI(1.0). Defaults to the template's INFO sheet.
    #[arg(long)]
    pub artefact: Option<String>,

    #[arg(long, default_value = "dataflow", value_parser = parse_kind)]
    pub kind: ArtefactKind,

    #[arg(long)]
    pub template: String,

    #[arg(long)]
    pub input: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "csv")]
    pub output_formats: Vec<String>,

    #[arg(long, default_value = "strict", value_parser = parse_validation)]
    pub validation: ValidationMode,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Bundle every output file into this zip
    #[arg(long)]
    pub zip: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
fn parse_kind(value: &str) -> std::result::Result<ArtefactKind, String> {
    value.parse().map_err(|e: SdmxError| e.to_string())
}

#[cfg(feature = "cli")]
fn parse_validation(value: &str) -> std::result::Result<ValidationMode, String> {
    value.parse().map_err(|e: SdmxError| e.to_string())
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Registry base URL from `--registry-url`, or the host of `--env` with the FMR API path.
    pub fn registry_client(&self) -> Result<crate::core::registry::RegistryClient> {
        use crate::core::registry::RegistryClient;
        let timeout = std::time::Duration::from_secs(self.timeout_seconds);

        if let Some(url) = &self.registry_url {
            return RegistryClient::with_timeout(url, timeout);
        }
        let env = validate_required_field("registry_url or env", &self.env)?;
        let variable = environment_variable(env);
        let host = std::env::var(&variable).map_err(|_| SdmxError::MissingConfigError {
            field: variable.clone(),
        })?;
        RegistryClient::for_environment_with_timeout(&host, timeout)
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn artefact(&self) -> Option<&str> {
        self.artefact.as_deref()
    }

    fn artefact_kind(&self) -> ArtefactKind {
        self.kind
    }

    fn template_path(&self) -> &str {
        &self.template
    }

    fn input_path(&self) -> &str {
        &self.input
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn validation_mode(&self) -> ValidationMode {
        self.validation
    }

    fn compression_filename(&self) -> Option<&str> {
        self.zip.as_deref()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match (&self.registry_url, &self.env) {
            (Some(url), _) => validate_url("registry_url", url)?,
            (None, Some(env)) => validate_non_empty_string("env", env)?,
            (None, None) => {
                validate_required_field("registry_url or env", &self.env)?;
            }
        }

        if let Some(artefact) = &self.artefact {
            parse_artefact_id(artefact)?;
        }

        validate_path("template", &self.template)?;
        validate_file_extension("template", &self.template, WORKBOOK_EXTENSIONS)?;
        validate_path("input", &self.input)?;
        validate_path("output_path", &self.output_path)?;
        validate_output_formats("output_formats", &self.output_formats)?;
        validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;

        if let Some(zip) = &self.zip {
            validate_file_extension("zip", zip, &["zip"])?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> CliConfig {
        let mut full = vec!["tidysdmx", "--template", "map.xlsx", "--input", "data.csv"];
        full.extend_from_slice(args);
        CliConfig::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--registry-url", "https://fmr.example.org/FMR/sdmx/v2/"]);
        assert_eq!(config.kind, ArtefactKind::Dataflow);
        assert_eq!(config.validation, ValidationMode::Strict);
        assert_eq!(config.output_formats, vec!["csv"]);
        assert_eq!(config.timeout_seconds, DEFAULT_TIMEOUT_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "--env",
            "qa",
            "--artefact",
            "WB:WDI(1.0)",
            "--kind",
            "dsd",
            "--validation",
            "filter",
            "--output-formats",
            "csv,json",
        ]);
        assert_eq!(config.kind, ArtefactKind::DataStructure);
        assert_eq!(config.validation_mode(), ValidationMode::Filter);
        assert_eq!(config.output_formats(), &["csv", "json"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--env", "qa", "--artefact", "WB:WDI"])
            .validate()
            .is_err());
        assert!(parse(&["--env", "qa", "--output-formats", "xml"])
            .validate()
            .is_err());
        assert!(CliConfig::try_parse_from([
            "tidysdmx",
            "--template",
            "map.xlsx",
            "--input",
            "data.csv",
            "--validation",
            "lenient"
        ])
        .is_err());
    }

    #[test]
    fn test_registry_client_from_environment() {
        std::env::set_var("FMR_CLITEST_URL", "https://fmr.example.org");
        let config = parse(&["--env", "clitest"]);
        let client = config.registry_client().unwrap();
        assert_eq!(client.base_url(), "https://fmr.example.org/FMR/sdmx/v2/");
        std::env::remove_var("FMR_CLITEST_URL");

        let missing = parse(&["--env", "nowhere"]).registry_client().unwrap_err();
        assert!(matches!(missing, SdmxError::MissingConfigError { .. }));
    }
}
