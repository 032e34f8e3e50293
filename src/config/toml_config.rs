use crate::config::environment_variable;
use crate::core::artefact::{parse_artefact_id, ArtefactKind};
use crate::core::registry::{RegistryClient, DEFAULT_TIMEOUT_SECS};
use crate::core::ConfigProvider;
use crate::domain::model::ValidationMode;
use crate::utils::error::{Result, SdmxError};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_output_formats, validate_path,
    validate_range, validate_required_field, validate_url, Validate, WORKBOOK_EXTENSIONS,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub registry: RegistryConfig,
    pub standardize: StandardizeConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// SDMX REST root used as is; takes precedence over environments.
    pub url: Option<String>,
    pub default_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Registry host; the FMR API path is appended.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizeConfig {
    pub artefact: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: ArtefactKind,
    pub template: String,
    pub input: String,
    #[serde(default)]
    pub validation: ValidationMode,
}

fn default_kind() -> ArtefactKind {
    ArtefactKind::Dataflow
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SdmxError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SdmxError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SdmxError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        self.validate_with_env(None)
    }

    /// Validates the config as used with `env_override`, which stands in for `registry.url`
    /// and `registry.default_env`.
    pub fn validate_with_env(&self, env_override: Option<&str>) -> Result<()> {
        if let Some(env) = env_override {
            validate_non_empty_string("env", env)?;
        } else if let Some(url) = &self.registry.url {
            validate_url("registry.url", url)?;
        } else {
            let env = validate_required_field(
                "registry.url or registry.default_env",
                &self.registry.default_env,
            )?;
            validate_non_empty_string("registry.default_env", env)?;
            if !self.registry.environments.contains_key(env.as_str()) {
                tracing::debug!(
                    "Environment '{}' not in config; {} will be consulted",
                    env,
                    environment_variable(env)
                );
            }
        }
        for (name, env) in &self.registry.environments {
            validate_url(&format!("registry.environments.{}.url", name), &env.url)?;
        }
        if let Some(timeout) = self.registry.timeout_seconds {
            validate_range("registry.timeout_seconds", timeout, 1, 600)?;
        }

        if let Some(artefact) = &self.standardize.artefact {
            parse_artefact_id(artefact)?;
        }
        validate_path("standardize.template", &self.standardize.template)?;
        validate_file_extension(
            "standardize.template",
            &self.standardize.template,
            WORKBOOK_EXTENSIONS,
        )?;
        validate_path("standardize.input", &self.standardize.input)?;

        validate_path("load.output_path", &self.load.output_path)?;
        validate_output_formats("load.output_formats", &self.load.output_formats)?;
        if let Some(compression) = self.load.compression.as_ref().filter(|c| c.enabled) {
            validate_file_extension("load.compression.filename", &compression.filename, &["zip"])?;
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.registry.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Registry host for a named environment: the config table first, then `FMR_<NAME>_URL`.
    pub fn environment_url(&self, env: &str) -> Result<String> {
        if let Some(entry) = self.registry.environments.get(env) {
            return Ok(entry.url.clone());
        }
        let variable = environment_variable(env);
        std::env::var(&variable).map_err(|_| SdmxError::MissingConfigError {
            field: format!("registry.environments.{} or {}", env, variable),
        })
    }

    /// Builds the registry client. `env_override` replaces `default_env` and ignores `url`.
    pub fn registry_client(&self, env_override: Option<&str>) -> Result<RegistryClient> {
        match (env_override, &self.registry.url) {
            (None, Some(url)) => RegistryClient::with_timeout(url, self.timeout()),
            (env, _) => {
                let env = env
                    .or(self.registry.default_env.as_deref())
                    .ok_or_else(|| SdmxError::MissingConfigError {
                        field: "registry.default_env".to_string(),
                    })?;
                let host = self.environment_url(env)?;
                RegistryClient::for_environment_with_timeout(&host, self.timeout())
            }
        }
    }
}

impl ConfigProvider for TomlConfig {
    fn artefact(&self) -> Option<&str> {
        self.standardize.artefact.as_deref()
    }

    fn artefact_kind(&self) -> ArtefactKind {
        self.standardize.kind
    }

    fn template_path(&self) -> &str {
        &self.standardize.template
    }

    fn input_path(&self) -> &str {
        &self.standardize.input
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn validation_mode(&self) -> ValidationMode {
        self.standardize.validation
    }

    fn compression_filename(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[registry]
default_env = "qa"
timeout_seconds = 10

[registry.environments.qa]
url = "https://fmrqa.example.org"

[standardize]
artefact = "WB:WDI(1.0)"
kind = "dsd"
template = "mapping.xlsx"
input = "data.csv"
validation = "filter"

[load]
output_path = "./output"
output_formats = ["csv", "json"]

[load.compression]
enabled = true
filename = "standardized.zip"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.artefact(), Some("WB:WDI(1.0)"));
        assert_eq!(config.artefact_kind(), ArtefactKind::DataStructure);
        assert_eq!(config.validation_mode(), ValidationMode::Filter);
        assert_eq!(config.compression_filename(), Some("standardized.zip"));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());

        let client = config.registry_client(None).unwrap();
        assert_eq!(client.base_url(), "https://fmrqa.example.org/FMR/sdmx/v2/");
    }

    #[test]
    fn test_defaults_and_direct_url() {
        let config = TomlConfig::from_toml_str(
            r#"
[registry]
url = "http://localhost:8080/sdmx/v2"

[standardize]
template = "mapping.xlsx"
input = "data.csv"

[load]
output_path = "./output"
output_formats = ["csv"]
"#,
        )
        .unwrap();

        assert_eq!(config.artefact_kind(), ArtefactKind::Dataflow);
        assert_eq!(config.validation_mode(), ValidationMode::Strict);
        assert_eq!(config.compression_filename(), None);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.validate().is_ok());
        assert_eq!(
            config.registry_client(None).unwrap().base_url(),
            "http://localhost:8080/sdmx/v2/"
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TIDYSDMX_TEST_TEMPLATE", "templates/wdi.xlsx");

        let content = BASIC.replace("mapping.xlsx", "${TIDYSDMX_TEST_TEMPLATE}");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.template_path(), "templates/wdi.xlsx");

        std::env::remove_var("TIDYSDMX_TEST_TEMPLATE");

        let unset = BASIC.replace("mapping.xlsx", "${TIDYSDMX_UNSET_VAR}");
        let config = TomlConfig::from_toml_str(&unset).unwrap();
        assert_eq!(config.template_path(), "${TIDYSDMX_UNSET_VAR}");
    }

    #[test]
    fn test_config_validation() {
        let bad_template = BASIC.replace("mapping.xlsx", "mapping.csv");
        assert!(TomlConfig::from_toml_str(&bad_template)
            .unwrap()
            .validate()
            .is_err());

        let bad_artefact = BASIC.replace("WB:WDI(1.0)", "WB:WDI");
        assert!(TomlConfig::from_toml_str(&bad_artefact)
            .unwrap()
            .validate()
            .is_err());

        let bad_format = BASIC.replace(r#"["csv", "json"]"#, r#"["xml"]"#);
        assert!(TomlConfig::from_toml_str(&bad_format)
            .unwrap()
            .validate()
            .is_err());

        let no_registry = BASIC.replace("default_env = \"qa\"\n", "");
        let err = TomlConfig::from_toml_str(&no_registry)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, SdmxError::MissingConfigError { .. }));

        assert!(TomlConfig::from_toml_str("[registry]\nurl = 1").is_err());
    }

    #[test]
    fn test_env_override_stands_in_for_registry_settings() {
        let no_registry = BASIC.replace("default_env = \"qa\"\n", "");
        let config = TomlConfig::from_toml_str(&no_registry).unwrap();

        assert!(config.validate_config().is_err());
        assert!(config.validate_with_env(Some("qa")).is_ok());
        assert!(config.validate_with_env(Some("  ")).is_err());
        assert_eq!(
            config.registry_client(Some("qa")).unwrap().base_url(),
            "https://fmrqa.example.org/FMR/sdmx/v2/"
        );

        let bad_template = no_registry.replace("mapping.xlsx", "mapping.csv");
        let config = TomlConfig::from_toml_str(&bad_template).unwrap();
        assert!(config.validate_with_env(Some("qa")).is_err());
    }

    #[test]
    fn test_environment_override() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();
        std::env::set_var("FMR_TOMLTEST_URL", "https://fmr.example.org");
        let client = config.registry_client(Some("tomltest")).unwrap();
        assert_eq!(client.base_url(), "https://fmr.example.org/FMR/sdmx/v2/");
        std::env::remove_var("FMR_TOMLTEST_URL");

        assert!(config.registry_client(Some("missing")).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.input_path(), "data.csv");
    }
}
