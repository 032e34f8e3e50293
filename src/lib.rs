pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use core::artefact::{parse_artefact_id, ArtefactKind, ArtefactReference};
pub use core::registry::RegistryClient;
pub use core::template::parse_mapping_template_wb;
pub use core::transform::standardize_output;
pub use core::{etl::StandardizeEngine, pipeline::StandardizePipeline};
pub use utils::error::{Result, SdmxError};

/// Fetches the validation schema of an artefact from the registry at `base_url`.
pub async fn fetch_schema(
    base_url: &str,
    reference: &ArtefactReference,
    kind: ArtefactKind,
) -> Result<domain::schema::Schema> {
    RegistryClient::new(base_url)?
        .fetch_schema(reference, kind)
        .await
}
