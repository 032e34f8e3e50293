use crate::core::artefact::{ArtefactKind, ArtefactReference};
use crate::domain::model::{ExtractedInput, TransformResult, ValidationMode};
use crate::domain::schema::Schema;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Resolves an artefact reference into its validation schema.
pub trait SchemaSource: Send + Sync {
    fn fetch_schema(
        &self,
        reference: &ArtefactReference,
        kind: ArtefactKind,
    ) -> impl std::future::Future<Output = Result<Schema>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    /// Artefact to validate against; falls back to the template's INFO artefact when `None`.
    fn artefact(&self) -> Option<&str>;
    fn artefact_kind(&self) -> ArtefactKind;
    fn template_path(&self) -> &str;
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn validation_mode(&self) -> ValidationMode;
    /// Zip file name when outputs are bundled.
    fn compression_filename(&self) -> Option<&str>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractedInput>;
    async fn transform(&self, input: ExtractedInput) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
