use crate::core::Pipeline;
use crate::utils::error::Result;

pub struct StandardizeEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> StandardizeEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Runs extract, transform and load; returns where the output was written.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting standardization");

        let input = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} rows, {} mapping rules, schema: {}",
            input.table.len(),
            input.template.rules.len(),
            input
                .schema
                .as_ref()
                .map(|s| s.reference.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let result = self.pipeline.transform(input).await?;
        tracing::info!(
            "Transformed into {} rows ({} rejected)",
            result.standardized.table.len(),
            result.rejected.len()
        );

        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }
}
