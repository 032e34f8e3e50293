use crate::core::artefact::parse_artefact_id;
use crate::core::template::parse_mapping_template_bytes;
use crate::core::transform::{standardize_filtered, standardize_output};
use crate::core::validation::check_mandatory;
use crate::core::{ConfigProvider, Pipeline, SchemaSource, Storage, Table, TransformResult};
use crate::domain::model::{ExtractedInput, ValidationMode};
use crate::utils::error::{Result, SdmxError};
use std::io::Write;
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

pub const STANDARDIZED_STEM: &str = "standardized";
pub const REJECTED_FILE: &str = "rejected.csv";

/// Reads a source CSV through a mapping template and writes the standardized table.
pub struct StandardizePipeline<S: Storage, C: ConfigProvider, R: SchemaSource> {
    storage: S,
    config: C,
    schemas: R,
}

impl<S: Storage, C: ConfigProvider, R: SchemaSource> StandardizePipeline<S, C, R> {
    pub fn new(storage: S, config: C, schemas: R) -> Self {
        Self {
            storage,
            config,
            schemas,
        }
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    fn output_files(&self, result: &TransformResult) -> Result<Vec<(String, Vec<u8>)>> {
        let mut files = Vec::new();
        for format in self.config.output_formats() {
            let name = format!("{}.{}", STANDARDIZED_STEM, format);
            let data = match format.as_str() {
                "csv" => result.csv_output.clone().into_bytes(),
                "tsv" => result.tsv_output.clone().into_bytes(),
                "json" => serde_json::to_vec_pretty(&result.standardized)?,
                other => {
                    tracing::warn!("Skipping unsupported output format: {}", other);
                    continue;
                }
            };
            files.push((name, data));
        }
        if !result.rejected.is_empty() {
            files.push((REJECTED_FILE.to_string(), result.rejected.to_csv()?.into_bytes()));
        }
        Ok(files)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, R: SchemaSource> Pipeline for StandardizePipeline<S, C, R> {
    async fn extract(&self) -> Result<ExtractedInput> {
        tracing::debug!("Reading input table: {}", self.config.input_path());
        let bytes = self.storage.read_file(self.config.input_path()).await?;
        let table = Table::from_csv_bytes(&bytes)?;

        tracing::debug!("Reading mapping template: {}", self.config.template_path());
        let workbook = self.storage.read_file(self.config.template_path()).await?;
        let template = tokio::task::spawn_blocking(move || parse_mapping_template_bytes(workbook))
            .await
            .map_err(|e| SdmxError::ConfigError {
                message: format!("template reader task failed: {}", e),
            })??;
        tracing::info!(
            "Loaded mapping template from {} ({} rules)",
            self.config.template_path(),
            template.rules.len()
        );

        let reference = match self.config.artefact() {
            Some(raw) => Some(parse_artefact_id(raw)?),
            None => template.artefact.clone(),
        };
        let schema = match reference {
            Some(reference) => {
                let kind = self.config.artefact_kind();
                tracing::debug!("Fetching schema for {} {}", kind, reference);
                Some(self.schemas.fetch_schema(&reference, kind).await?)
            }
            None => {
                tracing::warn!(
                    "No artefact configured or found in template; output is not validated"
                );
                None
            }
        };

        Ok(ExtractedInput {
            table,
            template,
            schema,
        })
    }

    async fn transform(&self, input: ExtractedInput) -> Result<TransformResult> {
        let schema = input.schema.as_ref();
        let (standardized, rejected) = match (self.config.validation_mode(), schema) {
            (ValidationMode::Filter, Some(schema)) => {
                standardize_filtered(&input.table, &input.template, schema)?
            }
            _ => {
                let standardized = standardize_output(&input.table, &input.template, schema)?;
                let rejected = Table::new(standardized.table.columns.clone());
                (standardized, rejected)
            }
        };

        if let Some(schema) = schema {
            if let Err(e) = check_mandatory(&standardized.table, schema) {
                tracing::warn!("{}", e);
            }
        }

        Ok(TransformResult {
            csv_output: standardized.table.to_csv()?,
            tsv_output: standardized.table.to_tsv()?,
            standardized,
            rejected,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let files = self.output_files(&result)?;

        let Some(zip_name) = self.config.compression_filename() else {
            for (name, data) in &files {
                tracing::debug!("Writing {} ({} bytes)", name, data.len());
                self.storage.write_file(&self.output_file(name), data).await?;
            }
            return Ok(self.config.output_path().to_string());
        };

        tracing::debug!("Creating ZIP file with {} files", files.len());
        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &files {
                zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                zip.write_all(data)?;
            }
            zip.finish()?.into_inner()
        };

        let output_path = self.output_file(zip_name);
        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.storage.write_file(&output_path, &zip_data).await?;
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artefact::{ArtefactKind, ArtefactReference};
    use crate::domain::schema::{Code, Codelist, Component, DataType, Role, Schema};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        /// Serves `input.csv` and the standard `template.xlsx`.
        fn with_input(data: &str) -> Self {
            let mut files = HashMap::new();
            files.insert("input.csv".to_string(), data.as_bytes().to_vec());
            files.insert(TEMPLATE.to_string(), template_bytes());
            Self {
                files: Arc::new(Mutex::new(files)),
            }
        }

        async fn remove_file(&self, path: &str) {
            self.files.lock().await.remove(path);
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                SdmxError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        artefact: Option<String>,
        template_path: String,
        output_formats: Vec<String>,
        validation: ValidationMode,
        compression: Option<String>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                artefact: Some("WB:FLOW(1.0)".to_string()),
                template_path: TEMPLATE.to_string(),
                output_formats: vec!["csv".to_string(), "tsv".to_string()],
                validation: ValidationMode::Strict,
                compression: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn artefact(&self) -> Option<&str> {
            self.artefact.as_deref()
        }

        fn artefact_kind(&self) -> ArtefactKind {
            ArtefactKind::Dataflow
        }

        fn template_path(&self) -> &str {
            &self.template_path
        }

        fn input_path(&self) -> &str {
            "input.csv"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn validation_mode(&self) -> ValidationMode {
            self.validation
        }

        fn compression_filename(&self) -> Option<&str> {
            self.compression.as_deref()
        }
    }

    struct StaticSchema(Schema);

    impl SchemaSource for StaticSchema {
        async fn fetch_schema(
            &self,
            reference: &ArtefactReference,
            kind: ArtefactKind,
        ) -> Result<Schema> {
            if *reference == self.0.reference {
                Ok(self.0.clone())
            } else {
                Err(SdmxError::NotFoundError {
                    kind: kind.to_string(),
                    reference: reference.to_string(),
                })
            }
        }
    }

    fn flow_schema() -> Schema {
        let areas = Codelist {
            reference: ArtefactReference::new("WB", "CL_AREA", "1.0").unwrap(),
            name: None,
            codes: ["AR", "UY"]
                .iter()
                .map(|c| Code {
                    id: c.to_string(),
                    name: None,
                })
                .collect(),
        };
        Schema {
            context: ArtefactKind::Dataflow,
            reference: ArtefactReference::new("WB", "FLOW", "1.0").unwrap(),
            name: None,
            components: vec![
                Component::new("REF_AREA", Role::Dimension, DataType::String, true)
                    .with_codes(areas),
                Component::new("TIME_PERIOD", Role::Dimension, DataType::Period, true),
                Component::new("OBS_VALUE", Role::Measure, DataType::Float, true),
            ],
        }
    }

    const INPUT: &str = "year,country,value\n2020,AR,1.5\n2021,BR,2\n";

    const TEMPLATE: &str = "templates/template.xlsx";

    fn template_bytes() -> Vec<u8> {
        let rows: &[&[&str]] = &[
            &["SOURCE", "TARGET", "MAPPING_RULES"],
            &["year", "TIME_PERIOD", "implicit"],
            &["country", "REF_AREA", "implicit"],
            &["value", "OBS_VALUE", "implicit"],
        ];
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("COMP_MAPPING").unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *cell).unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[tokio::test]
    async fn test_extract_reads_input_template_and_schema() {
        let config = MockConfig::new();
        let pipeline = StandardizePipeline::new(
            MockStorage::with_input(INPUT),
            config,
            StaticSchema(flow_schema()),
        );

        let input = pipeline.extract().await.unwrap();
        assert_eq!(input.table.len(), 2);
        assert_eq!(input.template.rules.len(), 3);
        assert_eq!(
            input.schema.unwrap().reference.to_string(),
            "WB:FLOW(1.0)"
        );
    }

    #[tokio::test]
    async fn test_template_is_read_through_storage() {
        let storage = MockStorage::with_input(INPUT);
        let pipeline = StandardizePipeline::new(
            storage.clone(),
            MockConfig::new(),
            StaticSchema(flow_schema()),
        );
        assert!(pipeline.extract().await.is_ok());

        storage.remove_file(TEMPLATE).await;
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, SdmxError::IoError(_)));
        assert!(err.to_string().contains(TEMPLATE));
    }

    #[tokio::test]
    async fn test_extract_unknown_artefact_is_not_found() {
        let mut config = MockConfig::new();
        config.artefact = Some("WB:OTHER(2.0)".to_string());
        let pipeline = StandardizePipeline::new(
            MockStorage::with_input(INPUT),
            config,
            StaticSchema(flow_schema()),
        );

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, SdmxError::NotFoundError { .. }));
    }

    #[tokio::test]
    async fn test_strict_mode_fails_on_invalid_codes() {
        let pipeline = StandardizePipeline::new(
            MockStorage::with_input(INPUT),
            MockConfig::new(),
            StaticSchema(flow_schema()),
        );

        let input = pipeline.extract().await.unwrap();
        let err = pipeline.transform(input).await.unwrap_err();
        assert!(err.to_string().contains("REF_AREA='BR'"));
    }

    #[tokio::test]
    async fn test_filter_mode_writes_kept_and_rejected_rows() {
        let storage = MockStorage::with_input(INPUT);
        let mut config = MockConfig::new();
        config.validation = ValidationMode::Filter;
        let pipeline =
            StandardizePipeline::new(storage.clone(), config, StaticSchema(flow_schema()));

        let input = pipeline.extract().await.unwrap();
        let result = pipeline.transform(input).await.unwrap();
        assert_eq!(result.csv_output, "REF_AREA,TIME_PERIOD,OBS_VALUE\nAR,2020,1.5\n");
        assert_eq!(result.rejected.len(), 1);

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "test_output");
        assert!(storage.get_file("test_output/standardized.csv").await.is_some());
        assert!(storage.get_file("test_output/standardized.tsv").await.is_some());

        let rejected = storage.get_file("test_output/rejected.csv").await.unwrap();
        assert_eq!(
            String::from_utf8(rejected).unwrap(),
            "REF_AREA,TIME_PERIOD,OBS_VALUE\nBR,2021,2\n"
        );
    }

    #[tokio::test]
    async fn test_load_bundles_outputs_into_zip() {
        let storage = MockStorage::with_input("year,country,value\n2020,UY,3\n");
        let mut config = MockConfig::new();
        config.output_formats = vec!["csv".to_string(), "json".to_string()];
        config.compression = Some("standardized.zip".to_string());
        let pipeline =
            StandardizePipeline::new(storage.clone(), config, StaticSchema(flow_schema()));

        let input = pipeline.extract().await.unwrap();
        let result = pipeline.transform(input).await.unwrap();
        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "test_output/standardized.zip");

        let zip_bytes = storage.get_file("test_output/standardized.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut file_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        file_names.sort();
        assert_eq!(file_names, vec!["standardized.csv", "standardized.json"]);

        let json: serde_json::Value = {
            let file = archive.by_name("standardized.json").unwrap();
            serde_json::from_reader(file).unwrap()
        };
        assert_eq!(json["validated_against"], "WB:FLOW(1.0)");
    }

    #[tokio::test]
    async fn test_output_unvalidated_without_any_artefact() {
        let mut config = MockConfig::new();
        config.artefact = None;
        let pipeline = StandardizePipeline::new(
            MockStorage::with_input(INPUT),
            config,
            StaticSchema(flow_schema()),
        );

        // The template has no INFO sheet, so nothing is validated.
        let input = pipeline.extract().await.unwrap();
        assert!(input.schema.is_none());
        let result = pipeline.transform(input).await.unwrap();
        assert_eq!(
            result.standardized.fields(),
            &["TIME_PERIOD", "REF_AREA", "OBS_VALUE"]
        );
    }
}
