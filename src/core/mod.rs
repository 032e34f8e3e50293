pub mod artefact;
pub mod etl;
pub mod inference;
pub mod pipeline;
pub mod registry;
pub mod sdmx_json;
pub mod template;
pub mod transform;
pub mod validation;
pub mod workbook;

pub use crate::domain::model::{Record, Table, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, SchemaSource, Storage};
pub use crate::utils::error::Result;
