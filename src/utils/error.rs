use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdmxError {
    #[error("Parse error for '{input}': {message}")]
    ParseError { input: String, message: String },

    #[error("Artefact not found in registry: {kind} {reference}")]
    NotFoundError { kind: String, reference: String },

    #[error("Registry transport error: {message}")]
    TransportError { message: String },

    #[error("Format error: {message}")]
    FormatError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Workbook error: {0}")]
    WorkbookError(#[from] calamine::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Registry,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<reqwest::Error> for SdmxError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        SdmxError::TransportError { message }
    }
}

impl SdmxError {
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        SdmxError::ParseError {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        SdmxError::FormatError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SdmxError::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SdmxError::ParseError { .. } | SdmxError::FormatError { .. } => ErrorCategory::Input,
            SdmxError::WorkbookError(_) => ErrorCategory::Input,
            SdmxError::NotFoundError { .. } | SdmxError::TransportError { .. } => {
                ErrorCategory::Registry
            }
            SdmxError::ValidationError { .. } | SdmxError::CsvError(_) => ErrorCategory::Data,
            SdmxError::SerializationError(_) => ErrorCategory::Data,
            SdmxError::ConfigError { .. }
            | SdmxError::InvalidConfigValueError { .. }
            | SdmxError::MissingConfigError { .. }
            | SdmxError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            SdmxError::IoError(_) | SdmxError::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Registry => match self {
                SdmxError::TransportError { .. } => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Input | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SdmxError::TransportError { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SdmxError::ParseError { .. } => {
                "Use the 'agency:id(version)' form, e.g. 'ECB:EXR(1.0)'"
            }
            SdmxError::NotFoundError { .. } => {
                "Check the agency, id, version and artefact kind against the registry"
            }
            SdmxError::TransportError { .. } => {
                "Check the registry URL and network access, then retry"
            }
            SdmxError::FormatError { .. } | SdmxError::WorkbookError(_) => {
                "Check the mapping workbook sheets and headers (COMP_MAPPING: SOURCE, TARGET, MAPPING_RULES)"
            }
            SdmxError::ValidationError { .. } => {
                "Fix the source data or mapping so values match the schema code lists, or use the 'filter' validation mode"
            }
            SdmxError::CsvError(_) => "Check that the input file is valid CSV with a header row",
            SdmxError::SerializationError(_) => "Check the JSON output or registry response",
            SdmxError::IoError(_) | SdmxError::ZipError(_) => {
                "Check file paths and permissions"
            }
            SdmxError::ConfigError { .. }
            | SdmxError::InvalidConfigValueError { .. }
            | SdmxError::MissingConfigError { .. }
            | SdmxError::ConfigValidationError { .. } => {
                "Review the command line flags or TOML configuration"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SdmxError::ParseError { input, .. } => {
                format!("Could not understand the artefact identifier '{}'", input)
            }
            SdmxError::NotFoundError { kind, reference } => {
                format!("The registry has no {} matching {}", kind, reference)
            }
            SdmxError::TransportError { .. } => "Could not reach the SDMX registry".to_string(),
            SdmxError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SdmxError>;
