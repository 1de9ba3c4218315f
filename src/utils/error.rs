use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::DeError),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    #[error("DuckDB error: {0}")]
    DatabaseError(#[from] duckdb::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Manifest error on line {line}: {message}")]
    ManifestError { line: usize, message: String },

    #[error("Table '{table}' not found in {database}")]
    TableNotFound { table: String, database: String },

    #[error("No data produced by the {stage} phase")]
    NoData { stage: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    DataProcessing,
    Storage,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::IoError(_)
            | EtlError::ParquetError(_)
            | EtlError::DatabaseError(_)
            | EtlError::TableNotFound { .. } => ErrorCategory::Storage,
            EtlError::SerializationError(_)
            | EtlError::XmlError(_)
            | EtlError::ArrowError(_)
            | EtlError::CsvError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::NoData { .. } => ErrorCategory::DataProcessing,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ManifestError { .. } => ErrorCategory::Validation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路錯誤與空資料通常重試即可
            EtlError::ApiError(_) | EtlError::NoData { .. } => ErrorSeverity::Medium,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ApiError(_) => {
                "Check network connectivity and the API key, then retry".to_string()
            }
            EtlError::MissingConfigError { field } => {
                format!("Set {} in your environment or .env file", field)
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => {
                "Review the configuration file and command-line flags".to_string()
            }
            EtlError::TableNotFound { .. } => {
                "Make sure the table name is correct and the ETL pipeline ran successfully"
                    .to_string()
            }
            EtlError::NoData { stage } if stage == "extract" => {
                "No traffic data could be fetched; check the route points and API availability"
                    .to_string()
            }
            EtlError::NoData { .. } => {
                "Check that the staged Parquet files are readable".to_string()
            }
            EtlError::ManifestError { .. } => {
                "Fix the offending manifest line; each line must name one package".to_string()
            }
            EtlError::IoError(_) => "Check file permissions and available disk space".to_string(),
            EtlError::DatabaseError(_) => {
                "Make sure the database file is not locked by another process".to_string()
            }
            _ => "Re-run with --verbose for more details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the API: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::DataProcessing => format!("Data processing failed: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            ErrorCategory::Validation => format!("Invalid input: {}", self),
        }
    }

    /// 依嚴重程度對應的行程結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
