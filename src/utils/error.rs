use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("LLM server unreachable at {endpoint}: {message}")]
    ConnectionError { endpoint: String, message: String },

    #[error("LLM returned HTTP {status}: {body}")]
    LlmStatusError { status: u16, body: String },

    #[error("LLM model '{model}' returned an empty response")]
    EmptyResponseError { model: String },

    #[error("{operation} timed out after {seconds}s")]
    TimeoutError { operation: String, seconds: u64 },

    #[error("Channel closed in stage '{stage}'")]
    ChannelClosed { stage: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// 錯誤分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Storage,
    Generation,
    Pipeline,
}

/// 錯誤嚴重程度，CLI 依此決定退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::HttpError(_)
            | EngineError::ConnectionError { .. }
            | EngineError::LlmStatusError { .. } => ErrorCategory::Network,
            EngineError::ConfigError { .. }
            | EngineError::ConfigValidationError { .. }
            | EngineError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EngineError::IoError(_) | EngineError::SerializationError(_) => ErrorCategory::Storage,
            EngineError::EmptyResponseError { .. } | EngineError::TimeoutError { .. } => {
                ErrorCategory::Generation
            }
            EngineError::ChannelClosed { .. } | EngineError::ProcessingError { .. } => {
                ErrorCategory::Pipeline
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::EmptyResponseError { .. } => ErrorSeverity::Low,
            EngineError::HttpError(_)
            | EngineError::ConnectionError { .. }
            | EngineError::LlmStatusError { .. }
            | EngineError::TimeoutError { .. } => ErrorSeverity::Medium,
            EngineError::ConfigError { .. }
            | EngineError::ConfigValidationError { .. }
            | EngineError::InvalidConfigValueError { .. }
            | EngineError::ProcessingError { .. }
            | EngineError::SerializationError(_) => ErrorSeverity::High,
            EngineError::IoError(_) | EngineError::ChannelClosed { .. } => ErrorSeverity::Critical,
        }
    }

    /// 是否值得在下一輪重試
    pub fn is_retryable(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Low | ErrorSeverity::Medium)
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Make sure Ollama is running (`ollama serve`) and the model is pulled"
            }
            ErrorCategory::Configuration => "Check the TOML file and command-line overrides",
            ErrorCategory::Storage => "Check that the base directory exists and is writable",
            ErrorCategory::Generation => {
                "Try a larger model or a longer timeout in the [ollama] section"
            }
            ErrorCategory::Pipeline => "Re-run with --verbose to see which stage stopped",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EngineError::ConnectionError { endpoint, .. } => {
                format!("Cannot reach the LLM server at {}", endpoint)
            }
            EngineError::TimeoutError { operation, seconds } => {
                format!("{} took longer than {} seconds", operation, seconds)
            }
            EngineError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            EngineError::IoError(e) => format!("File system error: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
