use thiserror::Error;

#[derive(Error, Debug)]
pub enum OatmealError {
    #[error("Invalid {handler} handler for type \"{type_name}\"")]
    InvalidHandler { type_name: String, handler: String },

    #[error("Model not yet defined: \"{name}\"")]
    UnknownModel { name: String },

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

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

/// 錯誤分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Registration,
    Model,
    Configuration,
    Io,
    Data,
}

/// 錯誤嚴重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl OatmealError {
    pub fn invalid_handler(type_name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::InvalidHandler {
            type_name: type_name.into(),
            handler: handler.into(),
        }
    }

    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel { name: name.into() }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidHandler { .. } => ErrorCategory::Registration,
            Self::UnknownModel { .. } => ErrorCategory::Model,
            Self::IoError(_) => ErrorCategory::Io,
            Self::SerializationError(_) => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Io => ErrorSeverity::High,
            ErrorCategory::Registration | ErrorCategory::Model => ErrorSeverity::Critical,
        }
    }

    /// 針對錯誤給出修復建議
    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::InvalidHandler { handler, .. } => format!(
                "Register '{}' as a known handler or pick one of: {}",
                handler,
                crate::core::handlers::HANDLER_NAMES.join(", ")
            ),
            Self::UnknownModel { name } => format!(
                "Declare model '{}' in the schema or register it in the catalog before traversal",
                name
            ),
            Self::IoError(_) => "Check that the file exists and is readable".to_string(),
            Self::SerializationError(_) => "Check that the input is well-formed JSON".to_string(),
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Review the schema file syntax".to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the schema file", field)
            }
            Self::MissingConfigError { field } => format!("Provide a value for '{}'", field),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Registration => format!("Type registration failed: {}", self),
            ErrorCategory::Model => format!("Model resolution failed: {}", self),
            ErrorCategory::Configuration => format!("Schema configuration is invalid: {}", self),
            ErrorCategory::Io => format!("Could not read input: {}", self),
            ErrorCategory::Data => format!("Input data could not be parsed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, OatmealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_message() {
        let err = OatmealError::unknown_model("Comment");
        assert_eq!(err.to_string(), "Model not yet defined: \"Comment\"");
        assert_eq!(err.category(), ErrorCategory::Model);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_invalid_handler_suggestion_lists_known_handlers() {
        let err = OatmealError::invalid_handler("slug", "kebab");
        assert!(err.recovery_suggestion().contains("trim"));
        assert!(err.user_friendly_message().starts_with("Type registration failed"));
    }
}
