use thiserror::Error;

/// Top-level error type for Deskpilot.
///
/// Subsystem crates define their own error types and wrap this one where
/// they touch configuration or I/O, so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeskpilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for DeskpilotError {
    fn from(err: toml::de::Error) -> Self {
        DeskpilotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DeskpilotError {
    fn from(err: toml::ser::Error) -> Self {
        DeskpilotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DeskpilotError {
    fn from(err: serde_json::Error) -> Self {
        DeskpilotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Deskpilot operations.
pub type Result<T> = std::result::Result<T, DeskpilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeskpilotError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = DeskpilotError::Storage("lock poisoned".to_string());
        assert_eq!(err.to_string(), "Storage error: lock poisoned");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DeskpilotError = io_err.into();
        assert!(matches!(err, DeskpilotError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: DeskpilotError = err.unwrap_err().into();
        assert!(matches!(err, DeskpilotError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: DeskpilotError = err.unwrap_err().into();
        assert!(matches!(err, DeskpilotError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
