use thiserror::Error;

/// Main error type for regnet
#[derive(Error, Debug)]
pub enum RegnetError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection, timeout or body-read failure; eligible for retry
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Remote source answered with a server error or stayed unreachable
    #[error("Service down: {source_name} ({detail})")]
    ServiceDown { source_name: String, detail: String },

    /// Remote source has nothing for the query
    #[error("No data: {0}")]
    NoData(String),

    /// Stored cache record failed to parse or validate
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Cache or output write failure
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Parse errors (HTML, TSV, numeric fields)
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A node was re-inserted with a different kind
    #[error("Node type conflict for {node}: existing {existing}, requested {requested}")]
    NodeTypeConflict {
        node: String,
        existing: String,
        requested: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RegnetError {
    /// True for failures the resolver may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, RegnetError::TransientNetwork(_))
    }
}

/// Convenient Result type using RegnetError
pub type Result<T> = std::result::Result<T, RegnetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegnetError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RegnetError = io_err.into();
        assert!(matches!(err, RegnetError::Io(_)));
    }

    #[test]
    fn test_service_down_display() {
        let err = RegnetError::ServiceDown {
            source_name: "miRDB".to_string(),
            detail: "HTTP 503".to_string(),
        };
        assert_eq!(err.to_string(), "Service down: miRDB (HTTP 503)");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(RegnetError::TransientNetwork("timeout".to_string()).is_transient());
        assert!(!RegnetError::NoData("x".to_string()).is_transient());
    }
}
