use thiserror::Error;

/// Chart rendering and export errors
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Failed to write chart file: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage access errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),
    #[error("Table '{0}' does not exist in the database")]
    TableNotFound(String),
    #[error("Table '{0}' already exists")]
    TableExists(String),
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("'{operation}' failed after {attempts} attempts. Last error: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Database(_))
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    MissingVar(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Invalid chart config: {0}")]
    InvalidChartConfig(String),
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Table reshaping errors
#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error("Expected at least {expected} identifier columns, found {found}")]
    MissingIdentifierColumns { expected: usize, found: usize },
    #[error("Missing required column '{0}'")]
    MissingColumn(String),
}

/// Spreadsheet report polling errors
#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Workbook '{0}' is not open")]
    WorkbookNotOpen(String),
    #[error("Report '{report}' was not ready after {waited_ms} ms")]
    PollTimeout { report: String, waited_ms: u128 },
    #[error("Workbook source error: {0}")]
    Source(String),
}

/// Extract clean error message from database error strings
///
/// Removes technical error codes and prefixes like:
/// "error returned from database: 1146 (42S02): Table 'stock_db.prices' doesn't exist"
///
/// Returns only the meaningful error message:
/// "Table 'stock_db.prices' doesn't exist"
pub fn extract_clean_error(error_msg: &str) -> String {
    if error_msg.contains("error returned from database:") {
        // Find the last colon, everything after it is the actual error message
        if let Some(last_colon) = error_msg.rfind(": ") {
            error_msg[last_colon + 2..].trim().to_string()
        } else {
            error_msg.to_string()
        }
    } else {
        error_msg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_clean_error_strips_database_prefix() {
        let raw = "Database error: error returned from database: 1146 (42S02): Table 'stock_db.prices' doesn't exist";
        assert_eq!(extract_clean_error(raw), "Table 'stock_db.prices' doesn't exist");
    }

    #[test]
    fn test_extract_clean_error_passes_other_messages() {
        assert_eq!(extract_clean_error("connection refused"), "connection refused");
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout(30).is_transient());
        assert!(!StoreError::TableNotFound("prices".to_string()).is_transient());
        assert!(!StoreError::InvalidIdentifier("a;b".to_string()).is_transient());
    }
}
