use thiserror::Error;

use crate::dto::ValidationErrors;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    /// Record store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No record with the given id.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record kind, e.g. "Contact".
        entity: String,
        /// Requested id.
        id: String,
    },

    /// Sentiment service failure.
    #[error("Sentiment error: {0}")]
    Sentiment(#[from] SentimentError),

    /// Protocol-level failure.
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Unexpected internal state.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl AppError {
    /// Lookup miss for the named entity.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened.
    #[error("Database connection failed: {message}")]
    Connection {
        /// Driver message.
        message: String,
    },

    /// A query failed or returned unreadable data.
    #[error("Query failed: {message}")]
    Query {
        /// What failed.
        message: String,
    },

    /// No row with the given id.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record kind.
        entity: String,
        /// Requested id.
        id: String,
    },

    /// Another writer changed the record first.
    #[error("Write conflict on {entity} {id}: {message}")]
    Conflict {
        /// Record kind.
        entity: String,
        /// Id of the contested record.
        id: String,
        /// What changed underneath the writer.
        message: String,
    },

    /// Embedded migrations failed.
    #[error("Migration failed: {message}")]
    Migration {
        /// Migrator message.
        message: String,
    },

    /// Raw driver error.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Sentiment enrichment errors
#[derive(Debug, Error)]
pub enum SentimentError {
    /// Non-success HTTP status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Body did not match the expected shape.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Parse failure.
        message: String,
    },

    /// The request exceeded the configured timeout.
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Malformed JSON-RPC request.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was malformed.
        message: String,
    },

    /// No tool by that name.
    #[error("Unknown tool: {tool_name}")]
    UnknownTool {
        /// Requested tool.
        tool_name: String,
    },

    /// Arguments could not be parsed.
    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters {
        /// Tool being called.
        tool_name: String,
        /// Parse failure.
        message: String,
    },

    /// Arguments parsed but failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The tool ran and failed.
    #[error("Tool execution failed: {message}")]
    ExecutionFailed {
        /// Failure detail.
        message: String,
    },

    /// Result could not be serialized.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(errors) => McpError::Validation(errors),
            other => McpError::ExecutionFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for sentiment enrichment
pub type SentimentResult<T> = Result<T, SentimentError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::not_found("Contact", "c-1");
        assert_eq!(err.to_string(), "Contact not found: c-1");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Database connection failed: failed to connect");

        let err = StorageError::NotFound {
            entity: "Opportunity".to_string(),
            id: "opp-9".to_string(),
        };
        assert_eq!(err.to_string(), "Opportunity not found: opp-9");

        let err = StorageError::Conflict {
            entity: "HealthScore".to_string(),
            id: "c-1".to_string(),
            message: "newer score exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Write conflict on HealthScore c-1: newer score exists"
        );

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_sentiment_error_display() {
        let err = SentimentError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - unavailable");

        let err = SentimentError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_mcp_error_display() {
        let err = McpError::UnknownTool {
            tool_name: "nonexistent".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown tool: nonexistent");

        let err = McpError::InvalidParameters {
            tool_name: "crm_health_calculate".to_string(),
            message: "missing contact_id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid parameters for crm_health_calculate: missing contact_id"
        );
    }

    #[test]
    fn test_validation_error_conversion_to_app_error() {
        let mut errors = ValidationErrors::new();
        errors.add("last_name", "is required");
        let app_err: AppError = errors.into();
        assert!(matches!(app_err, AppError::Validation(_)));
        assert_eq!(app_err.to_string(), "Validation failed: last_name: is required");
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let storage_err = StorageError::Query {
            message: "bad column".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }

    #[test]
    fn test_app_error_conversion_to_mcp_error() {
        let app_err = AppError::not_found("Case", "case-1");
        let mcp_err: McpError = app_err.into();
        assert!(matches!(mcp_err, McpError::ExecutionFailed { .. }));
        assert!(mcp_err.to_string().contains("Case not found"));
    }

    #[test]
    fn test_validation_app_error_keeps_field_map_in_mcp_error() {
        let mut errors = ValidationErrors::new();
        errors.add("resolution", "is required to close a case");
        let mcp_err: McpError = AppError::from(errors).into();
        match mcp_err {
            McpError::Validation(errors) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["resolution"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
