//! Grid-specific error types

use thiserror::Error;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),

    /// Query returned nothing usable yet; retry on the next poll
    #[error("Transient connector failure: {0}")]
    Transient(String),

    #[error("Request rejected by terminal: retcode {code} ({comment})")]
    Rejected { code: u32, comment: String },

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Terminal disconnected: {0}")]
    Disconnected(String),

    #[error("Bot task failed to join: {0}")]
    TaskJoin(String),
}

impl GridError {
    /// Whether a monitoring poll may swallow this error and keep going
    pub fn is_transient(&self) -> bool {
        matches!(self, GridError::Transient(_))
    }
}

impl From<tokio::task::JoinError> for GridError {
    fn from(err: tokio::task::JoinError) -> Self {
        GridError::TaskJoin(err.to_string())
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_transient() {
        assert!(GridError::Transient("positions_get returned None".into()).is_transient());
        assert!(!GridError::Connector("ipc broken".into()).is_transient());
        assert!(!GridError::Disconnected("terminal closed".into()).is_transient());
        assert!(!GridError::Rejected { code: 10006, comment: "rejected".into() }.is_transient());
    }

    #[test]
    fn test_rejected_display() {
        let err = GridError::Rejected { code: 10015, comment: "Invalid price".into() };
        assert_eq!(err.to_string(), "Request rejected by terminal: retcode 10015 (Invalid price)");
    }
}
