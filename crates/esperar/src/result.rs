//! Result and error types for Esperar.

use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Errors that can occur in Esperar
#[derive(Debug, Error)]
pub enum EsperarError {
    /// An element command failed because the element does not exist
    #[error("Can't call {command} on element with selector \"{selector}\" because element wasn't found")]
    ElementNotFound {
        /// Command that was attempted
        command: String,
        /// Selector of the missing element
        selector: String,
    },

    /// An element command failed for a reason other than a missing element
    #[error("Command {command} failed on \"{selector}\": {message}")]
    CommandFailed {
        /// Command that was attempted
        command: String,
        /// Selector of the element
        selector: String,
        /// Error message
        message: String,
    },

    /// A lazy reference resolved to an index past the end of its collection
    #[error("Index {index} out of bounds for $$(`{selector}`) of length {length}")]
    IndexOutOfBounds {
        /// Selector of the originating query
        selector: String,
        /// Requested index
        index: usize,
        /// Observed collection length
        length: usize,
    },

    /// A hard assertion failed
    #[error("{message}")]
    AssertionFailed {
        /// Formatted failure message
        message: String,
    },

    /// Matcher options were malformed
    #[error("Invalid options: {message}")]
    InvalidOptions {
        /// Description naming the received value
        message: String,
    },

    /// A soft matcher was invoked with no active test context
    #[error("No active test: call set_current_test before using soft assertions")]
    NoActiveTest,

    /// Aggregate of deferred soft-assertion failures
    #[error("{count} soft assertion failures\n{details}")]
    SoftFailures {
        /// Number of recorded failures
        count: usize,
        /// One line per recorded failure
        details: String,
    },

    /// Browser-level query failed
    #[error("Browser command {command} failed: {message}")]
    BrowserError {
        /// Command that was attempted
        command: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EsperarError {
    /// Whether this error aborts an assertion without a formatted diff
    /// (command failures, usage errors), as opposed to a failed comparison.
    #[must_use]
    pub const fn is_command_failure(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::CommandFailed { .. }
                | Self::BrowserError { .. }
                | Self::IndexOutOfBounds { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_message() {
        let err = EsperarError::ElementNotFound {
            command: "isDisplayed".to_string(),
            selector: "#login".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Can't call isDisplayed on element with selector \"#login\" because element wasn't found"
        );
    }

    #[test]
    fn test_soft_failures_message_states_count() {
        let err = EsperarError::SoftFailures {
            count: 3,
            details: "  1. [toBeDisplayed] ...".to_string(),
        };
        assert!(err.to_string().starts_with("3 soft assertion failures"));
    }

    #[test]
    fn test_is_command_failure() {
        let not_found = EsperarError::ElementNotFound {
            command: "getText".to_string(),
            selector: "a".to_string(),
        };
        assert!(not_found.is_command_failure());

        let failed = EsperarError::AssertionFailed {
            message: "nope".to_string(),
        };
        assert!(!failed.is_command_failure());
    }
}
