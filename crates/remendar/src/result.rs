//! Result and error types for Remendar.

use thiserror::Error;

/// Result type for Remendar operations
pub type RemendarResult<T> = Result<T, RemendarError>;

/// Errors that can occur in Remendar
#[derive(Debug, Error)]
pub enum RemendarError {
    /// Selector matched nothing, matched ambiguously, or the interaction timed out
    #[error("Locator '{selector}' is invalid: {message}")]
    LocatorInvalid {
        /// Selector that failed
        selector: String,
        /// Error message
        message: String,
    },

    /// An argument was missing, or an expectation did not hold
    #[error("Invalid value: {message}")]
    ValueInvalid {
        /// Error message
        message: String,
    },

    /// Bounding box of an element is unavailable
    #[error("Element not visible: {message}")]
    ElementNotVisible {
        /// Error message
        message: String,
    },

    /// Call site could not be mapped to an editable source location
    #[error("No patch target in {file}:{line}: {reason}")]
    PatchTargetNotFound {
        /// Source file
        file: String,
        /// 1-based line number
        line: usize,
        /// Why no target was found
        reason: String,
    },

    /// Operator declined to abandon an unpatchable repair
    #[error("Recording aborted: {message}")]
    RecordingAborted {
        /// Error message
        message: String,
    },

    /// Placeholder could not be resolved from any source
    #[error("Placeholder '{name}' is not set on the command line, in the config file, or in the environment")]
    PlaceholderUnresolved {
        /// Placeholder name
        name: String,
    },

    /// Placeholder substitution does not converge
    #[error("Placeholder substitution does not converge for: {text}")]
    PlaceholderCycle {
        /// Text at the point the cycle was detected
        text: String,
    },

    /// Operator cancelled the repair prompt
    #[error("Record mode interrupted by user")]
    UserCancelled,

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Raw failure reported by the automation backend
    #[error("Automation failed: {message}")]
    Automation {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Source line or selector could not be parsed
    #[error("Parse error: {message}")]
    Parse {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// How the coordinator treats a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The selector must be repaired
    LocatorInvalid,
    /// An argument or expected value must be repaired
    ValueInvalid,
    /// Propagated unmodified
    Fatal,
}

/// Message fragments emitted by automation backends for unusable selectors
const LOCATOR_SIGNALS: &[&str] = &[
    "no node found",
    "no element matches",
    "timeout",
    "timed out",
    "strict mode violation",
    "evaluation failed",
    "is not a valid selector",
];

impl RemendarError {
    /// Create a locator error
    #[must_use]
    pub fn locator_invalid(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LocatorInvalid {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create a value error
    #[must_use]
    pub fn value_invalid(message: impl Into<String>) -> Self {
        Self::ValueInvalid {
            message: message.into(),
        }
    }

    /// Create a parse error
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a patch-target error
    #[must_use]
    pub fn patch_target_not_found(
        file: impl Into<String>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::PatchTargetNotFound {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Classify by variant first, then by message signal
    #[must_use]
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::LocatorInvalid { .. } | Self::Timeout { .. } => FailureClass::LocatorInvalid,
            Self::ValueInvalid { .. } => FailureClass::ValueInvalid,
            Self::Automation { message } => {
                let lowered = message.to_lowercase();
                if LOCATOR_SIGNALS.iter().any(|s| lowered.contains(s)) {
                    FailureClass::LocatorInvalid
                } else {
                    FailureClass::Fatal
                }
            }
            _ => FailureClass::Fatal,
        }
    }

    /// Whether the coordinator may attempt a repair
    #[must_use]
    pub fn is_repairable(&self) -> bool {
        !matches!(self.failure_class(), FailureClass::Fatal)
    }
}
