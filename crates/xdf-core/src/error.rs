//! Error handling for the alignment engine
//!
//! Only contract violations are errors. Malformed markers, unmatched streams,
//! perturbation count mismatches and missing overlap are recovered in place
//! and reported through `tracing`.

use core::fmt;

/// Result type alias for engine operations
pub type XdfResult<T> = Result<T, XdfError>;

/// Error type for all engine operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum XdfError {
    /// Processing was requested before a recording was loaded
    NoRecordingLoaded,

    /// The loaded recording does not contain a single stream
    EmptyRecording,

    /// A time-base conversion was requested before any processing run
    NotProcessed,

    /// The bundle is already expressed relative to `global_t0`
    AlreadyRelative,

    /// Stream descriptor violates the loader contract
    InvalidStream {
        /// Stream name as reported by the loader
        name: String,
        /// Description of the violation
        reason: String,
    },

    /// Invalid rule set or engine configuration
    ConfigurationError {
        /// Description of the configuration error
        message: String,
    },

    /// A role-keyed sample transform rejected its input
    TransformFailed {
        /// Role the transform was registered for
        role: String,
        /// Transform-specific failure description
        reason: String,
    },
}

impl fmt::Display for XdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdfError::NoRecordingLoaded => {
                write!(f, "No recording loaded. Load a recording before processing")
            }
            XdfError::EmptyRecording => {
                write!(f, "Recording contains no streams")
            }
            XdfError::NotProcessed => {
                write!(f, "No global_t0 available. Process the recording first")
            }
            XdfError::AlreadyRelative => {
                write!(f, "Result bundle is already in relative time")
            }
            XdfError::InvalidStream { name, reason } => {
                write!(f, "Invalid stream '{}': {}", name, reason)
            }
            XdfError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            XdfError::TransformFailed { role, reason } => {
                write!(f, "Transform for role '{}' failed: {}", role, reason)
            }
        }
    }
}

impl std::error::Error for XdfError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::XdfError::ConfigurationError {
            message: format!($($arg)*),
        }
    };
}
