//! Unified error type for pixforge.
//!
//! All library crates funnel their failures into [`Error`]. The binary wraps
//! it in `anyhow` for reporting.

/// Unified error type covering all failure modes in pixforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input data failed validation (bad quality value, empty name, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, share opener, ...) could not be run.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The operation was cancelled before it finished.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// An output destination rejected an operation.
    #[error("Destination error: {0}")]
    Destination(String),

    /// Configuration could not be parsed or applied.
    #[error("Config error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Destination`].
    pub fn destination(message: impl Into<String>) -> Self {
        Error::Destination(message.into())
    }

    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
