//! Unified error handling for the setor crate
//!
//! Domain errors stay in their modules ([`BalanceError`] in the balancer,
//! [`CenterError`] in the center catalog). This module wraps them, together
//! with I/O and serialization failures, into a single [`Error`] used across
//! module boundaries.
//!
//! # Usage
//!
//! ```rust
//! use setor::error::{Error, ErrorCategory, SetorErrorTrait};
//!
//! let err = Error::config("max_pdv must be greater than 0");
//! assert_eq!(err.category(), ErrorCategory::Config);
//! assert!(!err.is_recoverable());
//! ```

use std::io;
use thiserror::Error;

pub use crate::balancer::BalanceError;
pub use crate::centers::CenterError;

/// Common trait for all setor error types
pub trait SetorErrorTrait: std::error::Error {
    /// Check if the operation could succeed when retried with other
    /// parameters or inputs
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Balancing input, parameters or topology
    Balance,
    /// Center catalog and geocoding
    Geocoding,
    /// Malformed input files
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short lowercase name, used as a metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Geocoding => "geocoding",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the setor crate
#[derive(Error, Debug)]
pub enum Error {
    /// Balancing errors
    #[error("Balance error: {0}")]
    Balance(#[from] BalanceError),

    /// Center catalog errors
    #[error("Center error: {0}")]
    Center(#[from] CenterError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SetorErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Balance(e) => e.is_recoverable(),
            Self::Center(e) => e.is_recoverable(),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) | Self::Toml(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Balance(BalanceError::InvalidParameters { .. }) => ErrorCategory::Config,
            Self::Balance(_) => ErrorCategory::Balance,
            Self::Center(_) => ErrorCategory::Geocoding,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) | Self::Toml(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
