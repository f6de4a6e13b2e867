//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Hapmosaic operations
#[derive(Error, Debug)]
pub enum HapmosaicError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Row-count mismatch between the target matrix and the reference panel
    #[error("shape mismatch: target has {target_rows} typed rows, reference has {ref_rows}")]
    ShapeMismatch { target_rows: usize, ref_rows: usize },

    /// Invalid data errors (non-monotone marker map, unknown window label)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Algorithm errors (empty haplotype panel, non-finite work matrix)
    #[error("Algorithm error: {message}")]
    Algorithm { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path:?}")]
    FileNotFound { path: PathBuf },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Type alias for Results using HapmosaicError
pub type Result<T> = std::result::Result<T, HapmosaicError>;

impl HapmosaicError {
    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an algorithm error
    pub fn algorithm(message: impl Into<String>) -> Self {
        Self::Algorithm {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
