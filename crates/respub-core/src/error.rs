//! Unified error type for the publication pipeline
//!
//! Every stage in `respub-core` returns [`RespubResult`]. The variants map
//! onto the failure policy of a run: configuration and discovery problems
//! abort the whole run, validation errors abort the stage that raised them,
//! and schema drift is never an error (it is reported through
//! [`crate::diagnostics::Diagnostics`] instead).
//!
//! # Example
//!
//! ```ignore
//! use respub_core::{RespubError, RespubResult};
//!
//! fn publish(path: &str) -> RespubResult<()> {
//!     let catalog = load_catalog(path)?;
//!     publish_baseline(raw, &catalog)?;
//!     Ok(())
//! }
//! ```

use polars::prelude::PolarsError;
use thiserror::Error;

/// Unified error type for all publication operations.
#[derive(Error, Debug)]
pub enum RespubError {
    /// I/O errors (file access, directory creation)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised while evaluating a polars plan
    #[error("Table error: {0}")]
    Polars(#[from] PolarsError),

    /// Column catalog or lookup asset is malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw result files could not be resolved into one baseline and N upgrades
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A QC assertion over published data failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using RespubError.
pub type RespubResult<T> = Result<T, RespubError>;

impl From<anyhow::Error> for RespubError {
    fn from(err: anyhow::Error) -> Self {
        RespubError::Other(err.to_string())
    }
}

impl From<String> for RespubError {
    fn from(s: String) -> Self {
        RespubError::Other(s)
    }
}

impl From<&str> for RespubError {
    fn from(s: &str) -> Self {
        RespubError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RespubError::Config("source_name missing".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("source_name missing"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RespubError = io_err.into();
        assert!(matches!(err, RespubError::Io(_)));
    }

    #[test]
    fn test_polars_error_conversion() {
        let polars_err = PolarsError::ColumnNotFound("bldg_id".into());
        let err: RespubError = polars_err.into();
        assert!(matches!(err, RespubError::Polars(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> RespubResult<()> {
            Err(RespubError::Validation("rep income unmapped".into()))
        }

        fn outer() -> RespubResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
