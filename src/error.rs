//! The closed error taxonomy shared by every component in the pipeline.
//!
//! Numerical failures (`Singular`, `NotSpd`) are expected to occur during
//! normal operation (e.g. an ill-conditioned covariance) and are caught at
//! the `Prognoser` boundary; the rest indicate a programming error and are
//! propagated unchanged.

use thiserror::Error;

/// Errors produced anywhere in the model/observer/predictor pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrognosticsError {
    /// A required configuration key was missing or ill-typed.
    #[error("config error: {0}")]
    Config(String),

    /// A matrix or vector operation saw incompatible shapes.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Matrix inversion failed because the matrix is (numerically) singular.
    #[error("matrix is singular")]
    Singular,

    /// Cholesky factorization failed: the matrix is not symmetric positive definite.
    #[error("matrix is not symmetric positive definite")]
    NotSpd,

    /// `step` was called on an observer before `initialize`.
    #[error("observer stepped before initialize")]
    NotInitialised,

    /// `step` was called with a time that did not strictly advance.
    #[error("time did not advance past the previous step")]
    TimeNotAdvanced,

    /// A `UData`/container index was out of range for its current shape.
    #[error("index out of range")]
    OutOfRange,

    /// A `UData` accessor was used against a kind that does not support it.
    #[error("accessor not valid for the current uncertainty kind")]
    InvalidKind,

    /// The chosen strategy does not implement the requested operation.
    #[error("operation not supported by this implementation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, PrognosticsError>;
