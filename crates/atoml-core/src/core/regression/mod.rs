//! # Regression Module
//!
//! Numerical regression models used for property prediction.
//!
//! - [`ridge`] - Closed-form ridge regression with leave-one-out regularization search
//! - [`kernel`] - Covariance kernels for Gaussian processes
//! - [`optimize`] - A derivative-free minimiser for positive hyperparameters
//! - [`gp`] - Gaussian process regression with optional hyperparameter optimisation
//! - [`metrics`] - Prediction error summaries

pub mod gp;
pub mod kernel;
pub mod metrics;
pub mod optimize;
pub mod ridge;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegressionError {
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Regression requires at least one data point")]
    EmptyInput,

    #[error("Singular value decomposition did not converge")]
    DecompositionFailed,

    #[error("Covariance matrix is not positive definite (regularization {regularization:e})")]
    NotPositiveDefinite { regularization: f64 },

    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),
}

pub(crate) fn check_rows(
    context: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), RegressionError> {
    if expected == found {
        Ok(())
    } else {
        Err(RegressionError::DimensionMismatch {
            context,
            expected,
            found,
        })
    }
}
