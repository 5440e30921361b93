//! # Selection Module
//!
//! Feature ranking and dimensionality reduction.
//!
//! - [`correlation`] - Pearson, Spearman and Kendall correlation coefficients
//! - [`screening`] - Sure independence and robust rank correlation screening
//! - [`lasso`] - Lasso regularization path and feature entry order
//! - [`pca`] - Principal component projection

pub mod correlation;
pub mod lasso;
pub mod pca;
pub mod screening;

use crate::core::regression::RegressionError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Cannot select {requested} from {available} available")]
    InvalidSize { requested: usize, available: usize },

    #[error("Feature selection requires at least one data point")]
    EmptyInput,

    #[error("Unknown {kind}: '{value}'")]
    UnknownName { kind: &'static str, value: String },

    #[error(transparent)]
    Regression(#[from] RegressionError),
}

pub(crate) fn check_rows(
    context: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), SelectionError> {
    if expected == found {
        Ok(())
    } else {
        Err(SelectionError::DimensionMismatch {
            context,
            expected,
            found,
        })
    }
}
