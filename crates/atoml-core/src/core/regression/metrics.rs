use super::{RegressionError, check_rows};
use serde::Serialize;

/// Aggregate absolute errors of a set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub rmse: f64,
    pub mae: f64,
    pub max_abs: f64,
    pub count: usize,
}

impl ErrorSummary {
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Result<Self, RegressionError> {
        check_rows("error summary", actual.len(), predicted.len())?;
        if actual.is_empty() {
            return Err(RegressionError::EmptyInput);
        }
        let count = actual.len();
        let (sq, abs, max_abs) = predicted.iter().zip(actual).fold(
            (0.0, 0.0, 0.0f64),
            |(sq, abs, max), (p, a)| {
                let e = (p - a).abs();
                (sq + e * e, abs + e, max.max(e))
            },
        );
        Ok(Self {
            rmse: (sq / count as f64).sqrt(),
            mae: abs / count as f64,
            max_abs,
            count,
        })
    }
}

/// Root-mean-square error.
pub fn rmse(predicted: &[f64], actual: &[f64]) -> Result<f64, RegressionError> {
    ErrorSummary::compute(predicted, actual).map(|s| s.rmse)
}
