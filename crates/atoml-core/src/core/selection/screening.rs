use super::correlation::{CorrelationKind, correlation};
use super::{SelectionError, check_rows};
use crate::core::models::matrix::{complement, select_columns};
use crate::core::regression::ridge::RidgeModel;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Regularization of the least-squares refit inside [`iterative_screening`].
const RESIDUAL_REGULARIZATION: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreeningMethod {
    /// Sure independence screening (absolute Pearson correlation).
    Sis,
    /// Robust rank correlation screening.
    Rrcs,
}

impl fmt::Display for ScreeningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScreeningMethod::Sis => "sis",
            ScreeningMethod::Rrcs => "rrcs",
        })
    }
}

impl FromStr for ScreeningMethod {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sis" => Ok(ScreeningMethod::Sis),
            "rrcs" => Ok(ScreeningMethod::Rrcs),
            _ => Err(SelectionError::UnknownName {
                kind: "screening method",
                value: s.to_string(),
            }),
        }
    }
}

/// Outcome of a screening pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screening {
    /// Retained feature indices, best first.
    pub accepted: Vec<usize>,
    /// Discarded feature indices, ascending.
    pub rejected: Vec<usize>,
}

fn check(target: &[f64], x: &DMatrix<f64>, size: usize) -> Result<(), SelectionError> {
    if x.nrows() == 0 {
        return Err(SelectionError::EmptyInput);
    }
    check_rows("screening target", x.nrows(), target.len())?;
    if size == 0 || size > x.ncols() {
        return Err(SelectionError::InvalidSize {
            requested: size,
            available: x.ncols(),
        });
    }
    Ok(())
}

/// Orders `candidates` by decreasing absolute correlation with `target`.
fn rank(target: &[f64], x: &DMatrix<f64>, candidates: &[usize], kind: CorrelationKind) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&c| {
            let column: Vec<f64> = x.column(c).iter().copied().collect();
            (c, correlation(kind, &column, target).abs())
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.into_iter().map(|(c, _)| c).collect()
}

fn finish(ncols: usize, accepted: Vec<usize>) -> Screening {
    let rejected = complement(ncols, &accepted);
    Screening { accepted, rejected }
}

pub fn sure_independence_screening(
    target: &[f64],
    x: &DMatrix<f64>,
    size: usize,
) -> Result<Screening, SelectionError> {
    robust_rank_screening(target, x, size, CorrelationKind::Pearson)
}

pub fn robust_rank_screening(
    target: &[f64],
    x: &DMatrix<f64>,
    size: usize,
    kind: CorrelationKind,
) -> Result<Screening, SelectionError> {
    check(target, x, size)?;
    let all: Vec<usize> = (0..x.ncols()).collect();
    let mut accepted = rank(target, x, &all, kind);
    accepted.truncate(size);
    Ok(finish(x.ncols(), accepted))
}

/// Screens against the residual of a least-squares fit on the features accepted so far,
/// accepting `step` features per round until `size` are accepted.
pub fn iterative_screening(
    target: &[f64],
    x: &DMatrix<f64>,
    size: usize,
    step: usize,
    method: ScreeningMethod,
    kind: CorrelationKind,
) -> Result<Screening, SelectionError> {
    check(target, x, size)?;
    let kind = match method {
        ScreeningMethod::Sis => CorrelationKind::Pearson,
        ScreeningMethod::Rrcs => kind,
    };
    let step = step.max(1);
    let y = DVector::from_column_slice(target);

    let mut accepted: Vec<usize> = Vec::with_capacity(size);
    let mut residual = target.to_vec();
    while accepted.len() < size {
        let remaining = complement(x.ncols(), &accepted);
        if remaining.is_empty() {
            break;
        }
        let take = step.min(size - accepted.len());
        accepted.extend(rank(&residual, x, &remaining, kind).into_iter().take(take));

        let reduced = select_columns(x, &accepted);
        let model =
            RidgeModel::fit_with_regularization(&reduced, &y, RESIDUAL_REGULARIZATION, true)?;
        let fitted = model.predict(&reduced)?;
        residual = target.iter().zip(fitted.iter()).map(|(t, f)| t - f).collect();
        debug!(
            accepted = accepted.len(),
            size, "Iterative screening round complete."
        );
    }
    Ok(finish(x.ncols(), accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<f64>, DMatrix<f64>) {
        // Column 0 drives the target, column 2 explains what column 0 leaves over,
        // column 1 is noise-like and column 3 is constant.
        let x = DMatrix::from_row_slice(
            6,
            4,
            &[
                1.0, 0.3, 0.0, 1.0, //
                2.0, -0.2, 1.0, 1.0, //
                3.0, 0.1, 0.0, 1.0, //
                4.0, 0.4, 1.0, 1.0, //
                5.0, -0.5, 0.0, 1.0, //
                6.0, 0.0, 1.0, 1.0,
            ],
        );
        let target = (0..6).map(|r| 2.0 * x[(r, 0)] + 0.5 * x[(r, 2)]).collect();
        (target, x)
    }

    #[test]
    fn sis_ranks_by_absolute_correlation() {
        let (target, x) = data();
        let s = sure_independence_screening(&target, &x, 2).unwrap();
        assert_eq!(s.accepted[0], 0);
        assert_eq!(s.accepted.len(), 2);
        assert_eq!(s.rejected.len(), 2);
        assert!(s.rejected.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rrcs_uses_requested_correlation() {
        let (target, x) = data();
        let s = robust_rank_screening(&target, &x, 1, CorrelationKind::Kendall).unwrap();
        assert_eq!(s.accepted, vec![0]);
        assert_eq!(s.rejected, vec![1, 2, 3]);
    }

    #[test]
    fn iterative_screening_picks_residual_feature_second() {
        let (target, x) = data();
        let s = iterative_screening(
            &target,
            &x,
            2,
            1,
            ScreeningMethod::Sis,
            CorrelationKind::Pearson,
        )
        .unwrap();
        assert_eq!(s.accepted, vec![0, 2]);
        assert_eq!(s.rejected, vec![1, 3]);
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        let (target, x) = data();
        assert_eq!(
            sure_independence_screening(&target, &x, 5),
            Err(SelectionError::InvalidSize {
                requested: 5,
                available: 4
            })
        );
        assert!(matches!(
            sure_independence_screening(&target[..3], &x, 1),
            Err(SelectionError::DimensionMismatch { .. })
        ));
        assert!(ScreeningMethod::from_str("lasso").is_err());
    }
}
