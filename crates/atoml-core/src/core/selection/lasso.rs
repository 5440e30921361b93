use super::correlation::pearson;
use super::{SelectionError, check_rows};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LassoOptions {
    /// Smallest regularization on the path.
    pub alpha: f64,
    /// Number of log-spaced points on the path.
    pub steps: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for LassoOptions {
    fn default() -> Self {
        Self {
            alpha: 1e-1,
            steps: 20,
            max_iterations: 100_000,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LassoPathPoint {
    pub alpha: f64,
    pub nonzero: usize,
    pub test_rmse: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LassoResult {
    /// Every feature index, in the order features enter the model along the path.
    /// Features that never enter follow, ordered by absolute correlation with the target.
    pub order: Vec<usize>,
    /// Coefficients at the smallest alpha.
    pub coefficients: DVector<f64>,
    pub intercept: f64,
    pub path: Vec<LassoPathPoint>,
    /// Lowest test RMSE along the path, if test data was supplied.
    pub best_error: Option<f64>,
    /// Non-zero coefficient count at the best path point (the last point without test
    /// data).
    pub min_features: usize,
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Minimises `1/(2n) |y - Xw|^2 + alpha |w|_1` on centred data by cyclic coordinate
/// descent, updating `w` in place.
fn coordinate_descent(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    alpha: f64,
    w: &mut DVector<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> usize {
    let n = x.nrows() as f64;
    let norms: Vec<f64> = x.column_iter().map(|c| c.norm_squared() / n).collect();
    let mut residual = y - x * &*w;
    for iteration in 0..max_iterations {
        let mut max_change: f64 = 0.0;
        for j in 0..x.ncols() {
            if norms[j] == 0.0 {
                continue;
            }
            let column = x.column(j);
            let rho = column.dot(&residual) / n + norms[j] * w[j];
            let updated = soft_threshold(rho, alpha) / norms[j];
            let delta = updated - w[j];
            if delta != 0.0 {
                residual.axpy(-delta, &column, 1.0);
                w[j] = updated;
                max_change = max_change.max(delta.abs());
            }
        }
        if max_change < tolerance {
            return iteration + 1;
        }
    }
    max_iterations
}

/// Runs the lasso along a regularization path from the smallest alpha that zeroes every
/// coefficient down to `options.alpha`.
pub fn lasso(
    target: &[f64],
    train: &DMatrix<f64>,
    test: Option<(&DMatrix<f64>, &[f64])>,
    options: &LassoOptions,
) -> Result<LassoResult, SelectionError> {
    if train.nrows() == 0 || train.ncols() == 0 {
        return Err(SelectionError::EmptyInput);
    }
    check_rows("lasso target", train.nrows(), target.len())?;
    if let Some((tx, ty)) = test {
        check_rows("lasso test features", train.ncols(), tx.ncols())?;
        check_rows("lasso test target", tx.nrows(), ty.len())?;
    }

    let n = train.nrows() as f64;
    let d = train.ncols();
    let x_mean = DVector::from_iterator(d, train.column_iter().map(|c| c.sum() / n));
    let y_mean = target.iter().sum::<f64>() / n;
    let x = DMatrix::from_fn(train.nrows(), d, |r, c| train[(r, c)] - x_mean[c]);
    let y = DVector::from_iterator(target.len(), target.iter().map(|v| v - y_mean));

    // Slightly above the exact bound so rounding cannot let a feature in at the start.
    let alpha_max = x.tr_mul(&y).amax() / n * (1.0 + 1e-10);
    let alpha_min = options.alpha.max(f64::MIN_POSITIVE);
    let steps = options.steps.max(1);
    let alphas: Vec<f64> = if alpha_min >= alpha_max || steps == 1 {
        vec![alpha_min]
    } else {
        let (hi, lo) = (alpha_max.ln(), alpha_min.ln());
        (0..steps)
            .map(|k| (hi + (lo - hi) * k as f64 / (steps - 1) as f64).exp())
            .collect()
    };

    let mut w = DVector::zeros(d);
    let mut entered = vec![false; d];
    let mut order = Vec::with_capacity(d);
    let mut path = Vec::with_capacity(alphas.len());
    let mut best: Option<(f64, usize)> = None;

    for &alpha in &alphas {
        coordinate_descent(&x, &y, alpha, &mut w, options.max_iterations, options.tolerance);

        let mut newcomers: Vec<usize> = (0..d).filter(|&j| w[j] != 0.0 && !entered[j]).collect();
        newcomers.sort_by(|&a, &b| {
            w[b].abs()
                .partial_cmp(&w[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for &j in &newcomers {
            entered[j] = true;
        }
        order.extend(newcomers);

        let nonzero = w.iter().filter(|v| **v != 0.0).count();
        let intercept = y_mean - x_mean.dot(&w);
        let test_rmse = test.map(|(tx, ty)| {
            let predicted = (tx * &w).add_scalar(intercept);
            let sq: f64 = predicted.iter().zip(ty).map(|(p, t)| (p - t).powi(2)).sum();
            (sq / ty.len().max(1) as f64).sqrt()
        });
        if let Some(err) = test_rmse {
            if best.is_none_or(|(b, _)| err < b) {
                best = Some((err, nonzero));
            }
        }
        path.push(LassoPathPoint {
            alpha,
            nonzero,
            test_rmse,
        });
    }

    let mut rest: Vec<(usize, f64)> = (0..d)
        .filter(|&j| !entered[j])
        .map(|j| {
            let column: Vec<f64> = train.column(j).iter().copied().collect();
            (j, pearson(&column, target).abs())
        })
        .collect();
    rest.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    order.extend(rest.into_iter().map(|(j, _)| j));

    let last_nonzero = path.last().map(|p| p.nonzero).unwrap_or(0);
    debug!(
        points = path.len(),
        entered = last_nonzero,
        "Lasso path computed."
    );
    Ok(LassoResult {
        order,
        intercept: y_mean - x_mean.dot(&w),
        coefficients: w,
        path,
        best_error: best.map(|(e, _)| e),
        min_features: best.map(|(_, f)| f).unwrap_or(last_nonzero),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (DMatrix<f64>, Vec<f64>) {
        let x = DMatrix::from_row_slice(
            8,
            3,
            &[
                1.0, 0.5, 0.2, //
                2.0, -1.0, 0.1, //
                3.0, 0.0, -0.3, //
                4.0, 1.5, 0.0, //
                5.0, -0.5, 0.4, //
                6.0, 1.0, -0.1, //
                7.0, -1.5, 0.3, //
                8.0, 0.0, -0.2,
            ],
        );
        let y = (0..8).map(|r| 3.0 * x[(r, 0)] + 1.0 * x[(r, 1)]).collect();
        (x, y)
    }

    #[test]
    fn strongest_feature_enters_first() {
        let (x, y) = data();
        let result = lasso(&y, &x, None, &LassoOptions {
            alpha: 1e-4,
            ..LassoOptions::default()
        })
        .unwrap();
        assert_eq!(result.order.len(), 3);
        assert_eq!(&result.order[..2], &[0, 1]);
        assert_eq!(result.path.len(), 20);
        assert_eq!(result.path[0].nonzero, 0);
        assert!((result.coefficients[0] - 3.0).abs() < 1e-2);
        assert!((result.coefficients[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_error_tracks_best_point() {
        let (x, y) = data();
        let result = lasso(&y, &x, Some((&x, &y)), &LassoOptions {
            alpha: 1e-4,
            ..LassoOptions::default()
        })
        .unwrap();
        let best = result.best_error.unwrap();
        assert!(best < 1e-2);
        assert!(result.path.iter().all(|p| p.test_rmse.unwrap() >= best));
        assert!(result.min_features >= 2);
    }

    #[test]
    fn large_alpha_keeps_everything_out() {
        let (x, y) = data();
        let result = lasso(&y, &x, None, &LassoOptions {
            alpha: 1e6,
            ..LassoOptions::default()
        })
        .unwrap();
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.min_features, 0);
        assert_eq!(result.order[0], 0);
        assert!(result.coefficients.iter().all(|c| *c == 0.0));
    }
}
