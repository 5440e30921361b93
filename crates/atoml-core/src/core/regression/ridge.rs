use super::{RegressionError, check_rows};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Settings for [`RidgeModel::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeOptions {
    /// Points of the log-spaced regularization grid.
    pub grid_points: usize,
    /// Number of grid refinements around the best point.
    pub refinements: usize,
    pub fit_intercept: bool,
}

impl Default for RidgeOptions {
    fn default() -> Self {
        Self {
            grid_points: 100,
            refinements: 2,
            fit_intercept: true,
        }
    }
}

/// A fitted linear ridge regression model.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeModel {
    coefficients: DVector<f64>,
    intercept: f64,
    regularization: f64,
}

struct Decomposition {
    u: DMatrix<f64>,
    s: DVector<f64>,
    v: DMatrix<f64>,
}

fn decompose(x: &DMatrix<f64>) -> Result<Decomposition, RegressionError> {
    let svd = x
        .clone()
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or(RegressionError::DecompositionFailed)?;
    let u = svd.u.ok_or(RegressionError::DecompositionFailed)?;
    let v = svd.v_t.ok_or(RegressionError::DecompositionFailed)?.transpose();
    Ok(Decomposition {
        u,
        s: svd.singular_values,
        v,
    })
}

fn centered(x: &DMatrix<f64>, y: &DVector<f64>) -> (DMatrix<f64>, DVector<f64>, DVector<f64>, f64) {
    let n = x.nrows() as f64;
    let x_mean = DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.sum() / n));
    let y_mean = y.sum() / n;
    let xc = DMatrix::from_fn(x.nrows(), x.ncols(), |r, c| x[(r, c)] - x_mean[c]);
    let yc = y.map(|v| v - y_mean);
    (xc, yc, x_mean, y_mean)
}

fn validate(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<(), RegressionError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(RegressionError::EmptyInput);
    }
    check_rows("ridge target", x.nrows(), y.len())
}

fn solve(
    svd: &Decomposition,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    prior: &DVector<f64>,
    omega2: f64,
) -> DVector<f64> {
    let residual = y - x * prior;
    let projected = svd.u.tr_mul(&residual);
    let filtered = DVector::from_fn(svd.s.len(), |k, _| {
        let s = svd.s[k];
        let denom = s * s + omega2;
        if denom > 0.0 { projected[k] * s / denom } else { 0.0 }
    });
    prior + &svd.v * filtered
}

/// Solves `w = p + V diag(s / (s^2 + omega2)) U^T (y - X p)`.
pub fn ridge_solve(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    prior: Option<&DVector<f64>>,
    omega2: f64,
) -> Result<DVector<f64>, RegressionError> {
    validate(x, y)?;
    let zero = DVector::zeros(x.ncols());
    let prior = prior.unwrap_or(&zero);
    check_rows("ridge prior", x.ncols(), prior.len())?;
    let svd = decompose(x)?;
    Ok(solve(&svd, x, y, prior, omega2))
}

fn loocv_error(
    svd: &Decomposition,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    prior: &DVector<f64>,
    omega2: f64,
) -> f64 {
    let w = solve(svd, x, y, prior, omega2);
    let fitted = x * w;
    let n = y.len();
    let mut epe = 0.0;
    for i in 0..n {
        let h_ii: f64 = (0..svd.s.len())
            .map(|k| {
                let s2 = svd.s[k] * svd.s[k];
                svd.u[(i, k)].powi(2) * s2 / (s2 + omega2)
            })
            .sum();
        let loo = (y[i] - fitted[i]) / (1.0 - h_ii);
        epe += loo * loo;
    }
    let epe = epe / n as f64;
    if epe.is_finite() { epe } else { f64::INFINITY }
}

/// Finds the regularization strength minimising the leave-one-out expected prediction
/// error.
///
/// The search runs over `ln(omega2)` on `grid_points` points spanning
/// `[ln(s_max^2) - 18, ln(s_max^2) + 2]`. Each refinement re-grids one grid spacing either
/// side of the current best point.
pub fn find_optimal_regularization(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    prior: Option<&DVector<f64>>,
    grid_points: usize,
    refinements: usize,
) -> Result<f64, RegressionError> {
    validate(x, y)?;
    let zero = DVector::zeros(x.ncols());
    let prior = prior.unwrap_or(&zero);
    check_rows("ridge prior", x.ncols(), prior.len())?;

    let svd = decompose(x)?;
    let s_max = svd.s.iter().copied().fold(0.0, f64::max);
    let top = (s_max * s_max).max(f64::MIN_POSITIVE).ln();
    let points = grid_points.max(3);

    let mut lo = top - 18.0;
    let mut hi = top + 2.0;
    let mut best = (f64::INFINITY, top);
    for _ in 0..=refinements {
        let step = (hi - lo) / (points - 1) as f64;
        for k in 0..points {
            let log_omega2 = lo + step * k as f64;
            let epe = loocv_error(&svd, x, y, prior, log_omega2.exp());
            if epe < best.0 {
                best = (epe, log_omega2);
            }
        }
        lo = best.1 - step;
        hi = best.1 + step;
    }

    let omega2 = best.1.exp();
    debug!(omega2, epe = best.0, "Ridge regularization selected.");
    Ok(omega2)
}

impl RidgeModel {
    /// Fits with the regularization chosen by [`find_optimal_regularization`].
    pub fn fit(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        options: &RidgeOptions,
    ) -> Result<Self, RegressionError> {
        validate(x, y)?;
        let omega2 = if options.fit_intercept {
            let (xc, yc, _, _) = centered(x, y);
            find_optimal_regularization(&xc, &yc, None, options.grid_points, options.refinements)?
        } else {
            find_optimal_regularization(x, y, None, options.grid_points, options.refinements)?
        };
        Self::fit_with_regularization(x, y, omega2, options.fit_intercept)
    }

    pub fn fit_with_regularization(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        omega2: f64,
        fit_intercept: bool,
    ) -> Result<Self, RegressionError> {
        if omega2 < 0.0 || !omega2.is_finite() {
            return Err(RegressionError::InvalidHyperparameters(format!(
                "ridge regularization must be finite and non-negative, got {}",
                omega2
            )));
        }
        if fit_intercept {
            validate(x, y)?;
            let (xc, yc, x_mean, y_mean) = centered(x, y);
            let coefficients = ridge_solve(&xc, &yc, None, omega2)?;
            let intercept = y_mean - x_mean.dot(&coefficients);
            Ok(Self {
                coefficients,
                intercept,
                regularization: omega2,
            })
        } else {
            Ok(Self {
                coefficients: ridge_solve(x, y, None, omega2)?,
                intercept: 0.0,
                regularization: omega2,
            })
        }
    }

    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, RegressionError> {
        check_rows("ridge features", self.coefficients.len(), x.ncols())?;
        Ok((x * &self.coefficients).add_scalar(self.intercept))
    }

    /// Feature indices ordered by decreasing absolute coefficient.
    pub fn feature_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.coefficients.len()).collect();
        order.sort_by(|&a, &b| {
            self.coefficients[b]
                .abs()
                .partial_cmp(&self.coefficients[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (DMatrix<f64>, DVector<f64>) {
        let x = DMatrix::from_row_slice(
            6,
            2,
            &[0.0, 1.0, 1.0, 0.0, 2.0, 1.0, 3.0, 3.0, 4.0, 2.0, 5.0, 5.0],
        );
        let y = DVector::from_iterator(6, (0..6).map(|r| 3.0 * x[(r, 0)] - 0.5 * x[(r, 1)] + 2.0));
        (x, y)
    }

    #[test]
    fn zero_regularization_recovers_exact_linear_model() {
        let (x, y) = linear_data();
        let model = RidgeModel::fit_with_regularization(&x, &y, 0.0, true).unwrap();
        assert!((model.coefficients()[0] - 3.0).abs() < 1e-9);
        assert!((model.coefficients()[1] + 0.5).abs() < 1e-9);
        assert!((model.intercept() - 2.0).abs() < 1e-9);
        assert_eq!(model.feature_order(), vec![0, 1]);
    }

    #[test]
    fn solve_matches_normal_equations() {
        let (x, y) = linear_data();
        let omega2 = 0.7;
        let w = ridge_solve(&x, &y, None, omega2).unwrap();
        let lhs = x.tr_mul(&x) + DMatrix::identity(2, 2) * omega2;
        let rhs = x.tr_mul(&y);
        let expected = lhs.lu().solve(&rhs).unwrap();
        assert!((w - expected).norm() < 1e-9);
    }

    #[test]
    fn noiseless_data_selects_small_regularization() {
        let (x, y) = linear_data();
        let model = RidgeModel::fit(&x, &y, &RidgeOptions::default()).unwrap();
        let s_max2 = decompose(&centered(&x, &y).0).unwrap().s.max().powi(2);
        assert!(model.regularization() < s_max2 * 1e-3);

        let predictions = model.predict(&x).unwrap();
        assert!((predictions - &y).amax() < 1e-2);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let (x, _) = linear_data();
        let y = DVector::zeros(4);
        assert!(matches!(
            ridge_solve(&x, &y, None, 1.0),
            Err(RegressionError::DimensionMismatch { .. })
        ));
        let model = RidgeModel::fit_with_regularization(&x, &DVector::zeros(6), 1.0, false).unwrap();
        assert!(model.predict(&DMatrix::zeros(2, 3)).is_err());
    }
}
