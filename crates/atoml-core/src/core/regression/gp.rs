use super::kernel::Kernel;
use super::optimize::NelderMead;
use super::{RegressionError, check_rows};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use tracing::debug;

/// Lower bound on every optimised hyperparameter.
pub const HYPERPARAMETER_LOWER_BOUND: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpOptions {
    pub optimize_hyperparameters: bool,
    pub standardize_target: bool,
    pub max_iterations: usize,
}

impl Default for GpOptions {
    fn default() -> Self {
        Self {
            optimize_hyperparameters: true,
            standardize_target: true,
            max_iterations: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpPrediction {
    pub mean: DVector<f64>,
    pub variance: Option<DVector<f64>>,
}

/// A fitted Gaussian process regressor.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    kernel: Kernel,
    regularization: f64,
    train: DMatrix<f64>,
    cholesky: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    target_mean: f64,
    target_scale: f64,
    negative_log_likelihood: f64,
}

struct Factorized {
    cholesky: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    nll: f64,
}

fn factorize(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    kernel: &Kernel,
    regularization: f64,
) -> Result<Factorized, RegressionError> {
    let n = x.nrows();
    let mut k = kernel.train_covariance(x);
    for i in 0..n {
        k[(i, i)] += regularization;
    }
    let cholesky =
        Cholesky::new(k).ok_or(RegressionError::NotPositiveDefinite { regularization })?;
    let alpha = cholesky.solve(y);
    let log_det_half: f64 = cholesky.l_dirty().diagonal().iter().map(|v| v.ln()).sum();
    let nll = 0.5 * y.dot(&alpha)
        + log_det_half
        + 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();
    Ok(Factorized {
        cholesky,
        alpha,
        nll,
    })
}

/// Negative log marginal likelihood `1/2 y^T alpha + sum ln L_ii + n/2 ln 2 pi`.
pub fn negative_log_marginal_likelihood(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    kernel: &Kernel,
    regularization: f64,
) -> Result<f64, RegressionError> {
    check_rows("gp target", x.nrows(), y.len())?;
    factorize(x, y, kernel, regularization).map(|f| f.nll)
}

impl GaussianProcess {
    pub fn fit(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        kernel: &Kernel,
        regularization: f64,
        options: &GpOptions,
    ) -> Result<Self, RegressionError> {
        if x.nrows() == 0 {
            return Err(RegressionError::EmptyInput);
        }
        check_rows("gp target", x.nrows(), y.len())?;
        kernel.validate_dimensions(x.ncols())?;
        if !(regularization.is_finite() && regularization > 0.0) {
            return Err(RegressionError::InvalidHyperparameters(format!(
                "regularization must be positive, got {}",
                regularization
            )));
        }

        let (target_mean, target_scale) = if options.standardize_target {
            let n = y.len() as f64;
            let mean = y.sum() / n;
            let sd = (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            (mean, if sd > 0.0 { sd } else { 1.0 })
        } else {
            (0.0, 1.0)
        };
        let scaled = y.map(|v| (v - target_mean) / target_scale);

        let (kernel, regularization) = if options.optimize_hyperparameters {
            optimize_hyperparameters(x, &scaled, kernel, regularization, options.max_iterations)?
        } else {
            (kernel.clone(), regularization)
        };

        let factorized = factorize(x, &scaled, &kernel, regularization)?;
        debug!(
            nll = factorized.nll,
            regularization, "Gaussian process fitted."
        );
        Ok(Self {
            kernel,
            regularization,
            train: x.clone(),
            cholesky: factorized.cholesky,
            alpha: factorized.alpha,
            target_mean,
            target_scale,
            negative_log_likelihood: factorized.nll,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    pub fn negative_log_likelihood(&self) -> f64 {
        self.negative_log_likelihood
    }

    /// Predictive mean and, if requested, the predictive variance
    /// `k(x, x) - v^T v + regularization` in target units.
    pub fn predict(
        &self,
        x: &DMatrix<f64>,
        uncertainty: bool,
    ) -> Result<GpPrediction, RegressionError> {
        check_rows("gp features", self.train.ncols(), x.ncols())?;
        let cross = self.kernel.cross_covariance(x, &self.train);
        let mean = (&cross * &self.alpha).map(|v| v * self.target_scale + self.target_mean);

        let variance = if uncertainty {
            let v = self
                .cholesky
                .l_dirty()
                .solve_lower_triangular(&cross.transpose())
                .ok_or(RegressionError::NotPositiveDefinite {
                    regularization: self.regularization,
                })?;
            let prior = self.kernel.diagonal(x);
            let scale2 = self.target_scale * self.target_scale;
            Some(DVector::from_fn(x.nrows(), |i, _| {
                let explained: f64 = v.column(i).iter().map(|e| e * e).sum();
                (prior[i] - explained + self.regularization).max(0.0) * scale2
            }))
        } else {
            None
        };
        Ok(GpPrediction { mean, variance })
    }
}

fn optimize_hyperparameters(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    kernel: &Kernel,
    regularization: f64,
    max_iterations: usize,
) -> Result<(Kernel, f64), RegressionError> {
    let mut start = kernel.parameters();
    start.push(regularization);
    let k = start.len();

    let objective = |theta: &[f64]| -> f64 {
        let candidate = match kernel.with_parameters(&theta[..k - 1]) {
            Ok(candidate) => candidate,
            Err(_) => return f64::INFINITY,
        };
        factorize(x, y, &candidate, theta[k - 1])
            .map(|f| f.nll)
            .unwrap_or(f64::INFINITY)
    };

    let optimizer = NelderMead {
        max_iterations,
        ..NelderMead::default()
    };
    let result = optimizer.minimize_positive(objective, &start, HYPERPARAMETER_LOWER_BOUND);
    debug!(
        iterations = result.iterations,
        converged = result.converged,
        nll = result.value,
        "Hyperparameter optimisation finished."
    );

    if !result.value.is_finite() {
        return Ok((kernel.clone(), regularization));
    }
    let optimized = kernel.with_parameters(&result.point[..k - 1])?;
    Ok((optimized, result.point[k - 1]))
}
