use super::RegressionError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A single additive covariance term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KernelTerm {
    /// `s * exp(-1/2 sum_d ((x_d - x'_d) / w_d)^2)`; a single width applies to every
    /// dimension.
    SquaredExponential { widths: Vec<f64>, scaling: f64 },
    /// `s * x . x'`
    Linear { scaling: f64 },
    Constant { value: f64 },
}

impl KernelTerm {
    fn parameter_count(&self) -> usize {
        match self {
            KernelTerm::SquaredExponential { widths, .. } => widths.len() + 1,
            KernelTerm::Linear { .. } | KernelTerm::Constant { .. } => 1,
        }
    }

    fn evaluate(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            KernelTerm::SquaredExponential { widths, scaling } => {
                let sq: f64 = a
                    .iter()
                    .zip(b)
                    .enumerate()
                    .map(|(d, (x, y))| {
                        let w = if widths.len() == 1 { widths[0] } else { widths[d] };
                        ((x - y) / w).powi(2)
                    })
                    .sum();
                scaling * (-0.5 * sq).exp()
            }
            KernelTerm::Linear { scaling } => {
                scaling * a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>()
            }
            KernelTerm::Constant { value } => *value,
        }
    }
}

/// A covariance function built as a sum of [`KernelTerm`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    terms: Vec<KernelTerm>,
}

impl Default for Kernel {
    /// Squared-exponential plus linear kernel with unit parameters.
    fn default() -> Self {
        Self {
            terms: vec![
                KernelTerm::SquaredExponential {
                    widths: vec![1.0],
                    scaling: 1.0,
                },
                KernelTerm::Linear { scaling: 1.0 },
            ],
        }
    }
}

impl Kernel {
    pub fn new(terms: Vec<KernelTerm>) -> Result<Self, RegressionError> {
        if terms.is_empty() {
            return Err(RegressionError::InvalidKernel(
                "a kernel needs at least one term".to_string(),
            ));
        }
        let kernel = Self { terms };
        kernel.check_positive(&kernel.parameters())?;
        Ok(kernel)
    }

    /// A squared-exponential kernel with one shared width.
    pub fn squared_exponential(width: f64, scaling: f64) -> Result<Self, RegressionError> {
        Self::new(vec![KernelTerm::SquaredExponential {
            widths: vec![width],
            scaling,
        }])
    }

    pub fn terms(&self) -> &[KernelTerm] {
        &self.terms
    }

    /// Checks that every width list is either shared (length one) or matches `dims`.
    pub fn validate_dimensions(&self, dims: usize) -> Result<(), RegressionError> {
        for term in &self.terms {
            if let KernelTerm::SquaredExponential { widths, .. } = term {
                if widths.len() != 1 && widths.len() != dims {
                    return Err(RegressionError::InvalidKernel(format!(
                        "{} kernel widths given for {} features",
                        widths.len(),
                        dims
                    )));
                }
            }
        }
        Ok(())
    }

    /// Replaces a shared squared-exponential width by one width per dimension.
    pub fn broadcast_widths(&self, dims: usize) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|term| match term {
                KernelTerm::SquaredExponential { widths, scaling } if widths.len() == 1 => {
                    KernelTerm::SquaredExponential {
                        widths: vec![widths[0]; dims],
                        scaling: *scaling,
                    }
                }
                other => other.clone(),
            })
            .collect();
        Self { terms }
    }

    pub fn parameter_count(&self) -> usize {
        self.terms.iter().map(KernelTerm::parameter_count).sum()
    }

    /// Flattens all hyperparameters: widths then scaling for squared-exponential terms,
    /// the scaling or value for the others.
    pub fn parameters(&self) -> Vec<f64> {
        let mut params = Vec::with_capacity(self.parameter_count());
        for term in &self.terms {
            match term {
                KernelTerm::SquaredExponential { widths, scaling } => {
                    params.extend(widths);
                    params.push(*scaling);
                }
                KernelTerm::Linear { scaling } => params.push(*scaling),
                KernelTerm::Constant { value } => params.push(*value),
            }
        }
        params
    }

    fn check_positive(&self, params: &[f64]) -> Result<(), RegressionError> {
        match params.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
            Some(p) => Err(RegressionError::InvalidHyperparameters(format!(
                "kernel hyperparameters must be positive and finite, got {}",
                p
            ))),
            None => Ok(()),
        }
    }

    /// Restores a kernel of the same shape from a flattened parameter vector.
    pub fn with_parameters(&self, params: &[f64]) -> Result<Self, RegressionError> {
        if params.len() != self.parameter_count() {
            return Err(RegressionError::DimensionMismatch {
                context: "kernel hyperparameters",
                expected: self.parameter_count(),
                found: params.len(),
            });
        }
        self.check_positive(params)?;
        let mut rest = params;
        let terms = self
            .terms
            .iter()
            .map(|term| {
                let (head, tail) = rest.split_at(term.parameter_count());
                rest = tail;
                match term {
                    KernelTerm::SquaredExponential { widths, .. } => {
                        KernelTerm::SquaredExponential {
                            widths: head[..widths.len()].to_vec(),
                            scaling: head[widths.len()],
                        }
                    }
                    KernelTerm::Linear { .. } => KernelTerm::Linear { scaling: head[0] },
                    KernelTerm::Constant { .. } => KernelTerm::Constant { value: head[0] },
                }
            })
            .collect();
        Ok(Self { terms })
    }

    pub fn evaluate(&self, a: &[f64], b: &[f64]) -> f64 {
        self.terms.iter().map(|t| t.evaluate(a, b)).sum()
    }

    /// Symmetric `n x n` covariance of the training rows.
    pub fn train_covariance(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let rows = rows(x);
        let n = rows.len();
        let mut k = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let v = self.evaluate(&rows[i], &rows[j]);
                k[(i, j)] = v;
                k[(j, i)] = v;
            }
        }
        k
    }

    /// `m x n` covariance between `m` query rows and `n` training rows.
    pub fn cross_covariance(&self, query: &DMatrix<f64>, train: &DMatrix<f64>) -> DMatrix<f64> {
        let q = rows(query);
        let t = rows(train);
        DMatrix::from_fn(q.len(), t.len(), |i, j| self.evaluate(&q[i], &t[j]))
    }

    /// Prior variances `k(x, x)` of each row.
    pub fn diagonal(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let rows = rows(x);
        DVector::from_iterator(rows.len(), rows.iter().map(|r| self.evaluate(r, r)))
    }
}

fn rows(x: &DMatrix<f64>) -> Vec<Vec<f64>> {
    x.row_iter().map(|r| r.iter().copied().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn se_plus_linear() -> Kernel {
        Kernel::new(vec![
            KernelTerm::SquaredExponential {
                widths: vec![0.5, 2.0],
                scaling: 1.5,
            },
            KernelTerm::Linear { scaling: 0.1 },
        ])
        .unwrap()
    }

    #[test]
    fn evaluate_sums_terms() {
        let k = se_plus_linear();
        let a = [1.0, 2.0];
        let b = [0.0, 0.0];
        let se = 1.5 * (-0.5f64 * (4.0 + 1.0)).exp();
        assert!((k.evaluate(&a, &b) - se).abs() < 1e-12);
        assert!((k.evaluate(&a, &a) - (1.5 + 0.1 * 5.0)).abs() < 1e-12);
    }

    #[test]
    fn parameters_round_trip_through_flattening() {
        let k = se_plus_linear();
        assert_eq!(k.parameters(), vec![0.5, 2.0, 1.5, 0.1]);
        let updated = k.with_parameters(&[1.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            updated.terms()[1],
            KernelTerm::Linear { scaling: 3.0 }
        );
        assert!(k.with_parameters(&[1.0]).is_err());
        assert!(k.with_parameters(&[1.0, -1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn covariance_matrices_have_expected_shapes() {
        let k = Kernel::squared_exponential(1.0, 1.0).unwrap();
        let x = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let q = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 5.0, 5.0]);

        let train = k.train_covariance(&x);
        assert_eq!(train.shape(), (3, 3));
        assert_eq!(train, train.transpose());
        assert_eq!(train[(0, 0)], 1.0);

        let cross = k.cross_covariance(&q, &x);
        assert_eq!(cross.shape(), (2, 3));
        assert_eq!(cross[(0, 0)], 1.0);
        assert!(cross[(1, 0)] < 1e-10);
        assert_eq!(k.diagonal(&q).as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn width_count_must_match_features() {
        let k = se_plus_linear();
        assert!(k.validate_dimensions(2).is_ok());
        assert!(k.validate_dimensions(3).is_err());
        let shared = Kernel::squared_exponential(0.5, 1.0).unwrap();
        assert!(shared.validate_dimensions(7).is_ok());
        assert_eq!(shared.broadcast_widths(3).parameter_count(), 4);
    }
}
