use super::FeatureError;
use crate::core::models::matrix::FeatureMatrix;
use nalgebra::{DMatrix, DVector};

/// Columns whose training values are all equal.
pub fn zero_variance_columns(train: &DMatrix<f64>) -> Vec<usize> {
    (0..train.ncols())
        .filter(|&c| {
            let column = train.column(c);
            match column.iter().next() {
                Some(&first) => {
                    let tol = 1e-12 * first.abs().max(1.0);
                    column.iter().all(|&v| (v - first).abs() <= tol)
                }
                None => true,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned {
    pub train: FeatureMatrix,
    pub test: Option<FeatureMatrix>,
    pub removed: Vec<usize>,
}

fn check_width(train: &FeatureMatrix, test: Option<&FeatureMatrix>) -> Result<(), FeatureError> {
    match test {
        Some(t) if t.ncols() != train.ncols() => Err(FeatureError::WidthMismatch {
            expected: train.ncols(),
            found: t.ncols(),
        }),
        _ => Ok(()),
    }
}

/// Drops features that carry no information in the training data from both matrices.
pub fn clean_zero(
    train: &FeatureMatrix,
    test: Option<&FeatureMatrix>,
) -> Result<Cleaned, FeatureError> {
    check_width(train, test)?;
    let removed = zero_variance_columns(train.data());
    Ok(Cleaned {
        train: train.remove_columns(&removed),
        test: test.map(|t| t.remove_columns(&removed)),
        removed,
    })
}

/// Column-wise affine scaling fitted on training data.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: DVector<f64>,
    std: DVector<f64>,
}

impl Scaler {
    /// Fits the per-column mean and population standard deviation. Columns with zero
    /// deviation get a scale of one so they are only centred.
    pub fn fit(train: &DMatrix<f64>) -> Self {
        let n = train.nrows().max(1) as f64;
        let mean = DVector::from_iterator(
            train.ncols(),
            train.column_iter().map(|c| c.sum() / n),
        );
        let std = DVector::from_iterator(
            train.ncols(),
            train.column_iter().zip(mean.iter()).map(|(c, &m)| {
                let var = c.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd > 0.0 { sd } else { 1.0 }
            }),
        );
        Self { mean, std }
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn std(&self) -> &DVector<f64> {
        &self.std
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, FeatureError> {
        if x.ncols() != self.mean.len() {
            return Err(FeatureError::WidthMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }
        Ok(DMatrix::from_fn(x.nrows(), x.ncols(), |r, c| {
            (x[(r, c)] - self.mean[c]) / self.std[c]
        }))
    }

    pub fn transform_matrix(&self, x: &FeatureMatrix) -> Result<FeatureMatrix, FeatureError> {
        let data = self.transform(x.data())?;
        Ok(FeatureMatrix::new(data, x.names().to_vec()).unwrap_or_else(|| x.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standardized {
    pub train: FeatureMatrix,
    pub test: Option<FeatureMatrix>,
    pub scaler: Scaler,
}

/// Centres and scales both matrices by the training statistics.
pub fn standardize(
    train: &FeatureMatrix,
    test: Option<&FeatureMatrix>,
) -> Result<Standardized, FeatureError> {
    check_width(train, test)?;
    let scaler = Scaler::fit(train.data());
    Ok(Standardized {
        train: scaler.transform_matrix(train)?,
        test: test.map(|t| scaler.transform_matrix(t)).transpose()?,
        scaler,
    })
}
