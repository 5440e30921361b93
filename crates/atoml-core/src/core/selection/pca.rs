use super::{SelectionError, check_rows};
use crate::core::regression::RegressionError;
use nalgebra::{DMatrix, DVector};

/// Training and test data projected onto the leading principal components.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaProjection {
    pub train: DMatrix<f64>,
    pub test: Option<DMatrix<f64>>,
    /// Variance captured by each retained component.
    pub explained_variance: Vec<f64>,
}

/// Projects both matrices onto the first `components` right-singular vectors of the
/// mean-centred training matrix.
pub fn pca(
    train: &DMatrix<f64>,
    test: Option<&DMatrix<f64>>,
    components: usize,
) -> Result<PcaProjection, SelectionError> {
    let (n, d) = train.shape();
    if n == 0 || d == 0 {
        return Err(SelectionError::EmptyInput);
    }
    if let Some(t) = test {
        check_rows("pca test features", d, t.ncols())?;
    }
    if components == 0 || components > n.min(d) {
        return Err(SelectionError::InvalidSize {
            requested: components,
            available: n.min(d),
        });
    }

    let mean = DVector::from_iterator(d, train.column_iter().map(|c| c.sum() / n as f64));
    let center = |m: &DMatrix<f64>| DMatrix::from_fn(m.nrows(), d, |r, c| m[(r, c)] - mean[c]);
    let centered = center(train);

    let svd = centered
        .clone()
        .try_svd(false, true, f64::EPSILON, 0)
        .ok_or(RegressionError::DecompositionFailed)?;
    let v_t = svd.v_t.ok_or(RegressionError::DecompositionFailed)?;

    let mut ranked: Vec<usize> = (0..svd.singular_values.len()).collect();
    ranked.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(components);

    let basis = DMatrix::from_fn(d, components, |r, c| v_t[(ranked[c], r)]);
    let denom = (n.max(2) - 1) as f64;
    Ok(PcaProjection {
        train: &centered * &basis,
        test: test.map(|t| center(t) * &basis),
        explained_variance: ranked
            .iter()
            .map(|&k| svd.singular_values[k].powi(2) / denom)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_component_follows_dominant_direction() {
        let train = DMatrix::from_row_slice(
            4,
            2,
            &[-3.0, -3.1, -1.0, -0.9, 1.0, 1.1, 3.0, 2.9],
        );
        let test = DMatrix::from_row_slice(1, 2, &[2.0, 2.0]);
        let projection = pca(&train, Some(&test), 1).unwrap();

        assert_eq!(projection.train.shape(), (4, 1));
        let spread = projection.train.column(0).amax();
        assert!((spread - (3.0f64.powi(2) + 3.0f64.powi(2)).sqrt()).abs() < 0.2);
        let t = projection.test.unwrap()[(0, 0)].abs();
        assert!((t - 8f64.sqrt()).abs() < 0.1);
        assert!(projection.explained_variance[0] > 1.0);
    }

    #[test]
    fn explained_variance_is_sorted() {
        let train = DMatrix::from_row_slice(
            5,
            3,
            &[
                1.0, 0.1, 5.0, 2.0, -0.1, 3.0, 3.0, 0.2, 1.0, 4.0, 0.0, 4.0, 5.0, -0.2, 2.0,
            ],
        );
        let projection = pca(&train, None, 3).unwrap();
        let ev = &projection.explained_variance;
        assert!(ev[0] >= ev[1] && ev[1] >= ev[2]);
    }

    #[test]
    fn component_count_is_bounded() {
        let train = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(
            pca(&train, None, 3),
            Err(SelectionError::InvalidSize {
                requested: 3,
                available: 2
            })
        );
    }
}
