use super::FeatureError;
use crate::core::models::matrix::{FeatureMatrix, hstack};
use itertools::Itertools;
use nalgebra::DMatrix;

/// Exponents used by the weighted products and log sums unless configured otherwise.
pub const DEFAULT_EXPONENTS: (i32, i32) = (2, 4);

fn pairs(d: usize) -> Vec<(usize, usize)> {
    (0..d).tuple_combinations().chain((0..d).map(|i| (i, i))).sorted().collect()
}

fn pairwise<F>(x: &DMatrix<f64>, f: F) -> DMatrix<f64>
where
    F: Fn(f64, f64) -> f64,
{
    let pairs = pairs(x.ncols());
    DMatrix::from_fn(x.nrows(), pairs.len(), |r, c| {
        let (i, j) = pairs[c];
        f(x[(r, i)], x[(r, j)])
    })
}

/// `x_i * x_j` for every pair `i <= j`.
pub fn order_2(x: &DMatrix<f64>) -> DMatrix<f64> {
    pairwise(x, |a, b| a * b)
}

/// `x_i / x_j` for every pair `i <= j`; zero where the denominator vanishes.
pub fn div_order_2(x: &DMatrix<f64>) -> DMatrix<f64> {
    pairwise(x, |a, b| if b == 0.0 { 0.0 } else { a / b })
}

/// `x_i^a * x_j^b` for every pair `i <= j`.
pub fn order_2ab(x: &DMatrix<f64>, a: i32, b: i32) -> DMatrix<f64> {
    pairwise(x, |xi, xj| xi.powi(a) * xj.powi(b))
}

/// `a ln|x_i| + b ln|x_j|` for every pair `i <= j`; zero when either value is zero.
pub fn ablog(x: &DMatrix<f64>, a: i32, b: i32) -> DMatrix<f64> {
    pairwise(x, |xi, xj| {
        if xi == 0.0 || xj == 0.0 {
            0.0
        } else {
            a as f64 * xi.abs().ln() + b as f64 * xj.abs().ln()
        }
    })
}

fn pair_labels<F>(names: &[String], f: F) -> Vec<String>
where
    F: Fn(&str, &str) -> String,
{
    pairs(names.len())
        .into_iter()
        .map(|(i, j)| f(&names[i], &names[j]))
        .collect()
}

/// Concatenates the original features with the four second-order blocks, in the
/// order product, quotient, weighted product, log sum.
///
/// # Errors
///
/// Returns [`FeatureError::RowMismatch`] if the blocks disagree in row count, or
/// [`FeatureError::WidthMismatch`] if the labels do not cover every column.
pub fn expand(matrix: &FeatureMatrix, a: i32, b: i32) -> Result<FeatureMatrix, FeatureError> {
    let x = matrix.data();
    let names = matrix.names();

    let blocks = [
        order_2(x),
        div_order_2(x),
        order_2ab(x, a, b),
        ablog(x, a, b),
    ];
    let mut parts = vec![x];
    parts.extend(blocks.iter());
    let expected = expanded_width(x.ncols());
    let data = hstack(&parts).ok_or(FeatureError::RowMismatch)?;

    let mut labels = names.to_vec();
    labels.extend(pair_labels(names, |i, j| format!("{}_x_{}", i, j)));
    labels.extend(pair_labels(names, |i, j| format!("{}_div_{}", i, j)));
    labels.extend(pair_labels(names, |i, j| format!("{}_{}_x_{}_{}", i, a, j, b)));
    labels.extend(pair_labels(names, |i, j| format!("log_{}_{}_x_{}_{}", i, a, j, b)));

    let found = labels.len();
    FeatureMatrix::new(data, labels).ok_or(FeatureError::WidthMismatch { expected, found })
}

/// Width of [`expand`] output for `d` input features.
pub fn expanded_width(d: usize) -> usize {
    d + 4 * (d * (d + 1) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureMatrix {
        FeatureMatrix::new(
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, -3.0]),
            vec!["a".into(), "b".into()],
        )
        .unwrap()
    }

    #[test]
    fn expand_produces_all_blocks_and_labels() {
        let expanded = expand(&sample(), 2, 4).unwrap();
        assert_eq!(expanded.ncols(), expanded_width(2));
        assert_eq!(expanded.ncols(), 14);
        assert_eq!(
            &expanded.names()[2..5],
            &["a_x_a".to_string(), "a_x_b".into(), "b_x_b".into()]
        );
        assert_eq!(expanded.names()[5], "a_div_a");
        assert_eq!(expanded.names()[9], "a_2_x_b_4");
        assert_eq!(expanded.names()[13], "log_b_2_x_b_4");
    }

    #[test]
    fn expand_of_a_featureless_matrix_is_empty() {
        let empty = FeatureMatrix::with_default_names(DMatrix::zeros(3, 0));
        let expanded = expand(&empty, 2, 4).unwrap();
        assert_eq!(expanded.nrows(), 3);
        assert_eq!(expanded.ncols(), 0);
    }

    #[test]
    fn products_and_quotients_follow_pair_order() {
        let x = sample().data().clone();
        let o2 = order_2(&x);
        assert_eq!(o2.row(0).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 4.0]);

        let div = div_order_2(&x);
        assert_eq!(div[(0, 1)], 0.5);
        // Row 1 has a zero numerator for a/b and a zero denominator for a/a.
        assert_eq!(div[(1, 0)], 0.0);
        assert_eq!(div[(1, 1)], 0.0);
        assert_eq!(div[(1, 2)], 1.0);
    }

    #[test]
    fn weighted_products_use_integer_exponents() {
        let x = sample().data().clone();
        let ab = order_2ab(&x, 2, 4);
        assert_eq!(ab[(0, 1)], 16.0);
        assert_eq!(ab[(1, 2)], 729.0);
    }

    #[test]
    fn ablog_is_zero_when_either_value_is_zero() {
        let x = sample().data().clone();
        let logs = ablog(&x, 2, 4);
        assert!((logs[(0, 1)] - 4.0 * 2f64.ln()).abs() < 1e-12);
        assert_eq!(logs[(1, 0)], 0.0);
        assert_eq!(logs[(1, 1)], 0.0);
        assert!((logs[(1, 2)] - 6.0 * 3f64.ln()).abs() < 1e-12);
    }
}
