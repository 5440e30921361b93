use nalgebra::DMatrix;

/// A numeric feature matrix (rows are records, columns are features) with column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: DMatrix<f64>,
    names: Vec<String>,
}

impl FeatureMatrix {
    /// Wraps a matrix with names.
    ///
    /// Returns `None` when the number of names does not match the column count.
    pub fn new(data: DMatrix<f64>, names: Vec<String>) -> Option<Self> {
        (data.ncols() == names.len()).then_some(Self { data, names })
    }

    /// Wraps a matrix, naming its columns `f0`, `f1`, ...
    pub fn with_default_names(data: DMatrix<f64>) -> Self {
        let names = (0..data.ncols()).map(|i| format!("f{}", i)).collect();
        Self { data, names }
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Keeps the columns at `indices`, in the given order.
    pub fn select_columns(&self, indices: &[usize]) -> Self {
        Self {
            data: select_columns(&self.data, indices),
            names: indices.iter().map(|&i| self.names[i].clone()).collect(),
        }
    }

    /// Drops the columns at `indices`; duplicates and order are irrelevant.
    pub fn remove_columns(&self, indices: &[usize]) -> Self {
        let keep = complement(self.ncols(), indices);
        self.select_columns(&keep)
    }

    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            data: select_rows(&self.data, indices),
            names: self.names.clone(),
        }
    }
}

/// Indices in `0..len` that are not listed in `removed`, ascending.
pub fn complement(len: usize, removed: &[usize]) -> Vec<usize> {
    let mut mask = vec![true; len];
    for &i in removed {
        if i < len {
            mask[i] = false;
        }
    }
    (0..len).filter(|&i| mask[i]).collect()
}

pub fn select_columns(m: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), indices.len(), |r, c| m[(r, indices[c])])
}

pub fn select_rows(m: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(indices.len(), m.ncols(), |r, c| m[(indices[r], c)])
}

/// Concatenates matrices column-wise; `None` if row counts differ.
pub fn hstack(blocks: &[&DMatrix<f64>]) -> Option<DMatrix<f64>> {
    let nrows = blocks.first().map(|b| b.nrows()).unwrap_or(0);
    if blocks.iter().any(|b| b.nrows() != nrows) {
        return None;
    }
    let ncols = blocks.iter().map(|b| b.ncols()).sum();
    let mut out = DMatrix::zeros(nrows, ncols);
    let mut offset = 0;
    for block in blocks {
        out.columns_mut(offset, block.ncols()).copy_from(*block);
        offset += block.ncols();
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureMatrix {
        let data = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        FeatureMatrix::with_default_names(data)
    }

    #[test]
    fn new_requires_matching_names() {
        let data = DMatrix::zeros(2, 2);
        assert!(FeatureMatrix::new(data.clone(), vec!["a".into()]).is_none());
        assert!(FeatureMatrix::new(data, vec!["a".into(), "b".into()]).is_some());
    }

    #[test]
    fn remove_columns_keeps_names_aligned() {
        let m = sample().remove_columns(&[1, 1]);
        assert_eq!(m.names(), &["f0", "f2"]);
        assert_eq!(m.data(), &DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 4.0, 6.0]));
    }

    #[test]
    fn select_columns_follows_requested_order() {
        let m = sample().select_columns(&[2, 0]);
        assert_eq!(m.names(), &["f2", "f0"]);
        assert_eq!(m.data()[(1, 0)], 6.0);
    }

    #[test]
    fn hstack_rejects_row_mismatch() {
        let a = sample().data().clone();
        let b = DMatrix::zeros(3, 1);
        assert!(hstack(&[&a, &b]).is_none());

        let c = DMatrix::from_element(2, 1, 9.0);
        let stacked = hstack(&[&a, &c]).unwrap();
        assert_eq!(stacked.ncols(), 4);
        assert_eq!(stacked[(1, 3)], 9.0);
        assert_eq!(stacked[(1, 2)], 6.0);
    }

    #[test]
    fn complement_ignores_out_of_range_indices() {
        assert_eq!(complement(4, &[0, 2, 9]), vec![1, 3]);
    }
}
