use super::FeatureError;
use crate::core::models::element::{AtomicProperty, Element};
use crate::core::models::structure::Structure;
use nalgebra::{DMatrix, DVector};

/// Finds the neighbours of every atom within a coordination shell.
///
/// Atom `j` neighbours atom `i` when their distance lies strictly inside
/// `((shell - 1) * (rc_i + rc_j) + dx, shell * (rc_i + rc_j) + dx)`, where `rc` are
/// covalent radii and the lower bound is zero for the first shell.
///
/// # Errors
///
/// Returns [`FeatureError::InvalidShell`] for `shell == 0`, or an element error when an
/// atom has no tabulated covalent radius.
pub fn neighbor_list(
    structure: &Structure,
    dx: f64,
    shell: usize,
) -> Result<Vec<Vec<usize>>, FeatureError> {
    if shell == 0 {
        return Err(FeatureError::InvalidShell(shell));
    }
    let radii = structure
        .atoms()
        .iter()
        .map(|a| a.element().map(|e| e.covalent_radius))
        .collect::<Result<Vec<_>, _>>()?;

    let n = structure.len();
    let mut neighbors = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let bond = radii[i] + radii[j];
            let d = structure.distance(i, j);
            let d_lo = if shell == 1 {
                0.0
            } else {
                (shell - 1) as f64 * bond + dx
            };
            let d_hi = shell as f64 * bond + dx;
            if d > d_lo && d < d_hi {
                neighbors[i].push(j);
            }
        }
    }
    Ok(neighbors)
}

/// Binary connectivity matrix of a structure.
///
/// A neighbour list attached to the structure takes precedence over the distance
/// criterion of [`neighbor_list`].
pub fn connection_matrix(structure: &Structure, dx: f64) -> Result<DMatrix<f64>, FeatureError> {
    let computed;
    let neighbors = match structure.neighborlist() {
        Some(nl) => nl,
        None => {
            computed = neighbor_list(structure, dx, 1)?;
            &computed[..]
        }
    };

    let n = structure.len();
    let mut cm = DMatrix::zeros(n, n);
    for (i, row) in neighbors.iter().enumerate() {
        for &j in row {
            cm[(i, j)] = 1.0;
        }
    }
    Ok(cm)
}

/// Indicator vector: 1.0 where the atomic number equals `number`.
pub fn element_list(numbers: &[u8], number: u8) -> DVector<f64> {
    DVector::from_iterator(
        numbers.len(),
        numbers.iter().map(|&n| if n == number { 1.0 } else { 0.0 }),
    )
}

/// Mask selecting bonds that start on an `a` atom and end on a `b` atom.
///
/// Only the `a -> b` direction is set, and atoms of any third element are never
/// selected. A mask of `a` against every other element would also pick up `a -> c`
/// bonds; here those land in the `(a, c)` pair feature instead, so each element pair
/// of the fingerprint counts only its own bonds.
pub fn heteroatomic_matrix(numbers: &[u8], a: u8, b: u8) -> DMatrix<f64> {
    let n = numbers.len();
    DMatrix::from_fn(n, n, |i, j| {
        if numbers[i] == a && numbers[j] == b {
            1.0
        } else {
            0.0
        }
    })
}

/// Generalized coordination per atom: non-zero entries times the row sum, over 12.
pub fn generalized_matrix(cm: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        cm.nrows(),
        cm.row_iter().map(|row| {
            let nonzero = row.iter().filter(|&&v| v != 0.0).count() as f64;
            nonzero * row.sum() / 12.0
        }),
    )
}

/// Square matrix whose every row holds the per-atom values of `property`.
pub fn property_matrix(
    structure: &Structure,
    property: AtomicProperty,
) -> Result<DMatrix<f64>, FeatureError> {
    let values = structure
        .atoms()
        .iter()
        .map(|a| a.element().and_then(|e| e.property(property)))
        .collect::<Result<Vec<_>, _>>()?;
    let n = values.len();
    Ok(DMatrix::from_fn(n, n, |_, j| values[j]))
}

/// Coordination fingerprint of a (possibly property-weighted) connection matrix.
///
/// Every element of `elements` contributes a fixed block, zero when the element is
/// absent, so the output width depends only on `elements`:
/// `7 * m + m * (m - 1) / 2` values for `m` elements.
pub fn graph_features(numbers: &[u8], cm: &DMatrix<f64>, elements: &[u8]) -> Vec<f64> {
    let sum_cm = DVector::from_iterator(cm.nrows(), cm.row_iter().map(|r| r.sum()));
    let gen_cm = generalized_matrix(cm);

    let mut fp = Vec::with_capacity(graph_width(elements.len()));
    for (k, &e) in elements.iter().enumerate() {
        let el = element_list(numbers, e);

        let coord = sum_cm.component_mul(&el);
        push_moments(&mut fp, &coord);

        // Bonds ending on an `e` atom, counted from every row.
        let e_bonds: f64 = cm
            .row_iter()
            .map(|row| row.iter().zip(el.iter()).map(|(c, m)| c * m).sum::<f64>())
            .sum();
        fp.push(e_bonds);

        for &other in &elements[k + 1..] {
            let hm = heteroatomic_matrix(numbers, e, other);
            fp.push(hm.component_mul(cm).sum());
        }

        let generalized = gen_cm.component_mul(&el);
        push_moments(&mut fp, &generalized);
    }
    fp
}

fn push_moments(fp: &mut Vec<f64>, x: &DVector<f64>) {
    fp.push(x.sum());
    fp.push(x.iter().map(|v| v * v).sum());
    fp.push(x.iter().map(|v| v.abs().sqrt()).sum());
}

/// Number of values produced by [`graph_features`] for `m` elements.
pub fn graph_width(m: usize) -> usize {
    7 * m + m * m.saturating_sub(1) / 2
}

/// Names matching the layout of [`graph_features`].
pub fn graph_feature_names(elements: &[u8], prefix: &str) -> Vec<String> {
    let symbol = |z: u8| Element::by_number(z).map(|e| e.symbol).unwrap_or("X");
    let mut names = Vec::with_capacity(graph_width(elements.len()));
    for (k, &e) in elements.iter().enumerate() {
        let s = symbol(e);
        for moment in ["sum", "sq", "sqrt"] {
            names.push(format!("{}_{}_coord_{}", prefix, s, moment));
        }
        names.push(format!("{}_{}_bonds", prefix, s));
        for &other in &elements[k + 1..] {
            names.push(format!("{}_{}_{}_bonds", prefix, s, symbol(other)));
        }
        for moment in ["sum", "sq", "sqrt"] {
            names.push(format!("{}_{}_gcn_{}", prefix, s, moment));
        }
    }
    names
}

/// Graph fingerprint of a structure: the plain connectivity block followed by one
/// block per property-weighted connectivity.
pub fn base_features(
    structure: &Structure,
    elements: &[u8],
    properties: &[AtomicProperty],
    dx: f64,
) -> Result<Vec<f64>, FeatureError> {
    let numbers = structure.numbers();
    let cm = connection_matrix(structure, dx)?;

    let mut fp = graph_features(&numbers, &cm, elements);
    for &property in properties {
        let weighted = cm.component_mul(&property_matrix(structure, property)?);
        fp.extend(graph_features(&numbers, &weighted, elements));
    }
    Ok(fp)
}
