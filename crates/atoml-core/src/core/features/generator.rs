use super::FeatureError;
use super::graph::{base_features, graph_feature_names, graph_width};
use crate::core::models::element::{AtomicProperty, Element};
use crate::core::models::matrix::FeatureMatrix;
use crate::core::models::structure::Structure;
use itertools::Itertools;
use nalgebra::DMatrix;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default bonding buffer (Angstroms) added to covalent radii when detecting bonds.
pub const DEFAULT_BOND_BUFFER: f64 = 0.2;

/// One family of features produced for every structure.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    /// Coulomb-matrix eigenvalues, sorted descending and zero-padded.
    EigenSpectrum,
    /// Atomic masses, sorted descending and zero-padded.
    ElementMass,
    /// Atom counts per element.
    Composition,
    /// Mean interatomic distance for each element pair.
    Distance,
    /// Coordination fingerprints, optionally weighted by atomic properties.
    Graph {
        properties: Vec<AtomicProperty>,
        bond_buffer: f64,
    },
}

impl FromStr for FeatureKind {
    type Err = FeatureError;

    /// Parses a feature family name. `graph` yields an unweighted fingerprint with the
    /// default bond buffer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "eigenspectrum" | "eigen-spectrum" | "coulomb" => Ok(FeatureKind::EigenSpectrum),
            "element-mass" | "mass" => Ok(FeatureKind::ElementMass),
            "composition" => Ok(FeatureKind::Composition),
            "distance" => Ok(FeatureKind::Distance),
            "graph" => Ok(FeatureKind::Graph {
                properties: Vec::new(),
                bond_buffer: DEFAULT_BOND_BUFFER,
            }),
            _ => Err(FeatureError::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FittedShape {
    max_atoms: usize,
    elements: Vec<u8>,
}

/// Produces fixed-width feature vectors for variable-size structures.
///
/// The generator must be fitted on every structure that will later be featurized
/// (typically train and test together) so that the padding length and the element list
/// are shared and all matrices have the same width.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGenerator {
    kinds: Vec<FeatureKind>,
    shape: Option<FittedShape>,
}

impl FeatureGenerator {
    pub fn new(kinds: Vec<FeatureKind>) -> Result<Self, FeatureError> {
        if kinds.is_empty() {
            return Err(FeatureError::NoFeatureKinds);
        }
        Ok(Self { kinds, shape: None })
    }

    /// Creates and fits a generator in one step.
    pub fn fitted(kinds: Vec<FeatureKind>, structures: &[Structure]) -> Result<Self, FeatureError> {
        let mut generator = Self::new(kinds)?;
        generator.fit(structures)?;
        Ok(generator)
    }

    pub fn kinds(&self) -> &[FeatureKind] {
        &self.kinds
    }

    /// Records the largest atom count and the sorted set of elements.
    pub fn fit(&mut self, structures: &[Structure]) -> Result<(), FeatureError> {
        if structures.is_empty() {
            return Err(FeatureError::EmptyInput);
        }
        let mut elements = BTreeSet::new();
        for atom in structures.iter().flat_map(|s| s.atoms()) {
            Element::by_number(atom.number)?;
            elements.insert(atom.number);
        }
        let max_atoms = structures.iter().map(Structure::len).max().unwrap_or(0);

        debug!(
            max_atoms,
            elements = elements.len(),
            "Feature generator fitted."
        );
        self.shape = Some(FittedShape {
            max_atoms,
            elements: elements.into_iter().collect(),
        });
        Ok(())
    }

    pub fn max_atoms(&self) -> Option<usize> {
        self.shape.as_ref().map(|s| s.max_atoms)
    }

    pub fn elements(&self) -> Option<&[u8]> {
        self.shape.as_ref().map(|s| s.elements.as_slice())
    }

    fn shape(&self) -> Result<&FittedShape, FeatureError> {
        // An unfitted generator behaves like one fitted on nothing.
        self.shape.as_ref().ok_or(FeatureError::EmptyInput)
    }

    /// Total number of features per structure.
    pub fn width(&self) -> Result<usize, FeatureError> {
        let shape = self.shape()?;
        let m = shape.elements.len();
        Ok(self
            .kinds
            .iter()
            .map(|kind| match kind {
                FeatureKind::EigenSpectrum | FeatureKind::ElementMass => shape.max_atoms,
                FeatureKind::Composition => m,
                FeatureKind::Distance => m * (m + 1) / 2,
                FeatureKind::Graph { properties, .. } => graph_width(m) * (1 + properties.len()),
            })
            .sum())
    }

    /// Column names in generation order.
    pub fn names(&self) -> Result<Vec<String>, FeatureError> {
        let shape = self.shape()?;
        let symbol = |z: u8| Element::by_number(z).map(|e| e.symbol).unwrap_or("X");
        let mut names = Vec::new();
        for kind in &self.kinds {
            match kind {
                FeatureKind::EigenSpectrum => {
                    names.extend((0..shape.max_atoms).map(|i| format!("eig_{}", i)))
                }
                FeatureKind::ElementMass => {
                    names.extend((0..shape.max_atoms).map(|i| format!("mass_{}", i)))
                }
                FeatureKind::Composition => names.extend(
                    shape
                        .elements
                        .iter()
                        .map(|&z| format!("comp_{}", symbol(z))),
                ),
                FeatureKind::Distance => names.extend(
                    element_pairs(&shape.elements)
                        .map(|(a, b)| format!("dist_{}_{}", symbol(a), symbol(b))),
                ),
                FeatureKind::Graph { properties, .. } => {
                    names.extend(graph_feature_names(&shape.elements, "graph"));
                    for property in properties {
                        let prefix = format!("graph_{}", property.as_str().replace('-', "_"));
                        names.extend(graph_feature_names(&shape.elements, &prefix));
                    }
                }
            }
        }
        Ok(names)
    }

    /// Feature vector of a single structure.
    pub fn vector(&self, structure: &Structure) -> Result<Vec<f64>, FeatureError> {
        let shape = self.shape()?;
        if structure.len() > shape.max_atoms {
            return Err(FeatureError::StructureTooLarge {
                unique_id: structure.unique_id().to_string(),
                atoms: structure.len(),
                max: shape.max_atoms,
            });
        }
        for atom in structure.atoms() {
            if shape.elements.binary_search(&atom.number).is_err() {
                return Err(FeatureError::UnseenElement {
                    unique_id: structure.unique_id().to_string(),
                    symbol: atom.element()?.symbol,
                });
            }
        }

        let mut fp = Vec::new();
        for kind in &self.kinds {
            match kind {
                FeatureKind::EigenSpectrum => {
                    fp.extend(padded(eigenspectrum(structure), shape.max_atoms))
                }
                FeatureKind::ElementMass => {
                    fp.extend(padded(sorted_masses(structure)?, shape.max_atoms))
                }
                FeatureKind::Composition => fp.extend(composition(structure, &shape.elements)),
                FeatureKind::Distance => fp.extend(mean_distances(structure, &shape.elements)),
                FeatureKind::Graph {
                    properties,
                    bond_buffer,
                } => fp.extend(base_features(
                    structure,
                    &shape.elements,
                    properties,
                    *bond_buffer,
                )?),
            }
        }
        Ok(fp)
    }

    /// Feature matrix for a set of structures, one row per structure.
    #[instrument(skip_all, name = "feature_generation")]
    pub fn generate(&self, structures: &[Structure]) -> Result<FeatureMatrix, FeatureError> {
        let width = self.width()?;

        #[cfg(feature = "parallel")]
        let rows: Vec<Vec<f64>> = structures
            .par_iter()
            .map(|s| self.vector(s))
            .collect::<Result<_, _>>()?;

        #[cfg(not(feature = "parallel"))]
        let rows: Vec<Vec<f64>> = structures
            .iter()
            .map(|s| self.vector(s))
            .collect::<Result<_, _>>()?;

        let names = self.names()?;
        let found = names.len();
        let data = DMatrix::from_fn(rows.len(), width, |r, c| rows[r][c]);
        debug!(rows = rows.len(), width, "Feature matrix generated.");
        FeatureMatrix::new(data, names).ok_or(FeatureError::WidthMismatch {
            expected: width,
            found,
        })
    }
}

fn element_pairs(elements: &[u8]) -> impl Iterator<Item = (u8, u8)> + '_ {
    elements
        .iter()
        .copied()
        .tuple_combinations()
        .chain(elements.iter().map(|&e| (e, e)))
        .sorted()
}

fn padded(mut values: Vec<f64>, len: usize) -> Vec<f64> {
    values.resize(len, 0.0);
    values
}

/// Eigenvalues of the Coulomb matrix, largest first.
pub fn eigenspectrum(structure: &Structure) -> Vec<f64> {
    let n = structure.len();
    if n == 0 {
        return Vec::new();
    }
    let z: Vec<f64> = structure.atoms().iter().map(|a| a.number as f64).collect();
    let coulomb = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            0.5 * z[i].powf(2.4)
        } else {
            let d = structure.distance(i, j);
            if d > 1e-8 { z[i] * z[j] / d } else { 0.0 }
        }
    });
    let mut eig: Vec<f64> = coulomb.symmetric_eigenvalues().iter().copied().collect();
    eig.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    eig
}

fn sorted_masses(structure: &Structure) -> Result<Vec<f64>, FeatureError> {
    let mut masses = structure
        .atoms()
        .iter()
        .map(|a| a.element().map(|e| e.mass))
        .collect::<Result<Vec<_>, _>>()?;
    masses.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    Ok(masses)
}

fn composition(structure: &Structure, elements: &[u8]) -> Vec<f64> {
    elements
        .iter()
        .map(|&e| structure.atoms().iter().filter(|a| a.number == e).count() as f64)
        .collect()
}

fn mean_distances(structure: &Structure, elements: &[u8]) -> Vec<f64> {
    let atoms = structure.atoms();
    element_pairs(elements)
        .map(|(a, b)| {
            let (total, count) = (0..atoms.len())
                .tuple_combinations()
                .filter(|&(i, j)| {
                    let (zi, zj) = (atoms[i].number, atoms[j].number);
                    (zi == a && zj == b) || (zi == b && zj == a)
                })
                .fold((0.0, 0usize), |(t, c), (i, j)| {
                    (t + structure.distance(i, j), c + 1)
                });
            if count == 0 { 0.0 } else { total / count as f64 }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::Atom;
    use nalgebra::Point3;

    fn h2() -> Structure {
        Structure::with_atoms(
            "h2",
            vec![
                Atom::new(1, Point3::origin()),
                Atom::new(1, Point3::new(0.74, 0.0, 0.0)),
            ],
        )
    }

    fn water() -> Structure {
        Structure::with_atoms(
            "water",
            vec![
                Atom::new(8, Point3::origin()),
                Atom::new(1, Point3::new(0.757, 0.586, 0.0)),
                Atom::new(1, Point3::new(-0.757, 0.586, 0.0)),
            ],
        )
    }

    fn all_kinds() -> Vec<FeatureKind> {
        vec![
            FeatureKind::EigenSpectrum,
            FeatureKind::ElementMass,
            FeatureKind::Composition,
            FeatureKind::Distance,
            FeatureKind::Graph {
                properties: vec![AtomicProperty::Electronegativity],
                bond_buffer: DEFAULT_BOND_BUFFER,
            },
        ]
    }

    #[test]
    fn new_requires_feature_kinds() {
        assert_eq!(
            FeatureGenerator::new(vec![]),
            Err(FeatureError::NoFeatureKinds)
        );
    }

    #[test]
    fn from_str_parses_kind_names() {
        assert_eq!(
            FeatureKind::from_str("eigenspectrum"),
            Ok(FeatureKind::EigenSpectrum)
        );
        assert_eq!(
            FeatureKind::from_str("Element_Mass"),
            Ok(FeatureKind::ElementMass)
        );
        assert!(matches!(
            FeatureKind::from_str("graph"),
            Ok(FeatureKind::Graph { .. })
        ));
        assert_eq!(
            FeatureKind::from_str("soap"),
            Err(FeatureError::UnknownKind("soap".to_string()))
        );
        assert_eq!(
            FeatureKind::from_str("soap").unwrap_err().to_string(),
            "Unknown feature kind: 'soap'"
        );
    }

    #[test]
    fn generated_matrices_share_width_across_sizes() {
        let structures = vec![h2(), water()];
        let generator = FeatureGenerator::fitted(all_kinds(), &structures).unwrap();

        let train = generator.generate(&structures[..1]).unwrap();
        let test = generator.generate(&structures[1..]).unwrap();

        assert_eq!(train.ncols(), test.ncols());
        assert_eq!(train.ncols(), generator.width().unwrap());
        assert_eq!(train.names(), test.names());
    }

    #[test]
    fn eigenspectrum_is_zero_padded() {
        let structures = vec![h2(), water()];
        let generator =
            FeatureGenerator::fitted(vec![FeatureKind::EigenSpectrum], &structures).unwrap();
        let fp = generator.vector(&h2()).unwrap();

        assert_eq!(fp.len(), 3);
        assert_eq!(fp[2], 0.0);
        assert!(fp[0] >= fp[1]);
        // H2: diagonal 0.5, off-diagonal 1/0.74, eigenvalues 0.5 +- 1/0.74.
        assert!((fp[0] - (0.5 + 1.0 / 0.74)).abs() < 1e-9);
    }

    #[test]
    fn composition_and_distance_follow_element_order() {
        let structures = vec![water()];
        let generator = FeatureGenerator::fitted(
            vec![FeatureKind::Composition, FeatureKind::Distance],
            &structures,
        )
        .unwrap();

        let names = generator.names().unwrap();
        assert_eq!(
            names,
            vec!["comp_H", "comp_O", "dist_H_H", "dist_H_O", "dist_O_O"]
        );

        let fp = generator.vector(&water()).unwrap();
        assert_eq!(&fp[..2], &[2.0, 1.0]);
        assert!((fp[2] - 1.514).abs() < 1e-12);
        assert!((fp[3] - (0.757f64.powi(2) + 0.586f64.powi(2)).sqrt()).abs() < 1e-12);
        assert_eq!(fp[4], 0.0);
    }

    #[test]
    fn vector_rejects_unfitted_shapes() {
        let generator =
            FeatureGenerator::fitted(vec![FeatureKind::Composition], &[h2()]).unwrap();

        assert!(matches!(
            generator.vector(&water()),
            Err(FeatureError::StructureTooLarge { atoms: 3, max: 2, .. })
        ));

        let oh = Structure::with_atoms(
            "oh",
            vec![
                Atom::new(8, Point3::origin()),
                Atom::new(1, Point3::new(0.97, 0.0, 0.0)),
            ],
        );
        assert!(matches!(
            generator.vector(&oh),
            Err(FeatureError::UnseenElement { symbol: "O", .. })
        ));
    }

    #[test]
    fn unfitted_generator_reports_empty_input() {
        let generator = FeatureGenerator::new(vec![FeatureKind::Composition]).unwrap();
        assert_eq!(generator.width(), Err(FeatureError::EmptyInput));
        assert_eq!(
            FeatureGenerator::fitted(vec![FeatureKind::Composition], &[]),
            Err(FeatureError::EmptyInput)
        );
    }

    #[test]
    fn element_mass_sorts_heaviest_first() {
        let generator =
            FeatureGenerator::fitted(vec![FeatureKind::ElementMass], &[water()]).unwrap();
        let fp = generator.vector(&water()).unwrap();
        assert_eq!(fp, vec![15.999, 1.008, 1.008]);
    }
}
