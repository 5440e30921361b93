use super::structure::Structure;
use tracing::{debug, warn};

/// Outcome of pairing structures with a target property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub kept: usize,
    pub skipped: usize,
}

/// Structures paired one-to-one with scalar targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    structures: Vec<Structure>,
    targets: Vec<f64>,
}

impl Dataset {
    /// Builds a dataset from structures and explicit targets.
    ///
    /// Returns `None` when the two lists differ in length.
    pub fn new(structures: Vec<Structure>, targets: Vec<f64>) -> Option<Self> {
        (structures.len() == targets.len()).then_some(Self {
            structures,
            targets,
        })
    }

    /// Pairs each structure with the numeric value stored under `target_key`.
    ///
    /// Structures that lack the key, or hold a non-numeric or non-finite value under it,
    /// are skipped, so the structure and target lists always stay the same length.
    pub fn from_structures(structures: Vec<Structure>, target_key: &str) -> (Self, LoadSummary) {
        let mut summary = LoadSummary::default();
        let mut kept_structures = Vec::with_capacity(structures.len());
        let mut targets = Vec::with_capacity(structures.len());

        for structure in structures {
            match structure.target(target_key).filter(|v| v.is_finite()) {
                Some(value) => {
                    targets.push(value);
                    kept_structures.push(structure);
                    summary.kept += 1;
                }
                None => {
                    warn!(
                        unique_id = structure.unique_id(),
                        key = target_key,
                        "Skipping structure without a finite numeric target."
                    );
                    summary.skipped += 1;
                }
            }
        }

        debug!(
            kept = summary.kept,
            skipped = summary.skipped,
            "Dataset assembled."
        );
        (
            Self {
                structures: kept_structures,
                targets,
            },
            summary,
        )
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.structures
            .iter()
            .map(|s| s.unique_id().to_string())
            .collect()
    }

    /// Copies the records at `indices` (in that order) into a new dataset.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            structures: indices.iter().map(|&i| self.structures[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::{Atom, InfoValue};
    use nalgebra::Point3;

    fn record(id: &str, energy: Option<InfoValue>) -> Structure {
        let mut s = Structure::with_atoms(id, vec![Atom::new(1, Point3::origin())]);
        if let Some(e) = energy {
            s.set_info("energy", e);
        }
        s
    }

    #[test]
    fn records_without_target_are_excluded_from_both_lists() {
        let structures = vec![
            record("a", Some(InfoValue::Float(-1.0))),
            record("b", None),
            record("c", Some(InfoValue::Int(2))),
            record("d", Some(InfoValue::Text("n/a".into()))),
        ];

        let (dataset, summary) = Dataset::from_structures(structures, "energy");

        assert_eq!(summary, LoadSummary { kept: 2, skipped: 2 });
        assert_eq!(dataset.structures().len(), dataset.targets().len());
        assert_eq!(dataset.ids(), vec!["a", "c"]);
        assert_eq!(dataset.targets(), &[-1.0, 2.0]);
    }

    #[test]
    fn non_finite_targets_count_as_missing() {
        let structures = vec![
            record("nan", Some(InfoValue::parse("nan"))),
            record("inf", Some(InfoValue::Float(f64::INFINITY))),
            record("ok", Some(InfoValue::Float(0.5))),
        ];

        let (dataset, summary) = Dataset::from_structures(structures, "energy");

        assert_eq!(summary, LoadSummary { kept: 1, skipped: 2 });
        assert_eq!(dataset.ids(), vec!["ok"]);
        assert!(dataset.targets().iter().all(|t| t.is_finite()));
    }

    #[test]
    fn new_rejects_mismatched_lengths() {
        assert!(Dataset::new(vec![record("a", None)], vec![]).is_none());
        assert!(Dataset::new(vec![record("a", None)], vec![1.0]).is_some());
    }

    #[test]
    fn subset_preserves_requested_order() {
        let structures = (0..4)
            .map(|i| record(&i.to_string(), Some(InfoValue::Float(i as f64))))
            .collect();
        let (dataset, _) = Dataset::from_structures(structures, "energy");

        let sub = dataset.subset(&[3, 1]);
        assert_eq!(sub.ids(), vec!["3", "1"]);
        assert_eq!(sub.targets(), &[3.0, 1.0]);
    }
}
