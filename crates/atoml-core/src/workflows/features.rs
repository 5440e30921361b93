use crate::core::features::generator::{FeatureGenerator, FeatureKind};
use crate::core::models::dataset::Dataset;
use crate::core::models::matrix::FeatureMatrix;
use crate::core::models::structure::Structure;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

/// Fingerprints for every record of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub ids: Vec<String>,
    pub features: FeatureMatrix,
    pub targets: Vec<f64>,
}

/// Fits a generator on `fit_on` and returns it with the matrix for each of `sets`.
pub(crate) fn generate_sets(
    kinds: &[FeatureKind],
    fit_on: &[Structure],
    sets: &[&[Structure]],
    reporter: &ProgressReporter,
) -> Result<Vec<FeatureMatrix>, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Features" });
    let generator = FeatureGenerator::fitted(kinds.to_vec(), fit_on)?;
    let matrices = sets
        .iter()
        .map(|structures| generator.generate(structures))
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        width = generator.width()?,
        max_atoms = generator.max_atoms(),
        "Features generated."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(matrices)
}

#[instrument(skip_all, name = "features_workflow")]
pub fn run(
    dataset: &Dataset,
    kinds: &[FeatureKind],
    reporter: &ProgressReporter,
) -> Result<FeatureTable, EngineError> {
    let mut matrices = generate_sets(kinds, dataset.structures(), &[dataset.structures()], reporter)?;
    let features = matrices
        .pop()
        .ok_or_else(|| EngineError::Internal("no feature matrix generated".into()))?;
    Ok(FeatureTable {
        ids: dataset.ids(),
        features,
        targets: dataset.targets().to_vec(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::structure::Atom;
    use nalgebra::Point3;

    /// Diatomics and triatomics of H, C and O with a smooth synthetic energy.
    pub(crate) fn molecules(n: usize) -> Dataset {
        let structures: Vec<Structure> = (0..n)
            .map(|i| {
                let bond = 0.9 + 0.03 * i as f64;
                let mut atoms = vec![
                    Atom::new(6, Point3::origin()),
                    Atom::new(8, Point3::new(bond, 0.0, 0.0)),
                ];
                if i % 2 == 0 {
                    atoms.push(Atom::new(1, Point3::new(-0.5, 0.8 + 0.01 * i as f64, 0.0)));
                }
                Structure::with_atoms(&format!("m{}", i), atoms)
            })
            .collect();
        let targets = (0..n)
            .map(|i| {
                let bond = 0.9 + 0.03 * i as f64;
                (bond - 1.2).powi(2) - if i % 2 == 0 { 0.5 } else { 0.0 }
            })
            .collect();
        Dataset::new(structures, targets).unwrap()
    }

    #[test]
    fn feature_table_covers_every_record() {
        let dataset = molecules(6);
        let table = run(
            &dataset,
            &[FeatureKind::Composition, FeatureKind::EigenSpectrum],
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(table.ids, dataset.ids());
        assert_eq!(table.features.nrows(), 6);
        // Three elements plus a three-atom spectrum.
        assert_eq!(table.features.ncols(), 6);
        assert_eq!(table.targets, dataset.targets());
    }

    #[test]
    fn empty_kind_list_is_rejected() {
        let dataset = molecules(2);
        assert!(matches!(
            run(&dataset, &[], &ProgressReporter::new()),
            Err(EngineError::Feature { .. })
        ));
    }
}
