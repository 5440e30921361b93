use super::features::generate_sets;
use crate::core::models::dataset::Dataset;
use crate::engine::config::LearningCurveConfig;
use crate::engine::error::EngineError;
use crate::engine::model::fit_and_score;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::validation::{
    HierarchySplit, LearningCurvePoint, ValidationRecord, learning_curve,
};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct LearningCurveResult {
    pub records: Vec<ValidationRecord>,
    pub curve: Vec<LearningCurvePoint>,
}

#[instrument(skip_all, name = "learning_curve_workflow")]
pub fn run(
    dataset: &Dataset,
    config: &LearningCurveConfig,
    reporter: &ProgressReporter,
) -> Result<LearningCurveResult, EngineError> {
    info!(
        records = dataset.len(),
        model = config.model.name(),
        "Starting learning-curve workflow."
    );
    let matrix = generate_sets(
        &config.features.kinds,
        dataset.structures(),
        &[dataset.structures()],
        reporter,
    )?
    .pop()
    .ok_or_else(|| EngineError::Internal("no feature matrix generated".into()))?;
    let targets = dataset.targets();

    reporter.report(Progress::PhaseStart { name: "Validation" });
    let validation = &config.validation;
    let hierarchy = HierarchySplit::new(
        dataset.len(),
        validation.min_split,
        validation.max_split,
        validation.seed,
    )?;
    let records = hierarchy.evaluate(
        |train, test| {
            let pick = |indices: &[usize]| indices.iter().map(|&i| targets[i]).collect::<Vec<_>>();
            fit_and_score(
                &config.model,
                &config.features,
                &matrix.select_rows(train),
                &pick(train),
                &matrix.select_rows(test),
                &pick(test),
            )
        },
        reporter,
    )?;
    reporter.report(Progress::PhaseFinish);

    let curve = learning_curve(&records);
    for point in &curve {
        info!(
            train_size = point.train_size,
            mean_rmse = point.mean_rmse,
            std_rmse = point.std_rmse,
            count = point.count,
            "Learning-curve point."
        );
    }
    Ok(LearningCurveResult { records, curve })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::generator::FeatureKind;
    use crate::engine::config::{
        FeatureConfig, LearningCurveConfigBuilder, ModelConfig, ValidationConfig,
    };
    use crate::workflows::features::tests::molecules;

    fn config(max_split: Option<usize>) -> LearningCurveConfig {
        LearningCurveConfigBuilder::new()
            .features(FeatureConfig {
                kinds: vec![FeatureKind::EigenSpectrum],
                clean_zero: true,
                standardize: true,
            })
            .model(ModelConfig::default_ridge())
            .validation(ValidationConfig {
                min_split: 4,
                max_split,
                seed: 3,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn curve_has_one_point_per_evaluated_level() {
        let dataset = molecules(32);
        let result = run(&dataset, &config(None), &ProgressReporter::new()).unwrap();

        // Levels of 16, 8 and 4 records; every sibling pair is scored both ways.
        assert_eq!(result.records.len(), 2 + 4 + 8);
        let sizes: Vec<usize> = result.curve.iter().map(|p| p.train_size).collect();
        assert_eq!(sizes, vec![4, 8, 16]);
        assert_eq!(result.curve[0].count, 8);
        assert!(result.curve.iter().all(|p| p.mean_rmse.is_finite()));
    }

    #[test]
    fn max_split_skips_large_levels() {
        let dataset = molecules(32);
        let result = run(&dataset, &config(Some(8)), &ProgressReporter::new()).unwrap();
        assert!(result.records.iter().all(|r| r.train_size <= 8));
        assert_eq!(result.curve.len(), 2);
    }

    #[test]
    fn too_few_records_are_rejected() {
        let dataset = molecules(6);
        assert!(matches!(
            run(&dataset, &config(None), &ProgressReporter::new()),
            Err(EngineError::InsufficientData { .. })
        ));
    }
}
