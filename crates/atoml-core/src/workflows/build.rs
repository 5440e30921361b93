use super::features::generate_sets;
use crate::core::models::dataset::Dataset;
use crate::engine::builder::{BuildInput, BuildOutput, ModelBuilder};
use crate::engine::config::BuildConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::split::train_test_split;
use tracing::{info, instrument};

#[instrument(skip_all, name = "build_workflow")]
pub fn run(
    dataset: &Dataset,
    config: &BuildConfig,
    reporter: &ProgressReporter,
) -> Result<BuildOutput, EngineError> {
    let split = train_test_split(dataset.len(), &config.split)?;
    let train_set = dataset.subset(&split.train);
    let test_set = dataset.subset(&split.test);
    info!(
        train = train_set.len(),
        test = test_set.len(),
        "Starting model-building workflow."
    );

    let matrices = generate_sets(
        &config.features.kinds,
        dataset.structures(),
        &[train_set.structures(), test_set.structures()],
        reporter,
    )?;
    let [train, test] = <[_; 2]>::try_from(matrices)
        .map_err(|_| EngineError::Internal("expected two feature matrices".into()))?;

    let (train_ids, test_ids) = (train_set.ids(), test_set.ids());
    let output = ModelBuilder::new(&config.builder, reporter).build(BuildInput {
        train: &train,
        train_target: train_set.targets(),
        train_ids: &train_ids,
        test: &test,
        test_target: test_set.targets(),
        test_ids: &test_ids,
    })?;
    info!(
        selected = output.report.selected_features,
        names = ?output.train.names(),
        "Model building finished."
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::generator::FeatureKind;
    use crate::engine::config::{BuildConfigBuilder, BuilderConfig, FeatureConfig, SplitConfig};
    use crate::workflows::features::tests::molecules;

    #[test]
    fn build_reduces_expanded_feature_space() {
        let config = BuildConfigBuilder::new()
            .features(FeatureConfig {
                kinds: vec![FeatureKind::EigenSpectrum],
                clean_zero: true,
                standardize: true,
            })
            .split(SplitConfig {
                test_fraction: 0.25,
                seed: 11,
                shuffle: true,
            })
            .builder(BuilderConfig {
                optimize: false,
                initial_prediction: false,
                size: Some(3),
                ..BuilderConfig::default()
            })
            .build()
            .unwrap();
        let dataset = molecules(20);
        let output = run(&dataset, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(output.report.original_features, 3);
        assert_eq!(output.report.expanded_features, Some(27));
        assert_eq!(output.report.selected_features, 3);
        assert_eq!(output.train.nrows(), 15);
        assert_eq!(output.test.nrows(), 5);
        assert_eq!(output.train.names(), output.test.names());
    }
}
