use super::features::generate_sets;
use crate::core::io::feature_store::DataRole;
use crate::core::models::dataset::Dataset;
use crate::core::regression::metrics::ErrorSummary;
use crate::engine::config::PredictConfig;
use crate::engine::error::EngineError;
use crate::engine::model::{self, Hyperparameters};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::split::train_test_split;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPrediction {
    pub id: String,
    pub role: DataRole,
    pub actual: f64,
    pub predicted: f64,
    pub variance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub train_error: ErrorSummary,
    pub test_error: ErrorSummary,
    /// Training records first, then test records, each in split order.
    pub predictions: Vec<RecordPrediction>,
    pub hyperparameters: Hyperparameters,
    /// Names of the features the model was fitted on, after preprocessing.
    pub feature_names: Vec<String>,
}

#[instrument(skip_all, name = "predict_workflow")]
pub fn run(
    dataset: &Dataset,
    config: &PredictConfig,
    reporter: &ProgressReporter,
) -> Result<PredictionResult, EngineError> {
    // === Phase 0: Split and features ===
    let split = train_test_split(dataset.len(), &config.split)?;
    let train_set = dataset.subset(&split.train);
    let test_set = dataset.subset(&split.test);
    info!(
        train = train_set.len(),
        test = test_set.len(),
        model = config.model.name(),
        "Starting prediction workflow."
    );

    let matrices = generate_sets(
        &config.features.kinds,
        dataset.structures(),
        &[train_set.structures(), test_set.structures()],
        reporter,
    )?;
    let [train, test] = <[_; 2]>::try_from(matrices)
        .map_err(|_| EngineError::Internal("expected two feature matrices".into()))?;

    // === Phase 1: Fitting ===
    reporter.report(Progress::PhaseStart { name: "Fitting" });
    let (train, test) = model::preprocess(&config.features, &train, Some(&test))?;
    let test = test.ok_or_else(|| EngineError::Internal("test matrix lost in preprocessing".into()))?;
    if train.ncols() == 0 {
        return Err(EngineError::InsufficientData {
            context: "model fitting (features after cleaning)",
            required: 1,
            available: 0,
        });
    }
    let fitted = model::fit(&config.model, train.data(), train_set.targets())?;
    let hyperparameters = fitted.hyperparameters();
    info!(
        regularization = hyperparameters.regularization,
        features = train.ncols(),
        "Model fitted."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Prediction ===
    reporter.report(Progress::PhaseStart { name: "Prediction" });
    let train_pred = fitted.predict(train.data(), false)?;
    let test_pred = fitted.predict(test.data(), config.uncertainty)?;
    let train_error = ErrorSummary::compute(&train_pred.mean, train_set.targets())?;
    let test_error = ErrorSummary::compute(&test_pred.mean, test_set.targets())?;
    info!(
        train_rmse = train_error.rmse,
        test_rmse = test_error.rmse,
        test_mae = test_error.mae,
        "Predictions scored."
    );

    let mut predictions = Vec::with_capacity(dataset.len());
    for (role, set, pred) in [
        (DataRole::Train, &train_set, &train_pred),
        (DataRole::Test, &test_set, &test_pred),
    ] {
        predictions.extend(
            set.ids()
                .into_iter()
                .zip(set.targets())
                .zip(&pred.mean)
                .enumerate()
                .map(|(i, ((id, &actual), &predicted))| RecordPrediction {
                    id,
                    role,
                    actual,
                    predicted,
                    variance: pred.variance.as_ref().map(|v| v[i]),
                }),
        );
    }
    reporter.report(Progress::PhaseFinish);

    Ok(PredictionResult {
        train_error,
        test_error,
        predictions,
        hyperparameters,
        feature_names: train.names().to_vec(),
    })
}
