use super::config::{FeatureConfig, ModelConfig};
use super::error::EngineError;
use crate::core::features::FeatureError;
use crate::core::features::preprocess::{clean_zero, standardize};
use crate::core::models::matrix::FeatureMatrix;
use crate::core::regression::RegressionError;
use crate::core::regression::gp::{GaussianProcess, GpOptions};
use crate::core::regression::kernel::Kernel;
use crate::core::regression::metrics::ErrorSummary;
use crate::core::regression::ridge::{RidgeModel, RidgeOptions};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

/// A regression model fitted according to a [`ModelConfig`].
#[derive(Debug, Clone)]
pub enum FittedModel {
    Ridge(RidgeModel),
    GaussianProcess(GaussianProcess),
}

/// The hyperparameters a fitted model ended up with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyperparameters {
    pub model: &'static str,
    pub regularization: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<Kernel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelPredictions {
    pub mean: Vec<f64>,
    pub variance: Option<Vec<f64>>,
}

pub fn fit(config: &ModelConfig, x: &DMatrix<f64>, y: &[f64]) -> Result<FittedModel, RegressionError> {
    let target = DVector::from_column_slice(y);
    match config {
        ModelConfig::Ridge {
            grid_points,
            refinements,
            fit_intercept,
        } => {
            let options = RidgeOptions {
                grid_points: *grid_points,
                refinements: *refinements,
                fit_intercept: *fit_intercept,
            };
            RidgeModel::fit(x, &target, &options).map(FittedModel::Ridge)
        }
        ModelConfig::GaussianProcess {
            kernel,
            regularization,
            optimize_hyperparameters,
            standardize_target,
            max_iterations,
        } => {
            let options = GpOptions {
                optimize_hyperparameters: *optimize_hyperparameters,
                standardize_target: *standardize_target,
                max_iterations: *max_iterations,
            };
            // Optimisation gets one width per feature to tune.
            let kernel = if *optimize_hyperparameters {
                kernel.broadcast_widths(x.ncols())
            } else {
                kernel.clone()
            };
            GaussianProcess::fit(x, &target, &kernel, *regularization, &options)
                .map(FittedModel::GaussianProcess)
        }
    }
}

impl FittedModel {
    pub fn predict(
        &self,
        x: &DMatrix<f64>,
        uncertainty: bool,
    ) -> Result<ModelPredictions, RegressionError> {
        match self {
            FittedModel::Ridge(model) => Ok(ModelPredictions {
                mean: model.predict(x)?.iter().copied().collect(),
                variance: None,
            }),
            FittedModel::GaussianProcess(gp) => {
                let prediction = gp.predict(x, uncertainty)?;
                Ok(ModelPredictions {
                    mean: prediction.mean.iter().copied().collect(),
                    variance: prediction.variance.map(|v| v.iter().copied().collect()),
                })
            }
        }
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        match self {
            FittedModel::Ridge(model) => Hyperparameters {
                model: "ridge",
                regularization: model.regularization(),
                intercept: Some(model.intercept()),
                kernel: None,
            },
            FittedModel::GaussianProcess(gp) => Hyperparameters {
                model: "gaussian-process",
                regularization: gp.regularization(),
                intercept: None,
                kernel: Some(gp.kernel().clone()),
            },
        }
    }
}

/// Applies the configured cleaning and standardisation, fitted on `train` only.
pub fn preprocess(
    config: &FeatureConfig,
    train: &FeatureMatrix,
    test: Option<&FeatureMatrix>,
) -> Result<(FeatureMatrix, Option<FeatureMatrix>), FeatureError> {
    let (mut train, mut test) = (train.clone(), test.cloned());
    if config.clean_zero {
        let cleaned = clean_zero(&train, test.as_ref())?;
        train = cleaned.train;
        test = cleaned.test;
    }
    if config.standardize {
        let scaled = standardize(&train, test.as_ref())?;
        train = scaled.train;
        test = scaled.test;
    }
    Ok((train, test))
}

/// Preprocesses, fits on the training rows and scores predictions on the test rows.
pub fn fit_and_score(
    model: &ModelConfig,
    features: &FeatureConfig,
    train: &FeatureMatrix,
    train_target: &[f64],
    test: &FeatureMatrix,
    test_target: &[f64],
) -> Result<ErrorSummary, EngineError> {
    let (train, test) = preprocess(features, train, Some(test))?;
    let test = test.ok_or_else(|| EngineError::Internal("test matrix lost in preprocessing".into()))?;
    if train.ncols() == 0 {
        return Err(EngineError::InsufficientData {
            context: "model fitting (features after cleaning)",
            required: 1,
            available: 0,
        });
    }
    let fitted = fit(model, train.data(), train_target)?;
    let predictions = fitted.predict(test.data(), false)?;
    Ok(ErrorSummary::compute(&predictions.mean, test_target)?)
}
