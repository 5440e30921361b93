use super::config::BuilderConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::features::expansion::expand;
use crate::core::features::preprocess::{clean_zero, standardize};
use crate::core::io::feature_store::{DataRole, FeatureSpace, FeatureStore};
use crate::core::models::matrix::FeatureMatrix;
use crate::core::regression::gp::{GaussianProcess, GpOptions};
use crate::core::regression::kernel::Kernel;
use crate::core::regression::metrics::rmse;
use crate::core::regression::ridge::{RidgeModel, RidgeOptions};
use crate::core::selection::lasso::lasso;
use crate::core::selection::pca::pca;
use crate::core::selection::screening::{iterative_screening, robust_rank_screening};
use crate::core::selection::screening::{ScreeningMethod, sure_independence_screening};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Training and test data handed to the builder.
#[derive(Debug, Clone, Copy)]
pub struct BuildInput<'a> {
    pub train: &'a FeatureMatrix,
    pub train_target: &'a [f64],
    pub train_ids: &'a [String],
    pub test: &'a FeatureMatrix,
    pub test_target: &'a [f64],
    pub test_ids: &'a [String],
}

/// Best principal-component reduction seen during the size search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PcaOptimum {
    pub rmse: f64,
    pub components: usize,
    pub features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeSearch {
    pub best_size: usize,
    pub best_rmse: f64,
    pub pca: Option<PcaOptimum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildReport {
    pub original_features: usize,
    pub expanded_features: Option<usize>,
    pub cleaned_features: usize,
    pub initial_rmse: Option<f64>,
    pub screened_features: Option<usize>,
    pub ridge_rmse: f64,
    pub lasso_rmse: Option<f64>,
    pub lasso_features: usize,
    pub size_search: Option<SizeSearch>,
    pub selected_features: usize,
    pub stored_tables: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub train: FeatureMatrix,
    pub test: FeatureMatrix,
    pub report: BuildReport,
}

/// Proposes a reduced feature space that a Gaussian process predicts well from.
pub struct ModelBuilder<'a> {
    config: &'a BuilderConfig,
    reporter: &'a ProgressReporter<'a>,
}

fn check_rows(context: &'static str, expected: usize, found: usize) -> Result<(), EngineError> {
    if expected == found {
        Ok(())
    } else {
        Err(EngineError::DimensionMismatch {
            context,
            expected,
            found,
        })
    }
}

impl<'a> ModelBuilder<'a> {
    pub fn new(config: &'a BuilderConfig, reporter: &'a ProgressReporter<'a>) -> Self {
        Self { config, reporter }
    }

    #[instrument(skip_all, name = "model_builder")]
    pub fn build(&self, input: BuildInput) -> Result<BuildOutput, EngineError> {
        check_rows("training targets", input.train.nrows(), input.train_target.len())?;
        check_rows("training ids", input.train.nrows(), input.train_ids.len())?;
        check_rows("test targets", input.test.nrows(), input.test_target.len())?;
        check_rows("test ids", input.test.nrows(), input.test_ids.len())?;
        check_rows("test features", input.train.ncols(), input.test.ncols())?;
        if input.train.nrows() < 2 || input.test.nrows() == 0 {
            return Err(EngineError::InsufficientData {
                context: "model building",
                required: 2,
                available: input.train.nrows().min(input.test.nrows()),
            });
        }

        let store = self
            .config
            .store
            .as_ref()
            .map(FeatureStore::open)
            .transpose()?;
        let mut stored_tables = Vec::new();
        if let Some(store) = &store {
            stored_tables.extend(Self::store_pair(store, FeatureSpace::Original, &input, input.train, input.test)?);
        }

        // === Phase 1: Expansion ===
        let (train, test, expanded_features) = if self.config.expand {
            self.reporter.report(Progress::PhaseStart { name: "Expansion" });
            let (a, b) = self.config.exponents;
            let train = expand(input.train, a, b)?;
            let test = expand(input.test, a, b)?;
            if let Some(store) = &store {
                stored_tables.extend(Self::store_pair(store, FeatureSpace::Expanded, &input, &train, &test)?);
            }
            info!(features = train.ncols(), "Feature space expanded.");
            self.reporter.report(Progress::PhaseFinish);
            let width = train.ncols();
            (train, test, Some(width))
        } else {
            (input.train.clone(), input.test.clone(), None)
        };

        // === Phase 2: Cleaning and standardisation ===
        self.reporter.report(Progress::PhaseStart {
            name: "Preprocessing",
        });
        let (train, test) = if self.config.clean_features {
            let cleaned = clean_zero(&train, Some(&test))?;
            debug!(removed = cleaned.removed.len(), "Zero-variance features removed.");
            let test = cleaned.test.ok_or_else(|| EngineError::Internal("test matrix dropped".into()))?;
            (cleaned.train, test)
        } else {
            (train, test)
        };
        let scaled = standardize(&train, Some(&test))?;
        let (mut train, mut test) = (
            scaled.train,
            scaled.test.ok_or_else(|| EngineError::Internal("test matrix dropped".into()))?,
        );
        let cleaned_features = train.ncols();
        self.reporter.report(Progress::Message(format!(
            "{} feature(s) after cleaning",
            cleaned_features
        )));
        self.reporter.report(Progress::PhaseFinish);

        if let Some(size) = self.config.size {
            if cleaned_features <= size {
                return Err(EngineError::InsufficientData {
                    context: "reduction to the requested size (after cleaning)",
                    required: size + 1,
                    available: cleaned_features,
                });
            }
        }
        if cleaned_features == 0 {
            return Err(EngineError::InsufficientData {
                context: "model building (features after cleaning)",
                required: 1,
                available: 0,
            });
        }

        let initial_rmse = if self.config.initial_prediction {
            let error = self.trial_rmse(&train, input.train_target, &test, input.test_target)?;
            info!(rmse = error, features = cleaned_features, "Initial model evaluated.");
            Some(error)
        } else {
            None
        };

        // === Phase 3: Screening ===
        let n = train.nrows();
        let screened_features = if train.ncols() > n {
            self.reporter.report(Progress::PhaseStart { name: "Screening" });
            let rejected = self.screen(&train, input.train_target)?;
            train = train.remove_columns(&rejected);
            test = test.remove_columns(&rejected);
            info!(kept = train.ncols(), method = %self.config.screening_method, "Features screened.");
            self.reporter.report(Progress::Message(format!(
                "{} screening kept {} of {} feature(s)",
                self.config.screening_method,
                train.ncols(),
                cleaned_features
            )));
            self.reporter.report(Progress::PhaseFinish);
            Some(train.ncols())
        } else {
            None
        };

        // === Phase 4: Ranking ===
        self.reporter.report(Progress::PhaseStart { name: "Ranking" });
        let target = DVector::from_column_slice(input.train_target);
        let ridge = RidgeModel::fit(train.data(), &target, &RidgeOptions::default())?;
        let ridge_predictions: Vec<f64> = ridge.predict(test.data())?.iter().copied().collect();
        let ridge_rmse = rmse(&ridge_predictions, input.test_target)?;

        let lasso_result = lasso(
            input.train_target,
            train.data(),
            Some((test.data(), input.test_target)),
            &self.config.lasso_options(),
        )?;
        info!(
            ridge_rmse,
            lasso_rmse = lasso_result.best_error,
            lasso_features = lasso_result.min_features,
            "Features ranked."
        );
        self.reporter.report(Progress::Message(format!(
            "Ridge RMSE {:.4}, lasso keeps {} feature(s)",
            ridge_rmse, lasso_result.min_features
        )));
        self.reporter.report(Progress::PhaseFinish);

        // === Phase 5: Size selection ===
        let d = train.ncols();
        let order = &lasso_result.order;
        let (best_size, size_search) = if self.config.optimize {
            let search = self.search_size(&train, input.train_target, &test, input.test_target, order)?;
            (search.best_size, Some(search))
        } else {
            (self.config.size.unwrap_or(d).min(d), None)
        };

        let mut keep = order[..best_size].to_vec();
        keep.sort_unstable();
        let train = train.select_columns(&keep);
        let test = test.select_columns(&keep);
        info!(features = best_size, "Feature space reduced.");
        self.reporter
            .report(Progress::Message(format!("Selected {} feature(s)", best_size)));
        if let Some(store) = &store {
            stored_tables.extend(Self::store_pair(store, FeatureSpace::Selected, &input, &train, &test)?);
        }

        Ok(BuildOutput {
            train,
            test,
            report: BuildReport {
                original_features: input.train.ncols(),
                expanded_features,
                cleaned_features,
                initial_rmse,
                screened_features,
                ridge_rmse,
                lasso_rmse: lasso_result.best_error,
                lasso_features: lasso_result.min_features,
                size_search,
                selected_features: best_size,
                stored_tables,
            },
        })
    }

    fn store_pair(
        store: &FeatureStore,
        space: FeatureSpace,
        input: &BuildInput,
        train: &FeatureMatrix,
        test: &FeatureMatrix,
    ) -> Result<Vec<PathBuf>, EngineError> {
        Ok(vec![
            store.write_table(DataRole::Train, space, input.train_ids, train, Some(input.train_target))?,
            store.write_table(DataRole::Test, space, input.test_ids, test, Some(input.test_target))?,
        ])
    }

    /// Test RMSE of the trial Gaussian process with the configured width and noise.
    fn trial_rmse(
        &self,
        train: &FeatureMatrix,
        train_target: &[f64],
        test: &FeatureMatrix,
        test_target: &[f64],
    ) -> Result<f64, EngineError> {
        self.trial_rmse_raw(train.data(), train_target, test.data(), test_target)
    }

    fn trial_rmse_raw(
        &self,
        train: &DMatrix<f64>,
        train_target: &[f64],
        test: &DMatrix<f64>,
        test_target: &[f64],
    ) -> Result<f64, EngineError> {
        let kernel = Kernel::squared_exponential(self.config.width, 1.0)?;
        let options = GpOptions {
            optimize_hyperparameters: false,
            standardize_target: true,
            max_iterations: 0,
        };
        let gp = GaussianProcess::fit(
            train,
            &DVector::from_column_slice(train_target),
            &kernel,
            self.config.regularization,
            &options,
        )?;
        let prediction: Vec<f64> = gp.predict(test, false)?.mean.iter().copied().collect();
        Ok(rmse(&prediction, test_target)?)
    }

    /// Screens down to as many features as training records; iteratively when there
    /// are more than twice as many features.
    fn screen(&self, train: &FeatureMatrix, target: &[f64]) -> Result<Vec<usize>, EngineError> {
        let n = train.nrows();
        let d = train.ncols();
        let screening = if d > 2 * n {
            let step = ((d as f64 / n as f64).ln().sqrt().round() as usize).max(1);
            debug!(step, "Using iterative screening.");
            iterative_screening(
                target,
                train.data(),
                n,
                step,
                self.config.screening_method,
                self.config.screening_correlation,
            )?
        } else {
            match self.config.screening_method {
                ScreeningMethod::Rrcs => robust_rank_screening(
                    target,
                    train.data(),
                    n,
                    self.config.screening_correlation,
                )?,
                ScreeningMethod::Sis => sure_independence_screening(target, train.data(), n)?,
            }
        };
        Ok(screening.rejected)
    }

    fn search_size(
        &self,
        train: &FeatureMatrix,
        train_target: &[f64],
        test: &FeatureMatrix,
        test_target: &[f64],
        order: &[usize],
    ) -> Result<SizeSearch, EngineError> {
        let limit = train.nrows().min(train.ncols());
        self.reporter.report(Progress::PhaseStart {
            name: "Size Optimisation",
        });
        self.reporter.report(Progress::TaskStart {
            total_steps: limit as u64,
        });

        let mut best = (f64::INFINITY, 1);
        let mut best_pca: Option<PcaOptimum> = None;
        for s in 1..=limit {
            let reduced_train = train.select_columns(&order[..s]);
            let reduced_test = test.select_columns(&order[..s]);
            let error = self.trial_rmse(&reduced_train, train_target, &reduced_test, test_target)?;
            if error < best.0 {
                best = (error, s);
            }

            for c in 1..s {
                let projection = pca(reduced_train.data(), Some(reduced_test.data()), c)?;
                let projected_test = projection
                    .test
                    .ok_or_else(|| EngineError::Internal("pca dropped test data".into()))?;
                let error =
                    self.trial_rmse_raw(&projection.train, train_target, &projected_test, test_target)?;
                if best_pca.is_none_or(|p| error < p.rmse) {
                    best_pca = Some(PcaOptimum {
                        rmse: error,
                        components: c,
                        features: s,
                    });
                }
            }
            self.reporter.report(Progress::TaskIncrement);
        }

        self.reporter.report(Progress::TaskFinish);
        self.reporter.report(Progress::PhaseFinish);
        info!(
            best_size = best.1,
            best_rmse = best.0,
            pca_rmse = best_pca.map(|p| p.rmse),
            "Size search finished."
        );
        Ok(SizeSearch {
            best_size: best.1,
            best_rmse: best.0,
            pca: best_pca,
        })
    }
}
