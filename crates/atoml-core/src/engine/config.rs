use crate::core::features::expansion::DEFAULT_EXPONENTS;
use crate::core::features::generator::FeatureKind;
use crate::core::regression::gp::GpOptions;
use crate::core::regression::kernel::Kernel;
use crate::core::regression::ridge::RidgeOptions;
use crate::core::selection::correlation::CorrelationKind;
use crate::core::selection::lasso::LassoOptions;
use crate::core::selection::screening::ScreeningMethod;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {message}")]
    InvalidValue {
        parameter: &'static str,
        message: String,
    },
}

/// Noise regularization of the default Gaussian process.
pub const DEFAULT_GP_REGULARIZATION: f64 = 1e-3;

fn invalid(parameter: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        message: message.into(),
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, format!("must be positive, got {}", value)))
    }
}

fn nonzero(parameter: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(invalid(parameter, "must be at least 1"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub kinds: Vec<FeatureKind>,
    /// Drop zero-variance features before fitting.
    pub clean_zero: bool,
    /// Scale features by their training mean and standard deviation before fitting.
    pub standardize: bool,
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kinds.is_empty() {
            return Err(invalid("features.kinds", "at least one feature kind is required"));
        }
        for kind in &self.kinds {
            if let FeatureKind::Graph { bond_buffer, .. } = kind {
                if !(bond_buffer.is_finite() && *bond_buffer >= 0.0) {
                    return Err(invalid(
                        "features.bond-buffer",
                        format!("must be non-negative, got {}", bond_buffer),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelConfig {
    Ridge {
        grid_points: usize,
        refinements: usize,
        fit_intercept: bool,
    },
    GaussianProcess {
        kernel: Kernel,
        regularization: f64,
        optimize_hyperparameters: bool,
        standardize_target: bool,
        max_iterations: usize,
    },
}

impl ModelConfig {
    pub fn default_ridge() -> Self {
        let options = RidgeOptions::default();
        ModelConfig::Ridge {
            grid_points: options.grid_points,
            refinements: options.refinements,
            fit_intercept: options.fit_intercept,
        }
    }

    pub fn default_gaussian_process() -> Self {
        let options = GpOptions::default();
        ModelConfig::GaussianProcess {
            kernel: Kernel::default(),
            regularization: DEFAULT_GP_REGULARIZATION,
            optimize_hyperparameters: options.optimize_hyperparameters,
            standardize_target: options.standardize_target,
            max_iterations: options.max_iterations,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelConfig::Ridge { .. } => "ridge",
            ModelConfig::GaussianProcess { .. } => "gaussian-process",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ModelConfig::Ridge { grid_points, .. } => {
                if *grid_points < 3 {
                    return Err(invalid("model.grid-points", "must be at least 3"));
                }
                Ok(())
            }
            ModelConfig::GaussianProcess { regularization, .. } => {
                positive("model.regularization", *regularization)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Fraction of records assigned to the test set, in `(0, 1)`.
    pub test_fraction: f64,
    pub seed: u64,
    pub shuffle: bool,
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_fraction > 0.0 && self.test_fraction < 1.0 {
            Ok(())
        } else {
            Err(invalid(
                "split.test-fraction",
                format!("must lie strictly between 0 and 1, got {}", self.test_fraction),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Smallest subset size that may still be halved into.
    pub min_split: usize,
    /// Largest subset size that is evaluated; `None` evaluates every level.
    pub max_split: Option<usize>,
    pub seed: u64,
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero("validation.min-split", self.min_split)?;
        if let Some(max) = self.max_split {
            if max < self.min_split {
                return Err(invalid(
                    "validation.max-split",
                    format!("must be at least min-split ({}), got {}", self.min_split, max),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// Directory receiving the original, expanded and selected feature tables.
    pub store: Option<PathBuf>,
    pub screening_method: ScreeningMethod,
    pub screening_correlation: CorrelationKind,
    pub initial_prediction: bool,
    pub clean_features: bool,
    pub expand: bool,
    pub exponents: (i32, i32),
    pub optimize: bool,
    /// Number of features to keep when `optimize` is off.
    pub size: Option<usize>,
    /// Squared-exponential width of the trial Gaussian process.
    pub width: f64,
    /// Noise regularization of the trial Gaussian process.
    pub regularization: f64,
    pub lasso_alpha: f64,
    pub lasso_steps: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            store: None,
            screening_method: ScreeningMethod::Rrcs,
            screening_correlation: CorrelationKind::Kendall,
            initial_prediction: true,
            clean_features: true,
            expand: true,
            exponents: DEFAULT_EXPONENTS,
            optimize: true,
            size: None,
            width: 0.5,
            regularization: 1e-3,
            lasso_alpha: 1e-1,
            lasso_steps: 20,
        }
    }
}

impl BuilderConfig {
    pub fn lasso_options(&self) -> LassoOptions {
        LassoOptions {
            alpha: self.lasso_alpha,
            steps: self.lasso_steps,
            ..LassoOptions::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("builder.width", self.width)?;
        positive("builder.regularization", self.regularization)?;
        positive("builder.lasso-alpha", self.lasso_alpha)?;
        nonzero("builder.lasso-steps", self.lasso_steps)?;
        if let Some(size) = self.size {
            nonzero("builder.size", size)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NebConfig {
    /// Number of movable images between the fixed end points.
    pub images: usize,
    pub spring_constant: f64,
    pub climbing_image: bool,
    /// Convergence threshold on the largest per-atom force.
    pub fmax: f64,
    pub max_steps: usize,
    /// Cap on the norm of a single optimiser displacement.
    pub max_step_length: f64,
}

impl NebConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero("neb.images", self.images)?;
        positive("neb.spring-constant", self.spring_constant)?;
        positive("neb.fmax", self.fmax)?;
        nonzero("neb.max-steps", self.max_steps)?;
        positive("neb.max-step-length", self.max_step_length)
    }
}

#[derive(Default)]
pub struct NebConfigBuilder {
    images: Option<usize>,
    spring_constant: Option<f64>,
    climbing_image: Option<bool>,
    fmax: Option<f64>,
    max_steps: Option<usize>,
    max_step_length: Option<f64>,
}

impl NebConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(mut self, n: usize) -> Self {
        self.images = Some(n);
        self
    }
    pub fn spring_constant(mut self, k: f64) -> Self {
        self.spring_constant = Some(k);
        self
    }
    pub fn climbing_image(mut self, enabled: bool) -> Self {
        self.climbing_image = Some(enabled);
        self
    }
    pub fn fmax(mut self, fmax: f64) -> Self {
        self.fmax = Some(fmax);
        self
    }
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
    pub fn max_step_length(mut self, length: f64) -> Self {
        self.max_step_length = Some(length);
        self
    }

    pub fn build(self) -> Result<NebConfig, ConfigError> {
        let config = NebConfig {
            images: self.images.ok_or(ConfigError::MissingParameter("images"))?,
            spring_constant: self
                .spring_constant
                .ok_or(ConfigError::MissingParameter("spring_constant"))?,
            climbing_image: self
                .climbing_image
                .ok_or(ConfigError::MissingParameter("climbing_image"))?,
            fmax: self.fmax.ok_or(ConfigError::MissingParameter("fmax"))?,
            max_steps: self
                .max_steps
                .ok_or(ConfigError::MissingParameter("max_steps"))?,
            max_step_length: self
                .max_step_length
                .ok_or(ConfigError::MissingParameter("max_step_length"))?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Settings for fitting one model on a train/test split.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictConfig {
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub split: SplitConfig,
    /// Report predictive variances (Gaussian process only).
    pub uncertainty: bool,
}

#[derive(Default)]
pub struct PredictConfigBuilder {
    features: Option<FeatureConfig>,
    model: Option<ModelConfig>,
    split: Option<SplitConfig>,
    uncertainty: Option<bool>,
}

impl PredictConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(mut self, features: FeatureConfig) -> Self {
        self.features = Some(features);
        self
    }
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.model = Some(model);
        self
    }
    pub fn split(mut self, split: SplitConfig) -> Self {
        self.split = Some(split);
        self
    }
    pub fn uncertainty(mut self, enabled: bool) -> Self {
        self.uncertainty = Some(enabled);
        self
    }

    pub fn build(self) -> Result<PredictConfig, ConfigError> {
        let config = PredictConfig {
            features: self
                .features
                .ok_or(ConfigError::MissingParameter("features"))?,
            model: self.model.ok_or(ConfigError::MissingParameter("model"))?,
            split: self.split.ok_or(ConfigError::MissingParameter("split"))?,
            uncertainty: self.uncertainty.unwrap_or(false),
        };
        config.features.validate()?;
        config.model.validate()?;
        config.split.validate()?;
        Ok(config)
    }
}

/// Settings for hierarchical cross-validation over a whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningCurveConfig {
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub validation: ValidationConfig,
}

#[derive(Default)]
pub struct LearningCurveConfigBuilder {
    features: Option<FeatureConfig>,
    model: Option<ModelConfig>,
    validation: Option<ValidationConfig>,
}

impl LearningCurveConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(mut self, features: FeatureConfig) -> Self {
        self.features = Some(features);
        self
    }
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.model = Some(model);
        self
    }
    pub fn validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn build(self) -> Result<LearningCurveConfig, ConfigError> {
        let config = LearningCurveConfig {
            features: self
                .features
                .ok_or(ConfigError::MissingParameter("features"))?,
            model: self.model.ok_or(ConfigError::MissingParameter("model"))?,
            validation: self
                .validation
                .ok_or(ConfigError::MissingParameter("validation"))?,
        };
        config.features.validate()?;
        config.model.validate()?;
        config.validation.validate()?;
        Ok(config)
    }
}

/// Settings for the feature-reducing model builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub builder: BuilderConfig,
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    features: Option<FeatureConfig>,
    split: Option<SplitConfig>,
    builder: Option<BuilderConfig>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(mut self, features: FeatureConfig) -> Self {
        self.features = Some(features);
        self
    }
    pub fn split(mut self, split: SplitConfig) -> Self {
        self.split = Some(split);
        self
    }
    pub fn builder(mut self, builder: BuilderConfig) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        let config = BuildConfig {
            features: self
                .features
                .ok_or(ConfigError::MissingParameter("features"))?,
            split: self.split.ok_or(ConfigError::MissingParameter("split"))?,
            builder: self
                .builder
                .ok_or(ConfigError::MissingParameter("builder"))?,
        };
        config.features.validate()?;
        config.split.validate()?;
        config.builder.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureConfig {
        FeatureConfig {
            kinds: vec![FeatureKind::EigenSpectrum],
            clean_zero: true,
            standardize: true,
        }
    }

    fn split() -> SplitConfig {
        SplitConfig {
            test_fraction: 0.25,
            seed: 7,
            shuffle: true,
        }
    }

    #[test]
    fn predict_builder_reports_first_missing_parameter() {
        let result = PredictConfigBuilder::new().features(features()).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("model")));
    }

    #[test]
    fn predict_builder_validates_ranges() {
        let result = PredictConfigBuilder::new()
            .features(features())
            .model(ModelConfig::default_ridge())
            .split(SplitConfig {
                test_fraction: 1.0,
                ..split()
            })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "split.test-fraction",
                ..
            })
        ));
    }

    #[test]
    fn predict_builder_succeeds_with_all_parameters() {
        let config = PredictConfigBuilder::new()
            .features(features())
            .model(ModelConfig::default_gaussian_process())
            .split(split())
            .build()
            .unwrap();
        assert!(!config.uncertainty);
        assert_eq!(config.model.name(), "gaussian-process");
    }

    #[test]
    fn learning_curve_builder_checks_split_bounds() {
        let result = LearningCurveConfigBuilder::new()
            .features(features())
            .model(ModelConfig::default_ridge())
            .validation(ValidationConfig {
                min_split: 8,
                max_split: Some(4),
                seed: 0,
            })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "validation.max-split",
                ..
            })
        ));
    }

    #[test]
    fn build_config_rejects_empty_feature_kinds() {
        let result = BuildConfigBuilder::new()
            .features(FeatureConfig {
                kinds: vec![],
                ..features()
            })
            .split(split())
            .builder(BuilderConfig::default())
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "features.kinds",
                ..
            })
        ));
    }

    #[test]
    fn neb_builder_requires_every_parameter() {
        let result = NebConfigBuilder::new()
            .images(5)
            .spring_constant(0.1)
            .climbing_image(true)
            .fmax(0.05)
            .max_steps(200)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("max_step_length")));

        let config = NebConfigBuilder::new()
            .images(5)
            .spring_constant(0.1)
            .climbing_image(true)
            .fmax(0.05)
            .max_steps(200)
            .max_step_length(0.2)
            .build()
            .unwrap();
        assert_eq!(config.images, 5);
    }

    #[test]
    fn default_builder_config_is_valid() {
        assert_eq!(BuilderConfig::default().validate(), Ok(()));
        assert_eq!(BuilderConfig::default().exponents, (2, 4));
    }
}
