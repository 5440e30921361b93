use crate::error::{CliError, Result};
use atoml::core::regression::kernel::KernelTerm;
use atoml::core::selection::correlation::CorrelationKind;
use atoml::core::selection::screening::ScreeningMethod;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDataConfig {
    pub target: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFeaturesConfig {
    pub kinds: Option<Vec<String>>,
    pub graph_properties: Option<Vec<String>>,
    pub bond_buffer: Option<f64>,
    pub clean_zero: Option<bool>,
    pub standardize: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileModelType {
    Ridge,
    #[serde(alias = "gp")]
    GaussianProcess,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileModelConfig {
    #[serde(rename = "type")]
    pub model_type: Option<FileModelType>,
    pub grid_points: Option<usize>,
    pub refinements: Option<usize>,
    pub fit_intercept: Option<bool>,
    pub kernel: Option<Vec<KernelTerm>>,
    pub regularization: Option<f64>,
    pub optimize_hyperparameters: Option<bool>,
    pub standardize_target: Option<bool>,
    pub max_iterations: Option<usize>,
    pub uncertainty: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSplitConfig {
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
    pub shuffle: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileValidationConfig {
    pub min_split: Option<usize>,
    pub max_split: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBuilderConfig {
    pub store: Option<PathBuf>,
    pub screening_method: Option<ScreeningMethod>,
    pub screening_correlation: Option<CorrelationKind>,
    pub initial_prediction: Option<bool>,
    pub clean_features: Option<bool>,
    pub expand: Option<bool>,
    pub exponents: Option<[i32; 2]>,
    pub optimize: Option<bool>,
    pub size: Option<usize>,
    pub width: Option<f64>,
    pub regularization: Option<f64>,
    pub lasso_alpha: Option<f64>,
    pub lasso_steps: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileNebConfig {
    pub images: Option<usize>,
    pub spring_constant: Option<f64>,
    pub climbing_image: Option<bool>,
    pub fmax: Option<f64>,
    pub max_steps: Option<usize>,
    pub max_step_length: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data: Option<FileDataConfig>,
    pub features: Option<FileFeaturesConfig>,
    pub model: Option<FileModelConfig>,
    pub split: Option<FileSplitConfig>,
    pub validation: Option<FileValidationConfig>,
    pub builder: Option<FileBuilderConfig>,
    pub neb: Option<FileNebConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
