use atoml::engine::config as core_config;
use std::path::PathBuf;

/// Where a dataset comes from and which property it is trained against.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub input: PathBuf,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictSettings {
    pub data: DataSettings,
    pub output: Option<PathBuf>,
    pub core_config: core_config::PredictConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearningCurveSettings {
    pub data: DataSettings,
    pub output: Option<PathBuf>,
    pub core_config: core_config::LearningCurveConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    pub data: DataSettings,
    pub core_config: core_config::BuildConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSettings {
    pub data: DataSettings,
    pub output: PathBuf,
    pub features: core_config::FeatureConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NebSettings {
    pub initial: PathBuf,
    pub final_state: PathBuf,
    pub potential: PathBuf,
    pub output: PathBuf,
    pub core_config: core_config::NebConfig,
}
