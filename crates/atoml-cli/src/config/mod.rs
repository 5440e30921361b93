mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{
    build_build_config, build_features_config, build_learning_curve_config, build_neb_config,
    build_predict_config,
};
pub use models::{BuildSettings, DataSettings, FeatureSettings, LearningCurveSettings, NebSettings, PredictSettings};
