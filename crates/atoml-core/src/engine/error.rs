use super::config::ConfigError;
use crate::core::features::FeatureError;
use crate::core::io::feature_store::FeatureStoreError;
use crate::core::potentials::CalculatorError;
use crate::core::regression::RegressionError;
use crate::core::selection::SelectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Feature store error: {source}")]
    FeatureStore {
        #[from]
        source: FeatureStoreError,
    },

    #[error("Feature generation failed: {source}")]
    Feature {
        #[from]
        source: FeatureError,
    },

    #[error("Regression failed: {source}")]
    Regression {
        #[from]
        source: RegressionError,
    },

    #[error("Feature selection failed: {source}")]
    Selection {
        #[from]
        source: SelectionError,
    },

    #[error("Energy calculation failed: {source}")]
    Calculator {
        #[from]
        source: CalculatorError,
    },

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Insufficient data for {context}: need at least {required}, have {available}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Path search failed: {0}")]
    Neb(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
