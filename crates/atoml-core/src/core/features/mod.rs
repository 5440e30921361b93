//! # Features Module
//!
//! Turns variable-size structures into fixed-width numeric feature vectors.
//!
//! - [`graph`] - Neighbour lists, connection matrices and coordination fingerprints
//! - [`generator`] - The configurable [`generator::FeatureGenerator`] that pads every
//!   structure to a common width
//! - [`expansion`] - Combinatorial second-order feature expansion
//! - [`preprocess`] - Zero-variance cleaning and standardization

pub mod expansion;
pub mod generator;
pub mod graph;
pub mod preprocess;

use crate::core::models::element::ElementError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Element lookup failed: {0}")]
    Element(#[from] ElementError),

    #[error("Structure '{unique_id}' has {atoms} atoms but the generator was fitted for at most {max}")]
    StructureTooLarge {
        unique_id: String,
        atoms: usize,
        max: usize,
    },

    #[error("Structure '{unique_id}' contains element {symbol} that was not seen during fitting")]
    UnseenElement {
        unique_id: String,
        symbol: &'static str,
    },

    #[error("Neighbour shell must be at least 1, got {0}")]
    InvalidShell(usize),

    #[error("Unknown feature kind: '{0}'")]
    UnknownKind(String),

    #[error("Feature generator has no feature kinds configured")]
    NoFeatureKinds,

    #[error("Cannot fit a feature generator on an empty structure set")]
    EmptyInput,

    #[error("Feature blocks disagree on the number of rows")]
    RowMismatch,

    #[error("Matrices disagree on the number of features: {expected} vs {found}")]
    WidthMismatch { expected: usize, found: usize },
}
