//! # Core Module
//!
//! Fundamental building blocks for atomistic machine learning.
//!
//! - **Structures and data** ([`models`]) - Elements, atoms, structures, datasets and feature matrices
//! - **File I/O** ([`io`]) - Extended XYZ structure files and the CSV feature store
//! - **Fingerprints** ([`features`]) - Graph, Coulomb, composition and distance feature vectors,
//!   combinatorial expansion and preprocessing
//! - **Regression** ([`regression`]) - Ridge regression, Gaussian processes, kernels and metrics
//! - **Feature selection** ([`selection`]) - Correlation screening, lasso ordering and PCA
//! - **Potentials** ([`potentials`]) - Pair-potential calculators used by path searches

pub mod features;
pub mod io;
pub mod models;
pub mod potentials;
pub mod regression;
pub mod selection;
