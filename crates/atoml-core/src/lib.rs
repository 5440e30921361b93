//! # ATOML Core Library
//!
//! Atomistic machine learning for molecular and surface property prediction: fixed-width
//! structure fingerprints, ridge and Gaussian process regression, feature selection,
//! hierarchical cross-validation and nudged elastic band path search.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Dataset`,
//!   `FeatureMatrix`), file formats, fingerprint generators and the pure numerical
//!   routines for regression and feature selection.
//!
//! - **[`engine`]: The Logic Core.** Configuration, error types, progress reporting and the
//!   stateful procedures built on top of `core`: data splitting, hierarchical validation,
//!   the feature-reducing model builder and the NEB driver.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (predict, learning curve, model
//!   building, NEB) that tie `engine` and `core` together for end users.

pub mod core;
pub mod engine;
pub mod workflows;
