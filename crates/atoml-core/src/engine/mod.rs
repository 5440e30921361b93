//! # Engine Module
//!
//! Stateful procedures built on the numerical routines in [`crate::core`].
//!
//! ## Overview
//!
//! The engine turns feature matrices and structures into fitted models, validation
//! statistics, reduced feature spaces and minimum-energy paths. It owns the configuration
//! types consumed by the workflows, the error type they return and the progress events
//! they emit.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Validated settings and their builders
//! - **Error Handling** ([`error`]) - The engine-wide error type
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Models** ([`model`]) - Fitting the configured regression model
//! - **Splitting** ([`split`]) - Train/test partitioning
//! - **Validation** ([`validation`]) - Hierarchical cross-validation and learning curves
//! - **Model Building** ([`builder`]) - Feature expansion, screening and size optimisation
//! - **Path Search** ([`neb`]) - Nudged elastic band with climbing image and FIRE

pub mod builder;
pub mod config;
pub mod error;
pub mod model;
pub mod neb;
pub mod progress;
pub mod split;
pub mod validation;
