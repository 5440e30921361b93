//! # Workflows Module
//!
//! High-level entry points that run a complete procedure from structures to results.
//!
//! ## Overview
//!
//! Each workflow validates nothing it does not own: configurations arrive already built
//! (see [`crate::engine::config`]), structures arrive already loaded. A workflow generates
//! features, drives the engine, reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and returns a plain
//! result value for the caller to print or persist.
//!
//! ## Architecture
//!
//! - **Features** ([`features`]) - Fingerprint tables for a dataset
//! - **Prediction** ([`predict`]) - Train/test split, fit and per-record predictions
//! - **Learning Curve** ([`learning_curve`]) - Hierarchical cross-validation
//! - **Model Building** ([`build`]) - Expansion, screening and feature-space reduction
//! - **Path Search** ([`neb`]) - Minimum-energy path between two structures

pub mod build;
pub mod features;
pub mod learning_curve;
pub mod neb;
pub mod predict;
