//! Provides input/output for structure files and generated feature tables.
//!
//! Structures are read and written through the [`traits::StructureFile`] trait, with
//! extended XYZ as the concrete format. Feature matrices are persisted as CSV tables by
//! [`feature_store::FeatureStore`] so that intermediate results can be inspected or reused.

pub mod feature_store;
pub mod traits;
pub mod xyz;
