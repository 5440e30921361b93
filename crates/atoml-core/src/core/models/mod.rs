//! # Core Models Module
//!
//! Data structures describing atomistic systems and the numeric data derived from them.
//!
//! - [`element`] - Static periodic-table data and per-atom property selection
//! - [`structure`] - Atoms, structures and their key-value info records
//! - [`dataset`] - Structures paired with scalar targets
//! - [`matrix`] - Named feature matrices
//!
//! ## Usage
//!
//! ```ignore
//! use atoml::core::models::{dataset::Dataset, structure::{Atom, Structure}};
//!
//! let mut water = Structure::new("water-0");
//! water.push_atom(Atom::from_symbol("O", Point3::origin())?);
//! water.set_info("energy", InfoValue::Float(-14.2));
//!
//! let (dataset, summary) = Dataset::from_structures(vec![water], "energy");
//! ```

pub mod dataset;
pub mod element;
pub mod matrix;
pub mod structure;
