//! # evalg Algorithm Library (evalg-algo)
//!
//! Per-event analysis algorithms built on `evalg-common`.
//!
//! **Pieces:**
//! - `Algorithm` trait and the shared `AlgorithmBase` state
//! - `AlgorithmRegistry`: name to constructor table
//! - `AlgorithmSequence`: ordered, nestable composition of algorithms
//! - `algorithms`: concrete filters
//! - `runner`: JSON-lines event driver used by `evalg-run`

pub mod algorithm;
pub mod algorithms;
pub mod registry;
pub mod runner;
pub mod sequence;

pub use algorithm::{Algorithm, AlgorithmBase, LifecycleState};
pub use evalg_common::{Error, Result};
pub use registry::AlgorithmRegistry;
pub use sequence::AlgorithmSequence;

/// Installation prefix holding the built-in configuration files
pub const CONFIG_INSTALL_PREFIX: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config");
