//! # evalg Common Library
//!
//! Shared services for per-event analysis algorithms:
//! - Error taxonomy
//! - Option values
//! - Configuration search path, documents and run-range lookups
//! - Concurrent parameter cache and reload gate
//! - In-memory bank collection
//! - Logging and run settings

pub mod bank;
pub mod config;
pub mod error;
pub mod logging;
pub mod option;
pub mod params;
pub mod settings;

pub use bank::{Bank, BankList, Cell, Row};
pub use error::{Error, Result};
pub use option::{ConfigValue, OptionSet, OptionValue, ScalarValue};
pub use params::{ConcurrencyKey, ConcurrencyModel, ConcurrentParam, ReloadGate};
