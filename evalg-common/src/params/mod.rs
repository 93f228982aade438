//! Concurrent parameter management
//!
//! A `ConcurrentParam<T>` holds run-dependent state derived by an algorithm,
//! one value per concurrency key. Readers on the hot path take a shared lock;
//! writes happen only while an algorithm reloads for a new run.
//!
//! # Concurrency models
//!
//! - `none`: one shared slot, keys are ignored. Correct only when events are
//!   processed sequentially.
//! - `memoize`: a map from concurrency key to value. Many readers and writers
//!   may work on different keys at once; two writers on the same key must be
//!   serialized by the caller (see `ReloadGate`).
//! - `threadpool`: reserved; every operation fails with `NotImplemented`.
//!
//! # Usage
//!
//! ```rust
//! use evalg_common::params::{ConcurrencyModel, ConcurrentParam};
//!
//! let cuts: ConcurrentParam<Vec<f64>> = ConcurrentParam::new(ConcurrencyModel::Memoize).unwrap();
//! cuts.save(42, vec![-1.0, 1.0]).unwrap();
//! assert!(cuts.has_key(42).unwrap());
//! assert_eq!(cuts.load(42).unwrap(), vec![-1.0, 1.0]);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::RwLock;

mod gate;
#[cfg(test)]
mod tests;

pub use gate::ReloadGate;

/// Opaque handle selecting a cache slot
pub type ConcurrencyKey = u64;

/// Key used by the single-slot model
pub const SINGLE_SLOT_KEY: ConcurrencyKey = 0;

/// How a `ConcurrentParam` partitions its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyModel {
    /// One shared value for sequential processing
    None,
    /// One value per concurrency key
    #[default]
    Memoize,
    /// Reserved for per-worker slots
    ThreadPool,
}

impl ConcurrencyModel {
    /// Whether keys must be derived by hashing the run number
    pub fn needs_hashing(self) -> bool {
        matches!(self, ConcurrencyModel::Memoize)
    }

    /// Concurrency key for a run number under this model
    pub fn key_for_run(self, run_number: i64) -> Result<ConcurrencyKey> {
        match self {
            ConcurrencyModel::None => Ok(SINGLE_SLOT_KEY),
            ConcurrencyModel::Memoize => {
                let mut hasher = DefaultHasher::new();
                run_number.hash(&mut hasher);
                Ok(hasher.finish())
            }
            ConcurrencyModel::ThreadPool => Err(threadpool_unsupported()),
        }
    }
}

impl fmt::Display for ConcurrencyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConcurrencyModel::None => "none",
            ConcurrencyModel::Memoize => "memoize",
            ConcurrencyModel::ThreadPool => "threadpool",
        };
        f.write_str(s)
    }
}

impl FromStr for ConcurrencyModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "single" => Ok(ConcurrencyModel::None),
            "memoize" => Ok(ConcurrencyModel::Memoize),
            "threadpool" => Ok(ConcurrencyModel::ThreadPool),
            other => Err(Error::Config(format!("unknown concurrency model '{}'", other))),
        }
    }
}

fn threadpool_unsupported() -> Error {
    Error::NotImplemented("concurrency model 'threadpool'".to_string())
}

enum Storage<T> {
    Single(RwLock<Option<T>>),
    Memoized(RwLock<HashMap<ConcurrencyKey, T>>),
}

/// Keyed store of one value per concurrency key
pub struct ConcurrentParam<T> {
    model: ConcurrencyModel,
    storage: Storage<T>,
}

impl<T: Clone> ConcurrentParam<T> {
    /// Create an empty parameter for `model`
    ///
    /// Fails with `NotImplemented` for the threadpool model.
    pub fn new(model: ConcurrencyModel) -> Result<Self> {
        let storage = match model {
            ConcurrencyModel::None => Storage::Single(RwLock::new(None)),
            ConcurrencyModel::Memoize => Storage::Memoized(RwLock::new(HashMap::new())),
            ConcurrencyModel::ThreadPool => return Err(threadpool_unsupported()),
        };
        Ok(Self { model, storage })
    }

    pub fn model(&self) -> ConcurrencyModel {
        self.model
    }

    pub fn needs_hashing(&self) -> bool {
        self.model.needs_hashing()
    }

    /// Stored value for `key`
    ///
    /// Under `none` every key reads the shared value.
    pub fn load(&self, key: ConcurrencyKey) -> Result<T> {
        match &self.storage {
            Storage::Single(slot) => slot
                .read()
                .map_err(Error::poisoned)?
                .clone()
                .ok_or(Error::KeyNotFound(key)),
            Storage::Memoized(map) => map
                .read()
                .map_err(Error::poisoned)?
                .get(&key)
                .cloned()
                .ok_or(Error::KeyNotFound(key)),
        }
    }

    /// Insert or overwrite the value for `key`
    pub fn save(&self, key: ConcurrencyKey, value: T) -> Result<()> {
        match &self.storage {
            Storage::Single(slot) => {
                *slot.write().map_err(Error::poisoned)? = Some(value);
            }
            Storage::Memoized(map) => {
                map.write().map_err(Error::poisoned)?.insert(key, value);
            }
        }
        Ok(())
    }

    /// Whether a value is stored for `key`
    ///
    /// Key isolation does not exist under `none`, so asking is a caller bug.
    pub fn has_key(&self, key: ConcurrencyKey) -> Result<bool> {
        match &self.storage {
            Storage::Single(_) => Err(Error::ModelMisuse(
                "has_key is not available when the concurrency model is 'none'".to_string(),
            )),
            Storage::Memoized(map) => Ok(map.read().map_err(Error::poisoned)?.contains_key(&key)),
        }
    }

    /// Number of stored values
    pub fn len(&self) -> Result<usize> {
        match &self.storage {
            Storage::Single(slot) => Ok(usize::from(slot.read().map_err(Error::poisoned)?.is_some())),
            Storage::Memoized(map) => Ok(map.read().map_err(Error::poisoned)?.len()),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T> fmt::Debug for ConcurrentParam<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentParam").field("model", &self.model).finish_non_exhaustive()
    }
}
