//! Per-algorithm reload gate
//!
//! Serializes reloads of all run-dependent parameters of one algorithm behind
//! a single mutex, so a reload publishes every derived value for a key before
//! any reader can see that key as ready.

use super::{ConcurrencyKey, ConcurrencyModel, ConcurrentParam};
use crate::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::trace;

/// Decides when an algorithm must reload, and runs the reload under its lock
#[derive(Debug)]
pub struct ReloadGate {
    model: ConcurrencyModel,
    /// Run number each key was last loaded for; saved after the derived values
    run_numbers: ConcurrentParam<i64>,
    lock: Mutex<()>,
    reloads: AtomicUsize,
}

impl ReloadGate {
    pub fn new(model: ConcurrencyModel) -> Result<Self> {
        Ok(Self {
            model,
            run_numbers: ConcurrentParam::new(model)?,
            lock: Mutex::new(()),
            reloads: AtomicUsize::new(0),
        })
    }

    pub fn model(&self) -> ConcurrencyModel {
        self.model
    }

    /// Concurrency key for `run_number`, reloading first if needed
    ///
    /// `reload` must save every derived parameter for the key it is given.
    /// It runs with the gate's lock held and at most once per call.
    pub fn prepare_event<F>(&self, run_number: i64, reload: F) -> Result<ConcurrencyKey>
    where
        F: FnOnce(ConcurrencyKey) -> Result<()>,
    {
        let key = self.model.key_for_run(run_number)?;
        if self.model == ConcurrencyModel::Memoize && self.run_numbers.has_key(key)? {
            return Ok(key);
        }
        let _guard = self.lock.lock().map_err(Error::poisoned)?;
        if self.is_loaded(key, run_number)? {
            return Ok(key);
        }
        trace!(run = run_number, key, "reloading run-dependent parameters");
        reload(key)?;
        self.run_numbers.save(key, run_number)?;
        self.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(key)
    }

    fn is_loaded(&self, key: ConcurrencyKey, run_number: i64) -> Result<bool> {
        match self.model {
            ConcurrencyModel::Memoize => self.run_numbers.has_key(key),
            ConcurrencyModel::None => match self.run_numbers.load(key) {
                Ok(loaded) => Ok(loaded == run_number),
                Err(Error::KeyNotFound(_)) => Ok(false),
                Err(err) => Err(err),
            },
            ConcurrencyModel::ThreadPool => Err(Error::NotImplemented(
                "concurrency model 'threadpool'".to_string(),
            )),
        }
    }

    /// Run number loaded for `key`
    pub fn run_number(&self, key: ConcurrencyKey) -> Result<i64> {
        self.run_numbers.load(key)
    }

    /// Number of reloads performed so far
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::Relaxed)
    }
}
