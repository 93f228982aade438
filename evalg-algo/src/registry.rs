//! Algorithm registry
//!
//! Maps algorithm class names to constructors. The host program builds the
//! table once at startup (`with_builtins`) and shares it with every sequence.

use crate::algorithm::Algorithm;
use crate::algorithms::{EventBuilderFilter, ZVertexFilter};
use evalg_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Constructor for one algorithm class
pub type AlgorithmCreator = Arc<dyn Fn() -> Box<dyn Algorithm> + Send + Sync>;

/// Name to constructor table
#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    creators: BTreeMap<String, AlgorithmCreator>,
}

impl AlgorithmRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every algorithm shipped with this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(EventBuilderFilter::CLASS_NAME, || Box::new(EventBuilderFilter::new()));
        registry.register(ZVertexFilter::CLASS_NAME, || Box::new(ZVertexFilter::new()));
        registry
    }

    /// Register a constructor under `name`
    ///
    /// Returns false, leaving the first registration in place, if the name is
    /// already taken.
    pub fn register<F>(&mut self, name: &str, creator: F) -> bool
    where
        F: Fn() -> Box<dyn Algorithm> + Send + Sync + 'static,
    {
        if self.creators.contains_key(name) {
            warn!("algorithm '{}' is already registered", name);
            return false;
        }
        trace!("registered algorithm '{}'", name);
        self.creators.insert(name.to_string(), Arc::new(creator));
        true
    }

    /// Construct a new instance of `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Algorithm>> {
        let creator = self
            .creators
            .get(name)
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))?;
        Ok(creator())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.creators.keys()).finish()
    }
}
