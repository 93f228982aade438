//! Algorithm sequence
//!
//! An ordered, named list of algorithm instances that is itself an
//! `Algorithm`, so sequences nest. Members are named `sequence|instance`;
//! renaming the sequence renames every member, recursively.

use crate::algorithm::{Algorithm, AlgorithmBase};
use crate::registry::AlgorithmRegistry;
use evalg_common::{BankList, ConcurrencyModel, Error, OptionValue, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Class name of a sequence
pub const SEQUENCE_CLASS_NAME: &str = "AlgorithmSequence";

const DEFAULT_SEQUENCE_NAME: &str = "sequence";

struct Member {
    instance: String,
    algorithm: Box<dyn Algorithm>,
}

/// Ordered composition of algorithms
pub struct AlgorithmSequence {
    base: AlgorithmBase,
    registry: Arc<AlgorithmRegistry>,
    members: Vec<Member>,
    index: HashMap<String, usize>,
}

impl AlgorithmSequence {
    /// Empty sequence named `sequence`
    pub fn new(registry: Arc<AlgorithmRegistry>) -> Self {
        let mut base = AlgorithmBase::new(SEQUENCE_CLASS_NAME);
        base.set_name(DEFAULT_SEQUENCE_NAME);
        Self {
            base,
            registry,
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn member_name(&self, instance: &str) -> String {
        format!("{}|{}", self.base.name(), instance)
    }

    /// Create `class_name` from the registry and append it
    ///
    /// `instance` defaults to the class name.
    pub fn add(&mut self, class_name: &str, instance: Option<&str>) -> Result<()> {
        let instance = instance.unwrap_or(class_name);
        if self.index.contains_key(instance) {
            return Err(self.duplicate(instance));
        }
        let algorithm = self.registry.create(class_name)?;
        self.add_algorithm(algorithm, Some(instance))
    }

    /// Append an already-constructed algorithm
    ///
    /// `instance` defaults to the algorithm's current name. The member takes
    /// the sequence's concurrency model.
    pub fn add_algorithm(&mut self, mut algorithm: Box<dyn Algorithm>, instance: Option<&str>) -> Result<()> {
        let instance = instance.unwrap_or_else(|| algorithm.name()).to_string();
        if self.index.contains_key(&instance) {
            return Err(self.duplicate(&instance));
        }
        algorithm.set_name(&self.member_name(&instance));
        algorithm.set_concurrency_model(self.base.concurrency_model());
        debug!(sequence = %self.base.name(), "added {} as '{}'", algorithm.class_name(), algorithm.name());
        self.index.insert(instance.clone(), self.members.len());
        self.members.push(Member { instance, algorithm });
        Ok(())
    }

    fn duplicate(&self, instance: &str) -> Error {
        Error::DuplicateInstance(format!("'{}' in sequence '{}'", instance, self.base.name()))
    }

    fn unknown(&self, instance: &str) -> Error {
        Error::UnknownInstance(format!("'{}' in sequence '{}'", instance, self.base.name()))
    }

    fn position(&self, instance: &str) -> Result<usize> {
        self.index.get(instance).copied().ok_or_else(|| self.unknown(instance))
    }

    /// Member `instance` as its concrete type
    pub fn get<T: Algorithm>(&self, instance: &str) -> Result<&T> {
        let algorithm: &dyn Algorithm = self.members[self.position(instance)?].algorithm.as_ref();
        algorithm.as_any().downcast_ref::<T>().ok_or_else(|| self.unknown(instance))
    }

    /// Member `instance` as its concrete type, for changes before start
    pub fn get_mut<T: Algorithm>(&mut self, instance: &str) -> Result<&mut T> {
        let position = self.position(instance)?;
        let err = self.unknown(instance);
        let algorithm: &mut dyn Algorithm = self.members[position].algorithm.as_mut();
        algorithm.as_any_mut().downcast_mut::<T>().ok_or(err)
    }

    /// Member `instance` behind the trait
    pub fn algorithm_mut(&mut self, instance: &str) -> Result<&mut dyn Algorithm> {
        let position = self.position(instance)?;
        Ok(self.members[position].algorithm.as_mut())
    }

    /// Set an option on member `instance`
    pub fn set_member_option(&mut self, instance: &str, key: &str, value: impl Into<OptionValue>) -> Result<()> {
        self.algorithm_mut(instance)?.set_option(key, value.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in run order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.algorithm.name())
    }

    /// Log the members in run order
    pub fn print_sequence(&self) {
        info!("{}:", self.base.name());
        for member in &self.members {
            info!("  - {} [{}]", member.algorithm.name(), member.algorithm.class_name());
        }
    }
}

impl Algorithm for AlgorithmSequence {
    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    /// Start every member in order
    ///
    /// If a member fails, the members already started are stopped and the
    /// error is returned. The sequence cannot be started again afterwards.
    fn start_hook(&mut self, banks: &BankList) -> Result<()> {
        for i in 0..self.members.len() {
            if let Err(err) = self.members[i].algorithm.start(banks) {
                error!(
                    sequence = %self.base.name(),
                    "'{}' failed to start; stopping {} started members",
                    self.members[i].algorithm.name(), i
                );
                for started in self.members[..i].iter_mut().rev() {
                    if let Err(stop_err) = started.algorithm.stop() {
                        warn!(sequence = %self.base.name(), "stopping '{}': {}", started.algorithm.name(), stop_err);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn run_hook(&self, banks: &mut BankList) -> Result<bool> {
        for member in &self.members {
            if !member.algorithm.run(banks)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn stop_hook(&mut self) -> Result<()> {
        for member in &mut self.members {
            member.algorithm.stop()?;
        }
        Ok(())
    }

    fn set_name(&mut self, name: &str) {
        self.base.set_name(name);
        for i in 0..self.members.len() {
            let full = self.member_name(&self.members[i].instance);
            self.members[i].algorithm.set_name(&full);
        }
    }

    /// Applies to current members and to members added afterwards
    fn set_concurrency_model(&mut self, model: ConcurrencyModel) {
        self.base.set_concurrency_model(model);
        for member in &mut self.members {
            member.algorithm.set_concurrency_model(model);
        }
    }

    fn is_sequential_only(&self) -> bool {
        self.base.concurrency_model() == ConcurrencyModel::None
            || self.members.iter().any(|m| m.algorithm.is_sequential_only())
    }

    fn set_config_file(&mut self, name: &str) {
        for member in &mut self.members {
            member.algorithm.set_config_file(name);
        }
    }

    fn set_config_directory(&mut self, dir: &str) {
        for member in &mut self.members {
            member.algorithm.set_config_directory(dir);
        }
    }

    fn set_install_prefix(&mut self, prefix: &Path) {
        self.base.set_install_prefix(prefix);
        for member in &mut self.members {
            member.algorithm.set_install_prefix(prefix);
        }
    }

    fn add_search_directory(&mut self, dir: &Path) {
        for member in &mut self.members {
            member.algorithm.add_search_directory(dir);
        }
    }
}
