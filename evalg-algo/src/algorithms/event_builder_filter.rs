//! Particle filter on event-builder PID

use crate::algorithm::{Algorithm, AlgorithmBase};
use evalg_common::config::NodePath;
use evalg_common::{BankList, Result};
use std::collections::BTreeSet;
use tracing::trace;

/// Masks particles whose `pid` is not in the `pids` option
#[derive(Debug)]
pub struct EventBuilderFilter {
    base: AlgorithmBase,
    particle_bank: String,
    particle_index: usize,
    pids: BTreeSet<i64>,
}

impl EventBuilderFilter {
    pub const CLASS_NAME: &'static str = "clas12::EventBuilderFilter";

    pub fn new() -> Self {
        Self {
            base: AlgorithmBase::new(Self::CLASS_NAME).with_default_config(),
            particle_bank: String::new(),
            particle_index: 0,
            pids: BTreeSet::new(),
        }
    }

    /// Whether a particle with `pid` passes
    pub fn filter(&self, pid: i64) -> bool {
        self.pids.contains(&pid)
    }
}

impl Default for EventBuilderFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for EventBuilderFilter {
    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn start_hook(&mut self, banks: &BankList) -> Result<()> {
        self.particle_bank = self.base.option_scalar("particle_bank", NodePath::new())?;
        self.pids = self.base.option_set("pids", NodePath::new())?;
        self.particle_index = self.base.bank_index(banks, &self.particle_bank)?;
        Ok(())
    }

    fn run_hook(&self, banks: &mut BankList) -> Result<bool> {
        let bank = self.base.bank_mut(banks, self.particle_index, &self.particle_bank)?;
        bank.filter(|bank, row| {
            let pid = bank.get_int("pid", row)?;
            let accept = self.filter(pid);
            trace!(algorithm = %self.base.name(), pid, accept, "filter");
            Ok(accept)
        })?;
        Ok(bank.num_active() > 0)
    }
}
