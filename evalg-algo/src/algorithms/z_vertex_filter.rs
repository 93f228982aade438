//! Run-dependent z-vertex filter
//!
//! Cuts come from the `cuts` container of the configuration: each entry
//! covers a `runs = [min, max]` range and holds either `vz = [lo, hi]` or a
//! per-PID `pid` table of such pairs. The cut for each configured PID is
//! resolved once per run and cached per concurrency key.

use crate::algorithm::{Algorithm, AlgorithmBase};
use evalg_common::config::{NodePath, RunRangeQuery};
use evalg_common::{BankList, ConcurrencyKey, ConcurrentParam, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, trace};

const PARTICLE_BANK: &str = "REC::Particle";
const CONFIG_BANK: &str = "RUN::config";

/// Particles with `|status|` below this are forward-tagger tracks, never cut
const MIN_CUT_STATUS: i64 = 2000;

const CUTS_QUERY: RunRangeQuery<'static> = RunRangeQuery {
    container_key: "cuts",
    range_key: "runs",
    discriminant_key: "pid",
    value_key: "vz",
};

/// Accepted `(lo, hi)` window per PID; a PID without an entry is not cut
pub type ZCuts = BTreeMap<i64, (f64, f64)>;

/// Masks particles of selected PIDs whose `vz` lies outside the run's window
#[derive(Debug)]
pub struct ZVertexFilter {
    base: AlgorithmBase,
    particle_index: usize,
    config_index: usize,
    pids: BTreeSet<i64>,
    zcuts: Option<ConcurrentParam<ZCuts>>,
}

impl ZVertexFilter {
    pub const CLASS_NAME: &'static str = "clas12::ZVertexFilter";

    pub fn new() -> Self {
        Self {
            base: AlgorithmBase::new(Self::CLASS_NAME).with_default_config(),
            particle_index: 0,
            config_index: 0,
            pids: BTreeSet::new(),
            zcuts: None,
        }
    }

    fn zcuts(&self) -> Result<&ConcurrentParam<ZCuts>> {
        self.zcuts
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("'{}' is not started", self.base.name())))
    }

    /// Concurrency key for `run_number`, resolving its cuts on first use
    pub fn prepare_event(&self, run_number: i64) -> Result<ConcurrencyKey> {
        self.base.prepare_event(run_number, |key| self.reload(run_number, key))
    }

    fn reload(&self, run_number: i64, key: ConcurrencyKey) -> Result<()> {
        let config = self.base.config()?;
        let base = NodePath::from(Self::CLASS_NAME);
        let mut cuts = ZCuts::new();
        for &pid in &self.pids {
            let window: Vec<f64> = config.lookup_at_run_range(&base, &CUTS_QUERY, run_number, pid, Vec::new());
            match window.as_slice() {
                [] => {}
                [lo, hi] => {
                    cuts.insert(pid, (*lo, *hi));
                }
                other => {
                    error!(
                        algorithm = %self.base.name(),
                        "cut for pid {} in run {} must have 2 values, got {}; not cutting",
                        pid, run_number, other.len()
                    );
                }
            }
        }
        debug!(algorithm = %self.base.name(), run = run_number, key, "cuts {:?}", cuts);
        self.zcuts()?.save(key, cuts)
    }

    /// Cut window in effect for `pid` under `key`
    pub fn cut(&self, pid: i64, key: ConcurrencyKey) -> Result<Option<(f64, f64)>> {
        Ok(self.zcuts()?.load(key)?.get(&pid).copied())
    }

    /// Whether a particle passes under the cuts loaded for `key`
    pub fn filter(&self, vz: f64, pid: i64, status: i64, key: ConcurrencyKey) -> Result<bool> {
        if !self.pids.contains(&pid) || status.abs() < MIN_CUT_STATUS {
            return Ok(true);
        }
        Ok(match self.cut(pid, key)? {
            Some((lo, hi)) => vz > lo && vz < hi,
            None => true,
        })
    }

    /// Number of times the cuts were reloaded
    pub fn reload_count(&self) -> usize {
        self.base.reload_count()
    }
}

impl Default for ZVertexFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for ZVertexFilter {
    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn start_hook(&mut self, banks: &BankList) -> Result<()> {
        self.pids = self.base.option_set("pids", NodePath::new())?;
        if self.base.option_scalar_or("strict_run_ranges", NodePath::new(), 0_i64) != 0 {
            self.base
                .config()?
                .validate_run_ranges(&NodePath::from(Self::CLASS_NAME), CUTS_QUERY.container_key, CUTS_QUERY.range_key)?;
        }
        self.particle_index = self.base.bank_index(banks, PARTICLE_BANK)?;
        self.config_index = self.base.bank_index(banks, CONFIG_BANK)?;
        self.zcuts = Some(self.base.concurrent_param()?);
        Ok(())
    }

    fn run_hook(&self, banks: &mut BankList) -> Result<bool> {
        let run_number = self.base.bank(banks, self.config_index, CONFIG_BANK)?.get_int("run", 0)?;
        let key = self.prepare_event(run_number)?;

        let particles = self.base.bank_mut(banks, self.particle_index, PARTICLE_BANK)?;
        particles.filter(|bank, row| {
            let vz = bank.get_float("vz", row)?;
            let pid = bank.get_int("pid", row)?;
            let status = bank.get_int("status", row)?;
            let accept = self.filter(vz, pid, status, key)?;
            trace!(algorithm = %self.base.name(), vz, pid, status, accept, "filter");
            Ok(accept)
        })?;
        Ok(particles.num_active() > 0)
    }
}
