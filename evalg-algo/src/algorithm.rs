//! Algorithm trait and shared per-instance state
//!
//! Every algorithm embeds an `AlgorithmBase` holding its name, options,
//! configuration reader and reload gate. The trait's provided `start`, `run`
//! and `stop` enforce the one-way lifecycle `Unstarted -> Started -> Stopped`
//! and call the algorithm's hooks in between.
//!
//! Option precedence, highest first:
//! 1. values set with `set_option` (or cached by an earlier lookup)
//! 2. the user override file (`config_file` option)
//! 3. the override directory (`config_dir` option), which shadows the
//!    default file on the search path
//! 4. the built-in default file under the installation prefix

use crate::CONFIG_INSTALL_PREFIX;
use evalg_common::bank::find_bank;
use evalg_common::config::{config_file_for_algorithm, expand_tilde, ConfigReader, NodePath, PathSegment, SearchPath};
use evalg_common::{
    Bank, BankList, ConcurrencyKey, ConcurrencyModel, ConcurrentParam, ConfigValue, Error, OptionSet,
    OptionValue, ReloadGate, Result, ScalarValue,
};
use std::any::Any;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Option naming a user override configuration file
pub const CONFIG_FILE_OPTION: &str = "config_file";

/// Option naming a user override configuration directory
pub const CONFIG_DIR_OPTION: &str = "config_dir";

/// Position in the algorithm lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unstarted,
    Started,
    Stopped,
}

/// Downcasting support for boxed algorithms
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// State shared by every algorithm
#[derive(Debug)]
pub struct AlgorithmBase {
    class_name: String,
    name: String,
    options: OptionSet,
    config: Option<ConfigReader>,
    default_config_file: Option<String>,
    install_prefix: PathBuf,
    search_directories: Vec<PathBuf>,
    model: ConcurrencyModel,
    gate: Option<ReloadGate>,
    state: LifecycleState,
}

impl AlgorithmBase {
    /// Base for class `class_name`, named after its class, with no default file
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            name: class_name.clone(),
            class_name,
            options: OptionSet::new(),
            config: None,
            default_config_file: None,
            install_prefix: PathBuf::from(CONFIG_INSTALL_PREFIX),
            search_directories: Vec::new(),
            model: ConcurrencyModel::default(),
            gate: None,
            state: LifecycleState::Unstarted,
        }
    }

    /// Use the conventional default configuration file for this class
    pub fn with_default_config(mut self) -> Self {
        self.default_config_file = Some(config_file_for_algorithm(&self.class_name));
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if let Some(config) = self.config.as_mut() {
            config.set_name(self.name.clone());
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn concurrency_model(&self) -> ConcurrencyModel {
        self.model
    }

    /// Select the concurrency model; only honored before start
    pub fn set_concurrency_model(&mut self, model: ConcurrencyModel) {
        if self.state != LifecycleState::Unstarted {
            warn!(algorithm = %self.name, "concurrency model cannot change after start; keeping {}", self.model);
            return;
        }
        self.model = model;
    }

    /// Replace the installation prefix searched last for configuration files
    pub fn set_install_prefix(&mut self, prefix: impl Into<PathBuf>) {
        self.install_prefix = prefix.into();
    }

    /// Extra configuration directory, ranked below those added earlier
    ///
    /// These sit between the override directory and `EVALG_CONFIG_PATH`.
    pub fn add_search_directory(&mut self, dir: impl Into<PathBuf>) {
        self.search_directories.push(dir.into());
    }

    /// Set an option value; it overrides anything the configuration files say
    pub fn set_option(&mut self, key: &str, value: impl Into<OptionValue>) {
        if self.state != LifecycleState::Unstarted {
            error!(algorithm = %self.name, "option '{}' cannot be set after start; ignoring it", key);
            return;
        }
        self.options.set(key, value);
    }

    /// User override configuration file, searched on the search path
    pub fn set_config_file(&mut self, name: impl Into<String>) {
        self.set_option(CONFIG_FILE_OPTION, name.into());
    }

    /// User override configuration directory, searched before all others
    pub fn set_config_directory(&mut self, dir: impl Into<String>) {
        self.set_option(CONFIG_DIR_OPTION, dir.into());
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Configuration reader; available once started
    pub fn config(&self) -> Result<&ConfigReader> {
        self.config.as_ref().ok_or_else(|| {
            Error::InvalidState(format!("configuration of '{}' is not loaded; start it first", self.name))
        })
    }

    /// Build the configuration reader from the default and override files
    pub fn parse_config(&mut self) -> Result<()> {
        let mut reader = ConfigReader::new(self.name.clone(), SearchPath::from_env(&self.install_prefix));
        for dir in self.search_directories.iter().rev() {
            reader.add_directory(dir);
        }
        let user_dir = self.options.get::<String>(CONFIG_DIR_OPTION);
        let user_file = self.options.get::<String>(CONFIG_FILE_OPTION);
        if let Some(dir) = &user_dir {
            reader.add_directory(expand_tilde(dir));
        }
        if let Some(file) = &self.default_config_file {
            reader.add_file(file)?;
        }
        if let Some(file) = &user_file {
            reader.add_file(file)?;
        }
        reader.load_files()?;
        debug!(
            algorithm = %self.name,
            files = reader.files().len(),
            "configuration parsed"
        );
        self.config = Some(reader);
        Ok(())
    }

    fn option_path(&self, key: &str, path: NodePath) -> NodePath {
        let mut full = path;
        full.push_front(PathSegment::Key(self.class_name.clone()));
        full.join(key)
    }

    fn cache_option<T: ConfigValue>(&mut self, key: &str, value: T) {
        let value = value.into_option();
        debug!(algorithm = %self.name, "cached option {} = {}", key, value);
        self.options.set(key, value);
    }

    fn option_value<T: ConfigValue>(&mut self, key: &str, path: NodePath) -> Result<T> {
        if let Some(value) = self.options.get::<T>(key) {
            return Ok(value);
        }
        let full = self.option_path(key, path);
        let value: T = self.config()?.lookup(&full)?;
        self.cache_option(key, value.clone());
        Ok(value)
    }

    /// Hard scalar option lookup under `[class_name, path.., key]`
    pub fn option_scalar<T: ScalarValue>(&mut self, key: &str, path: impl Into<NodePath>) -> Result<T> {
        self.option_value(key, path.into())
    }

    /// Hard array option lookup
    pub fn option_vector<T: ScalarValue>(&mut self, key: &str, path: impl Into<NodePath>) -> Result<Vec<T>> {
        self.option_value(key, path.into())
    }

    /// Hard array option lookup, ordered and de-duplicated
    pub fn option_set<T: ScalarValue + Ord>(&mut self, key: &str, path: impl Into<NodePath>) -> Result<BTreeSet<T>> {
        Ok(self.option_vector(key, path)?.into_iter().collect())
    }

    /// Soft scalar option lookup; `default` is cached when nothing is found
    pub fn option_scalar_or<T: ScalarValue>(&mut self, key: &str, path: impl Into<NodePath>, default: T) -> T {
        match self.option_value(key, path.into()) {
            Ok(value) => value,
            Err(Error::MissingKey(_)) => {
                self.cache_option(key, default.clone());
                default
            }
            Err(err) => {
                error!(algorithm = %self.name, "option '{}': {}; using default", key, err);
                default
            }
        }
    }

    /// Formatted option value, or `UNKNOWN`
    pub fn print_option_value(&self, key: &str) -> String {
        self.options.print(key)
    }

    /// Position of a required bank; missing banks are fatal
    pub fn bank_index(&self, banks: &BankList, bank_name: &str) -> Result<usize> {
        match find_bank(banks, bank_name) {
            Some(index) => {
                debug!(algorithm = %self.name, "cached index of bank '{}' = {}", bank_name, index);
                Ok(index)
            }
            None => {
                error!(algorithm = %self.name, "required input bank '{}' not found", bank_name);
                Err(self.missing_input(bank_name))
            }
        }
    }

    fn missing_input(&self, bank_name: &str) -> Error {
        Error::MissingInput {
            bank: bank_name.to_string(),
            algorithm: self.name.clone(),
        }
    }

    /// Bank at a cached index, checked by name
    pub fn bank<'a>(&self, banks: &'a BankList, index: usize, bank_name: &str) -> Result<&'a Bank> {
        banks
            .get(index)
            .filter(|bank| bank.name() == bank_name)
            .ok_or_else(|| self.missing_input(bank_name))
    }

    /// Mutable bank at a cached index, checked by name
    pub fn bank_mut<'a>(&self, banks: &'a mut BankList, index: usize, bank_name: &str) -> Result<&'a mut Bank> {
        match banks.get_mut(index) {
            Some(bank) if bank.name() == bank_name => Ok(bank),
            _ => Err(self.missing_input(bank_name)),
        }
    }

    /// Empty run-dependent parameter using this algorithm's model
    pub fn concurrent_param<T: Clone>(&self) -> Result<ConcurrentParam<T>> {
        ConcurrentParam::new(self.model)
    }

    /// Concurrency key for `run_number`, reloading under the algorithm's lock if needed
    pub fn prepare_event<F>(&self, run_number: i64, reload: F) -> Result<ConcurrencyKey>
    where
        F: FnOnce(ConcurrencyKey) -> Result<()>,
    {
        let gate = self.gate.as_ref().ok_or_else(|| {
            Error::InvalidState(format!("algorithm '{}' has no reload gate; start it first", self.name))
        })?;
        gate.prepare_event(run_number, reload)
    }

    /// Reloads performed since start
    pub fn reload_count(&self) -> usize {
        self.gate.as_ref().map_or(0, ReloadGate::reload_count)
    }

    /// Check the state and load configuration ahead of the start hook
    pub fn begin_start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Unstarted {
            return Err(Error::InvalidState(format!(
                "algorithm '{}' cannot start from state {:?}",
                self.name, self.state
            )));
        }
        self.parse_config()?;
        self.gate = Some(ReloadGate::new(self.model)?);
        Ok(())
    }

    pub fn finish_start(&mut self) {
        self.state = LifecycleState::Started;
        info!(algorithm = %self.name, model = %self.model, "started");
    }

    pub fn ensure_started(&self) -> Result<()> {
        if self.state != LifecycleState::Started {
            return Err(Error::InvalidState(format!(
                "algorithm '{}' is {:?}, not started",
                self.name, self.state
            )));
        }
        Ok(())
    }

    pub fn finish_stop(&mut self) {
        self.state = LifecycleState::Stopped;
        info!(algorithm = %self.name, reloads = self.reload_count(), "stopped");
    }
}

/// A unit of per-event computation
///
/// Implementors provide the hooks; callers use `start`, `run` and `stop`.
/// `run` takes `&self` so several threads can process events through one
/// instance; run-dependent state lives in `ConcurrentParam`s.
pub trait Algorithm: AsAny + Send + Sync {
    fn base(&self) -> &AlgorithmBase;
    fn base_mut(&mut self) -> &mut AlgorithmBase;

    /// Resolve options, cache bank indices and create parameters
    fn start_hook(&mut self, banks: &BankList) -> Result<()>;

    /// Process one event; `false` rejects it
    fn run_hook(&self, banks: &mut BankList) -> Result<bool>;

    fn stop_hook(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, banks: &BankList) -> Result<()> {
        self.base_mut().begin_start()?;
        self.start_hook(banks)?;
        self.base_mut().finish_start();
        Ok(())
    }

    fn run(&self, banks: &mut BankList) -> Result<bool> {
        self.base().ensure_started()?;
        self.run_hook(banks)
    }

    fn stop(&mut self) -> Result<()> {
        self.base().ensure_started()?;
        self.stop_hook()?;
        self.base_mut().finish_stop();
        Ok(())
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn class_name(&self) -> &str {
        self.base().class_name()
    }

    fn set_name(&mut self, name: &str) {
        self.base_mut().set_name(name);
    }

    fn set_option(&mut self, key: &str, value: OptionValue) {
        self.base_mut().set_option(key, value);
    }

    fn set_concurrency_model(&mut self, model: ConcurrencyModel) {
        self.base_mut().set_concurrency_model(model);
    }

    /// Whether run-dependent state is held in a single shared slot
    ///
    /// Such an algorithm must only see events from one thread.
    fn is_sequential_only(&self) -> bool {
        self.base().concurrency_model() == ConcurrencyModel::None
    }

    fn set_config_file(&mut self, name: &str) {
        self.base_mut().set_config_file(name);
    }

    fn set_config_directory(&mut self, dir: &str) {
        self.base_mut().set_config_directory(dir);
    }

    fn set_install_prefix(&mut self, prefix: &Path) {
        self.base_mut().set_install_prefix(prefix);
    }

    fn add_search_directory(&mut self, dir: &Path) {
        self.base_mut().add_search_directory(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalg_common::{Cell, Row};
    use std::fs;
    use tempfile::TempDir;

    struct Probe {
        base: AlgorithmBase,
        index: usize,
    }

    impl Probe {
        fn new(prefix: &std::path::Path) -> Self {
            let mut base = AlgorithmBase::new("test::Probe").with_default_config();
            base.set_install_prefix(prefix);
            Self { base, index: 0 }
        }
    }

    impl Algorithm for Probe {
        fn base(&self) -> &AlgorithmBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut AlgorithmBase {
            &mut self.base
        }

        fn start_hook(&mut self, banks: &BankList) -> Result<()> {
            self.index = self.base.bank_index(banks, "TEST::Bank")?;
            Ok(())
        }

        fn run_hook(&self, banks: &mut BankList) -> Result<bool> {
            let bank = self.base.bank(banks, self.index, "TEST::Bank")?;
            Ok(bank.num_rows() > 0)
        }
    }

    fn prefix_with(text: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("algorithms/test/Probe");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("Config.toml"), text).unwrap();
        dir
    }

    fn banks() -> BankList {
        let mut row = Row::new();
        row.insert("x".into(), Cell::Int(1));
        vec![Bank::new("OTHER"), Bank::with_rows("TEST::Bank", vec![row])]
    }

    #[test]
    fn test_lifecycle_is_one_way() {
        let prefix = prefix_with("");
        let mut probe = Probe::new(prefix.path());
        let mut banks = banks();

        assert!(matches!(probe.run(&mut banks), Err(Error::InvalidState(_))));
        probe.start(&banks).unwrap();
        assert_eq!(probe.index, 1);
        assert!(probe.run(&mut banks).unwrap());
        assert!(matches!(probe.start(&banks), Err(Error::InvalidState(_))));
        probe.stop().unwrap();
        assert_eq!(probe.base().state(), LifecycleState::Stopped);
        assert!(probe.run(&mut banks).is_err());
    }

    #[test]
    fn test_missing_input_fails_start() {
        let prefix = prefix_with("");
        let mut probe = Probe::new(prefix.path());
        let err = probe.start(&vec![Bank::new("OTHER")]).unwrap_err();
        assert!(matches!(err, Error::MissingInput { ref bank, .. } if bank == "TEST::Bank"));
    }

    #[test]
    fn test_option_paths_and_caching() {
        let prefix = prefix_with(
            r#"
["test::Probe"]
cut = 1.5
names = ["b", "a", "b"]

["test::Probe".sub]
cut = 9.0
"#,
        );
        let mut probe = Probe::new(prefix.path());
        probe.start(&banks()).unwrap();
        let base = probe.base_mut();

        assert_eq!(base.option_scalar::<f64>("cut", NodePath::new()).unwrap(), 1.5);
        // cached value wins over a different node path
        assert_eq!(base.option_scalar::<f64>("cut", NodePath::from("sub")).unwrap(), 1.5);

        let names: BTreeSet<String> = base.option_set("names", NodePath::new()).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

        assert!(matches!(
            base.option_scalar::<i64>("absent", NodePath::new()),
            Err(Error::MissingKey(_))
        ));
        assert_eq!(base.option_scalar_or("absent", NodePath::new(), 7_i64), 7);
        assert_eq!(base.print_option_value("absent"), "7 [int]");
        assert_eq!(base.print_option_value("never"), "UNKNOWN");
    }

    #[test]
    fn test_explicit_option_wins_over_file() {
        let prefix = prefix_with("[\"test::Probe\"]\ncut = 1.5\n");
        let mut probe = Probe::new(prefix.path());
        probe.base_mut().set_option("cut", 3.0);
        probe.start(&banks()).unwrap();
        assert_eq!(probe.base_mut().option_scalar::<f64>("cut", NodePath::new()).unwrap(), 3.0);
    }

    #[test]
    fn test_mistyped_explicit_option_falls_back_to_file() {
        let prefix = prefix_with("[\"test::Probe\"]\ncut = 1.5\n");
        let mut probe = Probe::new(prefix.path());
        probe.base_mut().set_option("cut", "wide");
        probe.start(&banks()).unwrap();
        assert_eq!(probe.base_mut().option_scalar::<f64>("cut", NodePath::new()).unwrap(), 1.5);
    }

    #[test]
    fn test_options_frozen_after_start() {
        let prefix = prefix_with("");
        let mut probe = Probe::new(prefix.path());
        probe.start(&banks()).unwrap();
        probe.base_mut().set_option("cut", 3.0);
        assert!(!probe.base().options().contains("cut"));
    }

    #[test]
    fn test_missing_default_file_is_fatal() {
        let empty = TempDir::new().unwrap();
        let mut probe = Probe::new(empty.path());
        assert!(matches!(probe.start(&banks()), Err(Error::ConfigFileNotFound(_))));
    }
}
