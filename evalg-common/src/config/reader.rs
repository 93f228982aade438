//! Configuration reader
//!
//! One reader per algorithm instance. Files are added by name, resolved on the
//! search path, then parsed together by `load_files`. Lookups never merge
//! documents key by key: the most recently added document that defines the
//! requested node supplies the whole value.

use super::document::{range_bounds, ConfigDocument, NodePath};
use super::search_path::SearchPath;
use crate::option::{ConfigValue, ScalarValue};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace};

/// Keys describing a run-range container
///
/// The container is a sequence of entries; each entry holds `range_key` as
/// `[min, max]` and either `value_key` directly, or a `discriminant_key`
/// table keyed by the discriminant's string form.
#[derive(Debug, Clone, Copy)]
pub struct RunRangeQuery<'a> {
    pub container_key: &'a str,
    pub range_key: &'a str,
    pub discriminant_key: &'a str,
    pub value_key: &'a str,
}

/// Resolves configuration values for one algorithm instance
#[derive(Debug, Clone)]
pub struct ConfigReader {
    name: String,
    search_path: SearchPath,
    files: Vec<PathBuf>,
    documents: Vec<ConfigDocument>,
}

impl ConfigReader {
    /// Create a reader named `name` (used in log output)
    pub fn new(name: impl Into<String>, search_path: SearchPath) -> Self {
        Self {
            name: name.into(),
            search_path,
            files: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Push a directory to the front of the search order
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) {
        self.search_path.add_directory(dir);
    }

    /// Resolve `name` on the search path and remember it for loading
    ///
    /// An empty name is ignored. A name that cannot be found is fatal.
    pub fn add_file(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        let full = self.search_path.find_file(name)?;
        trace!(reader = %self.name, "add file {}", full.display());
        self.files.push(full);
        Ok(())
    }

    /// Resolve `name` without recording it
    pub fn find_file(&self, name: &str) -> Result<PathBuf> {
        self.search_path.find_file(name)
    }

    /// Files added so far, in addition order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Parse every added file
    ///
    /// A malformed file is logged and skipped; lookups then behave as if it
    /// defined nothing. Missing files were already rejected by `add_file`.
    pub fn load_files(&mut self) -> Result<()> {
        self.documents.clear();
        for file in &self.files {
            match ConfigDocument::load(file) {
                Ok(doc) => {
                    debug!(reader = %self.name, "loaded {}", file.display());
                    self.documents.push(doc);
                }
                Err(Error::MalformedDocument { path, message }) => {
                    error!(reader = %self.name, "skipping malformed document {}: {}", path.display(), message);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Add an already-parsed document, ranking above all earlier ones
    pub fn add_document(&mut self, doc: ConfigDocument) {
        self.documents.push(doc);
    }

    pub fn documents(&self) -> &[ConfigDocument] {
        &self.documents
    }

    /// Find the node at `path` in the highest-priority document defining it
    pub fn node(&self, path: &NodePath) -> Result<&toml::Value> {
        self.documents
            .iter()
            .rev()
            .find_map(|doc| doc.node(path).ok())
            .ok_or_else(|| Error::MissingKey(path.to_string()))
    }

    /// Hard lookup of any option type
    pub fn lookup<T: ConfigValue>(&self, path: &NodePath) -> Result<T> {
        let node = self.node(path)?;
        T::from_toml(node).ok_or_else(|| Error::TypeMismatch {
            key: path.to_string(),
            expected: T::TYPE_NAME,
        })
    }

    /// Soft lookup: falls back to `default` when the node is absent or mistyped
    pub fn lookup_or<T: ConfigValue>(&self, path: &NodePath, default: T) -> T {
        match self.lookup(path) {
            Ok(value) => value,
            Err(Error::MissingKey(_)) => default,
            Err(err) => {
                error!(reader = %self.name, "{}; using default", err);
                default
            }
        }
    }

    /// Hard scalar lookup
    pub fn lookup_scalar<T: ScalarValue>(&self, path: &NodePath) -> Result<T> {
        self.lookup(path)
    }

    /// Hard array lookup
    pub fn lookup_array<T: ScalarValue>(&self, path: &NodePath) -> Result<Vec<T>> {
        self.lookup(path)
    }

    /// Value for `run_number` from a run-range container under `base`
    ///
    /// Entries are scanned in document order and the first range containing
    /// the run wins, even if later ranges overlap it. No match yields
    /// `default`, which callers use to mean "no cut".
    pub fn lookup_at_run_range<T: ConfigValue>(
        &self,
        base: &NodePath,
        query: &RunRangeQuery<'_>,
        run_number: i64,
        discriminant: i64,
        default: T,
    ) -> T {
        let container_path = base.join(query.container_key);
        let Ok(container) = self.node(&container_path) else {
            return default;
        };
        let Some(entries) = container.as_array() else {
            error!(reader = %self.name, "'{}' is not a sequence; using default", container_path);
            return default;
        };
        let run = run_number as f64;
        for entry in entries {
            let Some((min, max)) = entry.get(query.range_key).and_then(range_bounds) else {
                continue;
            };
            if run < min || run > max {
                continue;
            }
            let (node, label) = match entry.get(query.discriminant_key) {
                Some(table) => (table.get(discriminant.to_string().as_str()), discriminant.to_string()),
                None => (entry.get(query.value_key), query.value_key.to_string()),
            };
            return match node.map(T::from_toml) {
                Some(Some(value)) => value,
                Some(None) => {
                    error!(
                        reader = %self.name,
                        "'{}' for run {} is not of type {}; using default",
                        label, run_number, T::TYPE_NAME
                    );
                    default
                }
                None => default,
            };
        }
        default
    }

    /// Reject containers whose run ranges overlap
    pub fn validate_run_ranges(&self, base: &NodePath, container_key: &str, range_key: &str) -> Result<()> {
        let container_path = base.join(container_key);
        let Ok(container) = self.node(&container_path) else {
            return Ok(());
        };
        let mut ranges: Vec<(f64, f64)> = container
            .as_array()
            .map(|entries| entries.iter().filter_map(|e| e.get(range_key).and_then(range_bounds)).collect())
            .unwrap_or_default();
        ranges.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in ranges.windows(2) {
            if pair[1].0 <= pair[0].1 {
                error!(
                    reader = %self.name,
                    "run ranges [{}, {}] and [{}, {}] overlap in '{}'",
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1, container_path
                );
                return Err(Error::OverlappingRunRanges(container_path.to_string()));
            }
        }
        Ok(())
    }
}
