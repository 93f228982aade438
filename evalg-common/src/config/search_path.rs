//! Configuration file search path
//!
//! Lookup order for a file name:
//! 1. the name itself (absolute, or relative to the current directory)
//! 2. directories added with `add_directory`, most recent first
//! 3. directories from `EVALG_CONFIG_PATH`, first entry first
//! 4. the fixed installation prefix
//!
//! Every lookup either finds a file or fails with `ConfigFileNotFound`.

use crate::{Error, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{error, trace};

/// Environment variable holding extra configuration directories
pub const CONFIG_PATH_ENV: &str = "EVALG_CONFIG_PATH";

/// Extension of algorithm configuration files
pub const CONFIG_EXTENSION: &str = "toml";

/// Ordered list of directories searched for configuration files
#[derive(Debug, Clone)]
pub struct SearchPath {
    directories: VecDeque<PathBuf>,
    install_prefix: PathBuf,
}

impl SearchPath {
    /// Search path with only the installation prefix
    pub fn new(install_prefix: impl Into<PathBuf>) -> Self {
        Self {
            directories: VecDeque::new(),
            install_prefix: install_prefix.into(),
        }
    }

    /// Search path with the installation prefix and `EVALG_CONFIG_PATH` entries
    ///
    /// Environment entries rank above the prefix, so a relocated deployment can
    /// point at its own configuration tree.
    pub fn from_env(install_prefix: impl Into<PathBuf>) -> Self {
        let mut search_path = Self::new(install_prefix);
        if let Ok(value) = std::env::var(CONFIG_PATH_ENV) {
            // push in reverse so the first entry ends up highest
            for dir in value.split(':').rev() {
                search_path.add_directory(dir);
            }
        }
        search_path
    }

    /// Push a directory to the front of the search order
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return;
        }
        trace!("add directory {}", dir.display());
        self.directories.push_front(dir.to_path_buf());
    }

    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    /// Directories in search order, installation prefix last
    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.directories
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.install_prefix.as_path()))
    }

    /// Find a file by name without changing any state
    ///
    /// Only regular files match; an empty name never does.
    pub fn find_file(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            error!("cannot search for a configuration file with an empty name");
            return Err(Error::ConfigFileNotFound(String::new()));
        }
        let name = expand_tilde(name);
        trace!("searching for file '{}'", name.display());
        if name.is_file() {
            trace!("  - ./ - FOUND");
            return Ok(name);
        }
        for dir in self.directories() {
            let candidate = dir.join(&name);
            let found = candidate.is_file();
            trace!("  - {}{}", dir.display(), if found { " - FOUND" } else { "" });
            if found {
                return Ok(candidate);
            }
        }
        error!("cannot find configuration file named '{}'", name.display());
        self.log_directories();
        Err(Error::ConfigFileNotFound(name.display().to_string()))
    }

    /// Dump the search order at error level
    pub fn log_directories(&self) {
        error!("configuration file search path order:");
        error!(" - ./");
        for dir in self.directories() {
            error!(" - {}", dir.display());
        }
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(name: &str) -> PathBuf {
    if name == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = name.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(name)
}

/// Default configuration file name for an algorithm class
///
/// `clas12::ZVertexFilter` maps to `algorithms/clas12/ZVertexFilter/Config.toml`.
pub fn config_file_for_algorithm(class_name: &str) -> String {
    format!(
        "algorithms/{}/Config.{}",
        class_name.replace("::", "/"),
        CONFIG_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_for_algorithm() {
        assert_eq!(
            config_file_for_algorithm("clas12::ZVertexFilter"),
            "algorithms/clas12/ZVertexFilter/Config.toml"
        );
        assert_eq!(config_file_for_algorithm("Plain"), "algorithms/Plain/Config.toml");
    }

    #[test]
    fn test_install_prefix_is_last() {
        let mut search_path = SearchPath::new("/prefix");
        search_path.add_directory("/a");
        search_path.add_directory("/b");
        let dirs: Vec<_> = search_path.directories().collect();
        assert_eq!(dirs, vec![Path::new("/b"), Path::new("/a"), Path::new("/prefix")]);
    }

    #[test]
    fn test_empty_directory_ignored() {
        let mut search_path = SearchPath::new("/prefix");
        search_path.add_directory("");
        assert_eq!(search_path.directories().count(), 1);
    }

    #[test]
    fn test_find_file_in_prefix() {
        let prefix = TempDir::new().unwrap();
        fs::write(prefix.path().join("x.toml"), "a = 1").unwrap();
        let search_path = SearchPath::new(prefix.path());
        assert_eq!(search_path.find_file("x.toml").unwrap(), prefix.path().join("x.toml"));
    }

    #[test]
    fn test_find_file_rejects_empty_name_and_directories() {
        let prefix = TempDir::new().unwrap();
        fs::create_dir_all(prefix.path().join("algorithms")).unwrap();
        let search_path = SearchPath::new(prefix.path());
        assert!(matches!(search_path.find_file(""), Err(Error::ConfigFileNotFound(_))));
        assert!(matches!(search_path.find_file("algorithms"), Err(Error::ConfigFileNotFound(_))));
    }

    #[test]
    fn test_find_file_not_found() {
        let prefix = TempDir::new().unwrap();
        let search_path = SearchPath::new(prefix.path());
        let err = search_path.find_file("does-not-exist.toml").unwrap_err();
        assert!(matches!(err, Error::ConfigFileNotFound(_)));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("a/b.toml"), PathBuf::from("a/b.toml"));
    }
}
