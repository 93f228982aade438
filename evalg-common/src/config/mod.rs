//! Configuration resolution
//!
//! - `search_path`: where configuration files are looked up
//! - `document`: parsed TOML documents and node paths into them
//! - `reader`: per-algorithm resolver with soft/hard and run-range lookups

pub mod document;
pub mod reader;
pub mod search_path;

pub use document::{ConfigDocument, NodePath, PathSegment};
pub use reader::{ConfigReader, RunRangeQuery};
pub use search_path::{config_file_for_algorithm, expand_tilde, SearchPath, CONFIG_PATH_ENV};
