//! Integration tests for configuration file lookup and resolution
//!
//! Covers:
//! - search order across added directories and the installation prefix
//! - `EVALG_CONFIG_PATH` ranking
//! - loading, malformed documents, and array round trips
//!
//! Tests that manipulate EVALG_CONFIG_PATH are marked with #[serial]
//! so they run sequentially, not in parallel.

use evalg_common::config::{ConfigDocument, ConfigReader, NodePath, SearchPath, CONFIG_PATH_ENV};
use evalg_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_most_recent_directory_wins() {
    let prefix = TempDir::new().unwrap();
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    write(dir_a.path(), "x.cfg", "source = 'a'");
    write(dir_b.path(), "x.cfg", "source = 'b'");

    let mut search_path = SearchPath::new(prefix.path());
    search_path.add_directory(dir_a.path());
    search_path.add_directory(dir_b.path());

    assert_eq!(search_path.find_file("x.cfg").unwrap(), dir_b.path().join("x.cfg"));
}

#[test]
fn test_added_directory_shadows_install_prefix() {
    let prefix = TempDir::new().unwrap();
    let user = TempDir::new().unwrap();
    write(prefix.path(), "algorithms/a/Config.toml", "v = 1");
    write(user.path(), "algorithms/a/Config.toml", "v = 2");

    let mut search_path = SearchPath::new(prefix.path());
    assert_eq!(
        search_path.find_file("algorithms/a/Config.toml").unwrap(),
        prefix.path().join("algorithms/a/Config.toml")
    );
    search_path.add_directory(user.path());
    assert_eq!(
        search_path.find_file("algorithms/a/Config.toml").unwrap(),
        user.path().join("algorithms/a/Config.toml")
    );
}

#[test]
fn test_literal_path_checked_first() {
    let prefix = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    write(elsewhere.path(), "x.toml", "v = 1");
    let absolute = elsewhere.path().join("x.toml");

    let search_path = SearchPath::new(prefix.path());
    assert_eq!(search_path.find_file(absolute.to_str().unwrap()).unwrap(), absolute);
}

#[test]
fn test_add_file_not_found_is_fatal() {
    let prefix = TempDir::new().unwrap();
    let mut reader = ConfigReader::new("test", SearchPath::new(prefix.path()));
    let err = reader.add_file("missing/Config.toml").unwrap_err();
    assert!(matches!(err, Error::ConfigFileNotFound(_)));
    assert!(reader.files().is_empty());
}

#[test]
fn test_empty_file_name_is_ignored() {
    let prefix = TempDir::new().unwrap();
    let mut reader = ConfigReader::new("test", SearchPath::new(prefix.path()));
    reader.add_file("").unwrap();
    assert!(reader.files().is_empty());
}

#[test]
#[serial]
fn test_env_config_path_ranks_above_prefix() {
    let prefix = TempDir::new().unwrap();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(prefix.path(), "x.toml", "v = 0");
    write(first.path(), "x.toml", "v = 1");
    write(second.path(), "x.toml", "v = 2");

    let value = format!("{}:{}", first.path().display(), second.path().display());
    env::set_var(CONFIG_PATH_ENV, &value);
    let search_path = SearchPath::from_env(prefix.path());
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(search_path.find_file("x.toml").unwrap(), first.path().join("x.toml"));
    let dirs: Vec<_> = search_path.directories().collect();
    assert_eq!(dirs, vec![first.path(), second.path(), prefix.path()]);
}

#[test]
#[serial]
fn test_user_directory_ranks_above_env() {
    let prefix = TempDir::new().unwrap();
    let from_env = TempDir::new().unwrap();
    let user = TempDir::new().unwrap();
    write(from_env.path(), "x.toml", "v = 1");
    write(user.path(), "x.toml", "v = 2");

    env::set_var(CONFIG_PATH_ENV, from_env.path());
    let mut search_path = SearchPath::from_env(prefix.path());
    env::remove_var(CONFIG_PATH_ENV);
    search_path.add_directory(user.path());

    assert_eq!(search_path.find_file("x.toml").unwrap(), user.path().join("x.toml"));
}

#[test]
#[serial]
fn test_no_env_means_prefix_only() {
    env::remove_var(CONFIG_PATH_ENV);
    let prefix = TempDir::new().unwrap();
    let search_path = SearchPath::from_env(prefix.path());
    assert_eq!(search_path.directories().count(), 1);
}

#[test]
fn test_array_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let mut table = toml::Table::new();
    let mut algo = toml::Table::new();
    algo.insert(
        "values".to_string(),
        toml::Value::Array(vec![1.into(), 2.into(), 3.into()]),
    );
    table.insert("algo".to_string(), toml::Value::Table(algo));
    write(dir.path(), "round.toml", &toml::to_string(&table).unwrap());

    let mut reader = ConfigReader::new("test", SearchPath::new(dir.path()));
    reader.add_file("round.toml").unwrap();
    reader.load_files().unwrap();

    let values: Vec<i64> = reader.lookup_array(&NodePath::from(["algo", "values"])).unwrap();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_malformed_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "good.toml", "[algo]\nv = 4\n");
    write(dir.path(), "bad.toml", "[algo\nv = ");

    let mut reader = ConfigReader::new("test", SearchPath::new(dir.path()));
    reader.add_file("good.toml").unwrap();
    reader.add_file("bad.toml").unwrap();
    reader.load_files().unwrap();

    assert_eq!(reader.documents().len(), 1);
    let path = NodePath::from(["algo", "v"]);
    assert_eq!(reader.lookup_scalar::<i64>(&path).unwrap(), 4);
    assert_eq!(reader.lookup_or(&NodePath::from(["algo", "w"]), 9_i64), 9);
}

#[test]
fn test_override_file_beats_default_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "default.toml", "[algo]\ncut = 1.0\nother = 5\n");
    write(dir.path(), "override.toml", "[algo]\ncut = 2.0\n");

    let mut reader = ConfigReader::new("test", SearchPath::new(dir.path()));
    reader.add_file("default.toml").unwrap();
    reader.add_file("override.toml").unwrap();
    reader.load_files().unwrap();

    assert_eq!(reader.lookup_scalar::<f64>(&NodePath::from(["algo", "cut"])).unwrap(), 2.0);
    assert_eq!(reader.lookup_scalar::<i64>(&NodePath::from(["algo", "other"])).unwrap(), 5);
}

#[test]
fn test_document_source_recorded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.toml", "v = 1");
    let doc = ConfigDocument::load(&dir.path().join("a.toml")).unwrap();
    assert_eq!(doc.source(), dir.path().join("a.toml"));
}
