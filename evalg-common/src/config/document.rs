//! Parsed configuration documents and node paths

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// One step of a `NodePath`
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Descend into a mapping by key
    Key(String),
    /// Pick an element of a sequence by run range
    ///
    /// The first element whose `range_key` holds `[min, max]` with
    /// `min <= value <= max` wins; otherwise the first element without
    /// `range_key` is the default entry.
    InRange { range_key: String, value: f64 },
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::InRange { range_key, value } => write!(f, "<{} contains {}>", range_key, value),
        }
    }
}

/// Path from a document root to a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

impl NodePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mapping key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append a run-range selector
    pub fn in_range(mut self, range_key: impl Into<String>, value: impl Into<f64>) -> Self {
        self.segments.push(PathSegment::InRange {
            range_key: range_key.into(),
            value: value.into(),
        });
        self
    }

    pub fn push_front(&mut self, segment: PathSegment) {
        self.segments.insert(0, segment);
    }

    /// A copy of this path with `key` appended
    pub fn join(&self, key: &str) -> Self {
        self.clone().key(key)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl From<&str> for NodePath {
    fn from(key: &str) -> Self {
        NodePath::new().key(key)
    }
}

impl<const N: usize> From<[&str; N]> for NodePath {
    fn from(keys: [&str; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl From<Vec<PathSegment>> for NodePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl<'a> FromIterator<&'a str> for NodePath {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(|k| PathSegment::Key(k.to_string())).collect(),
        }
    }
}

/// Read an inclusive `[min, max]` pair from a node
pub(crate) fn range_bounds(node: &toml::Value) -> Option<(f64, f64)> {
    let arr = node.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    let bound = |v: &toml::Value| match v {
        toml::Value::Integer(i) => Some(*i as f64),
        toml::Value::Float(x) => Some(*x),
        _ => None,
    };
    Some((bound(&arr[0])?, bound(&arr[1])?))
}

/// One loaded configuration file, immutable after load
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    source: PathBuf,
    root: toml::Value,
}

impl ConfigDocument {
    /// Parse a document from text
    pub fn parse(source: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let source = source.into();
        let table: toml::Table = text.parse().map_err(|e: toml::de::Error| Error::MalformedDocument {
            path: source.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source,
            root: toml::Value::Table(table),
        })
    }

    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(path, &text)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn root(&self) -> &toml::Value {
        &self.root
    }

    /// Walk `path` from the root
    pub fn node(&self, path: &NodePath) -> Result<&toml::Value> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = match segment {
                PathSegment::Key(key) => node
                    .as_table()
                    .and_then(|t| t.get(key))
                    .ok_or_else(|| Error::MissingKey(path.to_string()))?,
                PathSegment::InRange { range_key, value } => select_in_range(node, range_key, *value)
                    .ok_or_else(|| Error::MissingKey(path.to_string()))?,
            };
        }
        Ok(node)
    }

    pub fn has_node(&self, path: &NodePath) -> bool {
        self.node(path).is_ok()
    }
}

fn select_in_range<'a>(node: &'a toml::Value, range_key: &str, value: f64) -> Option<&'a toml::Value> {
    let entries = node.as_array()?;
    let matched = entries.iter().find(|entry| {
        entry
            .get(range_key)
            .and_then(range_bounds)
            .map(|(min, max)| min <= value && value <= max)
            .unwrap_or(false)
    });
    matched.or_else(|| entries.iter().find(|entry| entry.is_table() && entry.get(range_key).is_none()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"
[tree1]
scalar1 = 1.5

[[tree1.ranged]]
test_range = [1, 5]
val = 3

[[tree1.ranged]]
test_range = [6, 10]
val = 4

[[tree1.ranged]]
val = 0

[[tree2]]
test_range = [1, 5]
val = 7
"#;

    #[test]
    fn test_key_walk() {
        let doc = ConfigDocument::parse("t.toml", TREE).unwrap();
        let node = doc.node(&NodePath::from(["tree1", "scalar1"])).unwrap();
        assert_eq!(node.as_float(), Some(1.5));
    }

    #[test]
    fn test_in_range_selects_first_match_and_default() {
        let doc = ConfigDocument::parse("t.toml", TREE).unwrap();
        let at = |v: f64| {
            let path = NodePath::new().key("tree1").key("ranged").in_range("test_range", v).key("val");
            doc.node(&path).unwrap().as_integer().unwrap()
        };
        assert_eq!(at(1.0), 3);
        assert_eq!(at(5.0), 3);
        assert_eq!(at(3.7), 3);
        assert_eq!(at(6.0), 4);
        assert_eq!(at(10.0), 4);
        assert_eq!(at(10.1), 0);
        assert_eq!(at(11.0), 0);
    }

    #[test]
    fn test_in_range_without_default_fails() {
        let doc = ConfigDocument::parse("t.toml", TREE).unwrap();
        let path = NodePath::new().key("tree2").in_range("test_range", 11).key("val");
        assert!(matches!(doc.node(&path), Err(Error::MissingKey(_))));
    }

    #[test]
    fn test_malformed_document() {
        let err = ConfigDocument::parse("bad.toml", "a = [1, 2").unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
    }

    #[test]
    fn test_node_path_display() {
        let path = NodePath::new().key("a").in_range("runs", 5).key("b");
        assert_eq!(path.to_string(), "a/<runs contains 5>/b");
    }
}
