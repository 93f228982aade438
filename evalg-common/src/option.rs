//! Algorithm option values
//!
//! Options form a closed set of scalar and array types. User-set values and
//! values resolved from configuration documents share one cache per algorithm
//! instance, keyed by option name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::error;

/// A single option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntVec(Vec<i64>),
    FloatVec(Vec<f64>),
    StrVec(Vec<String>),
}

impl OptionValue {
    /// Type name used in log output
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Int(_) => "int",
            OptionValue::Float(_) => "double",
            OptionValue::Str(_) => "string",
            OptionValue::IntVec(_) => "vector<int>",
            OptionValue::FloatVec(_) => "vector<double>",
            OptionValue::StrVec(_) => "vector<string>",
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{} [{}]", v, self.type_name()),
            OptionValue::Float(v) => write!(f, "{} [{}]", v, self.type_name()),
            OptionValue::Str(v) => write!(f, "{:?} [{}]", v, self.type_name()),
            OptionValue::IntVec(v) => write!(f, "({}) [{}]", join(v), self.type_name()),
            OptionValue::FloatVec(v) => write!(f, "({}) [{}]", join(v), self.type_name()),
            OptionValue::StrVec(v) => {
                let quoted: Vec<String> = v.iter().map(|s| format!("{:?}", s)).collect();
                write!(f, "({}) [{}]", quoted.join(", "), self.type_name())
            }
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl From<Vec<i64>> for OptionValue {
    fn from(v: Vec<i64>) -> Self {
        OptionValue::IntVec(v)
    }
}

impl From<Vec<f64>> for OptionValue {
    fn from(v: Vec<f64>) -> Self {
        OptionValue::FloatVec(v)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(v: Vec<String>) -> Self {
        OptionValue::StrVec(v)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(v: Vec<&str>) -> Self {
        OptionValue::StrVec(v.into_iter().map(String::from).collect())
    }
}

/// A type that can be read from a configuration node and stored as an option
pub trait ConfigValue: Sized + Clone {
    /// Type name used in errors and log output
    const TYPE_NAME: &'static str;

    /// Convert a document node, `None` on type mismatch
    fn from_toml(value: &toml::Value) -> Option<Self>;

    /// Extract from an option value, `None` on type mismatch
    fn from_option(value: &OptionValue) -> Option<Self>;

    fn into_option(self) -> OptionValue;
}

/// Scalar option types; vectors of these are also `ConfigValue`s
pub trait ScalarValue: ConfigValue {
    fn vec_from_option(value: &OptionValue) -> Option<Vec<Self>>;
    fn vec_into_option(values: Vec<Self>) -> OptionValue;
    const VEC_TYPE_NAME: &'static str;
}

impl ConfigValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_toml(value: &toml::Value) -> Option<Self> {
        value.as_integer()
    }

    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn into_option(self) -> OptionValue {
        OptionValue::Int(self)
    }
}

impl ConfigValue for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::Float(v) => Some(*v),
            toml::Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn into_option(self) -> OptionValue {
        OptionValue::Float(self)
    }
}

impl ConfigValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_toml(value: &toml::Value) -> Option<Self> {
        value.as_str().map(String::from)
    }

    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn into_option(self) -> OptionValue {
        OptionValue::Str(self)
    }
}

impl ScalarValue for i64 {
    const VEC_TYPE_NAME: &'static str = "vector<int>";

    fn vec_from_option(value: &OptionValue) -> Option<Vec<Self>> {
        match value {
            OptionValue::IntVec(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn vec_into_option(values: Vec<Self>) -> OptionValue {
        OptionValue::IntVec(values)
    }
}

impl ScalarValue for f64 {
    const VEC_TYPE_NAME: &'static str = "vector<double>";

    fn vec_from_option(value: &OptionValue) -> Option<Vec<Self>> {
        match value {
            OptionValue::FloatVec(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn vec_into_option(values: Vec<Self>) -> OptionValue {
        OptionValue::FloatVec(values)
    }
}

impl ScalarValue for String {
    const VEC_TYPE_NAME: &'static str = "vector<string>";

    fn vec_from_option(value: &OptionValue) -> Option<Vec<Self>> {
        match value {
            OptionValue::StrVec(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn vec_into_option(values: Vec<Self>) -> OptionValue {
        OptionValue::StrVec(values)
    }
}

impl<T: ScalarValue> ConfigValue for Vec<T> {
    const TYPE_NAME: &'static str = T::VEC_TYPE_NAME;

    fn from_toml(value: &toml::Value) -> Option<Self> {
        value.as_array()?.iter().map(T::from_toml).collect()
    }

    fn from_option(value: &OptionValue) -> Option<Self> {
        T::vec_from_option(value)
    }

    fn into_option(self) -> OptionValue {
        T::vec_into_option(self)
    }
}

/// Per-instance option cache
///
/// Holds both user-set values and values resolved from configuration.
/// Once a key is present, its value is what every later lookup sees.
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    values: HashMap<String, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn set(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Typed access to a cached value
    ///
    /// A value of the wrong type is reported and ignored, so the caller falls
    /// through to the configuration documents.
    pub fn get<T: ConfigValue>(&self, key: &str) -> Option<T> {
        if key.is_empty() {
            return None;
        }
        let value = self.values.get(key)?;
        match T::from_option(value) {
            Some(v) => Some(v),
            None => {
                error!(
                    "option '{}' is set to {}, which is not of type {}; ignoring it",
                    key, value, T::TYPE_NAME
                );
                None
            }
        }
    }

    /// Formatted value for log output
    pub fn print(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(value) => value.to_string(),
            None => "UNKNOWN".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
