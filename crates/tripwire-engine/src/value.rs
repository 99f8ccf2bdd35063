//! Values that flow through a graph walk
//!
//! A walk threads a [`Variables`] map from node to node. Producers write into
//! it, consumers and interpolation read from it. Anything that can be walked
//! with a dotted path (`player.name`) implements [`StructuredValue`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Coercion target for evaluated values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Keep whatever the evaluation produced
    Any,
    /// Boolean
    Bool,
    /// Double-precision number
    Number,
    /// Text
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// A value that exposes named fields for dotted-path access
///
/// Host event types and structured payloads implement this so interpolation
/// can reach into them without reflection.
pub trait StructuredValue: Send + Sync + fmt::Debug {
    /// Look up a single field by name
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Text rendering used when the whole value is interpolated
    fn to_text(&self) -> String {
        format!("{:?}", self)
    }
}

/// A variable value
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Structured(Arc<dyn StructuredValue>),
}

impl Value {
    /// Wrap a structured value
    pub fn structured(value: impl StructuredValue + 'static) -> Self {
        Self::Structured(Arc::new(value))
    }

    /// The kind this value naturally has
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::Structured(_) => ValueKind::Any,
        }
    }

    /// Numeric view: numbers as-is, text parsed as a float
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Boolean view: booleans as-is, text `true`/`false` (any case)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Look up a field on a structured value
    pub fn get_field(&self, name: &str) -> Option<Value> {
        match self {
            Self::Structured(inner) => inner.get_field(name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Structured(inner) => f.write_str(&inner.to_text()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Structured(inner) => f.debug_tuple("Structured").field(inner).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Structured(a), Self::Structured(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Value {
    /// Convert a JSON value; `null` has no counterpart and maps to `None`
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s)),
            other => Some(Self::Structured(Arc::new(other))),
        }
    }
}

impl StructuredValue for serde_json::Value {
    fn get_field(&self, name: &str) -> Option<Value> {
        let field = match self {
            serde_json::Value::Object(map) => map.get(name),
            serde_json::Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }?;
        Value::from_json(field.clone())
    }

    fn to_text(&self) -> String {
        self.to_string()
    }
}

/// The per-walk variable context
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Value>,
}

impl Variables {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a top-level variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set a top-level variable, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Remove a top-level variable
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Check whether a top-level variable exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve a dotted path
    ///
    /// The first segment is a variable name; every following segment is a
    /// field access on the value found so far. Any missing segment resolves to
    /// `None`.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let path = path.trim();
        let mut segments = path.split('.').map(str::trim);
        let head = segments.next()?;

        let Some(mut current) = self.values.get(head).cloned() else {
            log::debug!("Variable not found: {}", head);
            return None;
        };

        for segment in segments {
            match current.get_field(segment) {
                Some(next) => current = next,
                None => {
                    log::debug!("Field '{}' not found while resolving '{}'", segment, path);
                    return None;
                }
            }
        }

        Some(current)
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
