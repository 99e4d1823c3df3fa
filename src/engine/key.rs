//! Structural cache keys.
//!
//! A compiled program depends on the variables declared when it was
//! compiled, and those come from the shape of the JSON document: its key
//! names and the coarse type of each value. Two documents with the same
//! shape can share a program; documents that differ in any key or any
//! coarse type cannot.

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::environment::ParsedEnvironment;

/// Coarse classification of a top-level JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoarseType {
    String,
    Bool,
    Float,
    Integer,
    List,
    Null,
    /// Nested object, with its sorted child keys.
    Map(Vec<String>),
}

impl CoarseType {
    /// Classifies a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => CoarseType::String,
            Value::Bool(_) => CoarseType::Bool,
            Value::Number(n) if n.is_f64() => CoarseType::Float,
            Value::Number(_) => CoarseType::Integer,
            Value::Array(_) => CoarseType::List,
            Value::Null => CoarseType::Null,
            Value::Object(children) => {
                let mut keys: Vec<String> = children.keys().cloned().collect();
                keys.sort();
                CoarseType::Map(keys)
            }
        }
    }
}

impl fmt::Display for CoarseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoarseType::String => write!(f, "string"),
            CoarseType::Bool => write!(f, "bool"),
            CoarseType::Float => write!(f, "float"),
            CoarseType::Integer => write!(f, "int"),
            CoarseType::List => write!(f, "list"),
            CoarseType::Null => write!(f, "null"),
            CoarseType::Map(keys) => {
                let escaped: Vec<String> = keys.iter().map(|k| quote(k)).collect();
                write!(f, "map{{{}}}", escaped.join(","))
            }
        }
    }
}

/// Canonical signature of a document's shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape(String);

impl Shape {
    /// Computes the signature of a JSON object.
    ///
    /// Tokens are `"name":type`, sorted and joined with `;`. Names are
    /// JSON-escaped so separators inside key names cannot alias.
    pub fn of(document: &Map<String, Value>) -> Self {
        let mut tokens: Vec<String> = document
            .iter()
            .map(|(name, value)| format!("{}:{}", quote(name), CoarseType::of(value)))
            .collect();
        tokens.sort();
        Self(tokens.join(";"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Key under which a compiled program is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuralKey(String);

impl StructuralKey {
    /// Key for an expression evaluated against a parsed document.
    pub fn derive(expression: &str, environment: &ParsedEnvironment) -> Self {
        Self::from_shape(expression, environment.shape())
    }

    /// Key for an expression and an already computed shape.
    ///
    /// The expression is length-prefixed even when the shape is empty, so
    /// no expression text can spell out another request's key.
    pub fn from_shape(expression: &str, shape: &Shape) -> Self {
        Self(format!("{}#{}|{}", expression.len(), expression, shape.as_str()))
    }

    /// Key for the opaque-payload path. No valid expression starts with NUL,
    /// so these never collide with document keys.
    pub fn opaque(expression: &str) -> Self {
        Self(format!("\0opaque\0{expression}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 hex digest of the key, used as the program cache key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for StructuralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn quote(name: &str) -> String {
    serde_json::to_string(name).unwrap_or_else(|_| format!("{name:?}"))
}
