//! Parsed JSON environments and the compilation contexts built from them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map as CelMap};
use cel_interpreter::Value as CelValue;
use serde_json::{json, Map, Value};

use super::key::Shape;
use super::program::CompiledProgram;
use crate::types::errors::CelError;
use crate::CelResult;

/// Parsed documents are charged this many cost units per raw byte.
pub const DOCUMENT_COST_FACTOR: u64 = 4;

/// Variable name the opaque payload is bound to.
pub const PAYLOAD_VARIABLE: &str = "data";

/// Words the CEL grammar reserves; none of them can name a variable.
const RESERVED_WORDS: &[&str] = &[
    "as", "break", "const", "continue", "else", "false", "for", "function", "if", "import", "in",
    "let", "loop", "package", "namespace", "null", "return", "true", "var", "void", "while",
];

/// Semantic type declared for a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CelType {
    String,
    Bool,
    Double,
    List(Box<CelType>),
    Map(Box<CelType>, Box<CelType>),
    Dyn,
}

impl CelType {
    /// Infers the declared type of a bound value. Every number is a double.
    pub fn infer(value: &CelValue) -> Self {
        match value {
            CelValue::String(_) => CelType::String,
            CelValue::Bool(_) => CelType::Bool,
            CelValue::Float(_) | CelValue::Int(_) | CelValue::UInt(_) => CelType::Double,
            CelValue::List(_) => CelType::List(Box::new(CelType::Dyn)),
            CelValue::Map(_) => CelType::Map(Box::new(CelType::String), Box::new(CelType::Dyn)),
            _ => CelType::Dyn,
        }
    }
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelType::String => write!(f, "string"),
            CelType::Bool => write!(f, "bool"),
            CelType::Double => write!(f, "double"),
            CelType::List(elem) => write!(f, "list({})", elem),
            CelType::Map(key, value) => write!(f, "map({}, {})", key, value),
            CelType::Dyn => write!(f, "dyn"),
        }
    }
}

/// Which helper functions a context installs beyond the extension set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Variables come from a JSON document.
    Document,
    /// A single opaque string payload plus the `len` helper.
    Payload,
}

/// A JSON object parsed once and shared read-only between callers.
#[derive(Debug, Clone, Default)]
pub struct ParsedEnvironment {
    bindings: HashMap<String, CelValue>,
    shape: Shape,
    byte_len: usize,
}

impl ParsedEnvironment {
    /// Environment with no variables.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses raw JSON text. The top level must be an object.
    pub fn parse(raw: &str) -> CelResult<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| CelError::JsonParse(e.to_string()))?;

        match value {
            Value::Object(document) => {
                let mut environment = Self::from_document(&document);
                environment.byte_len = raw.len();
                Ok(environment)
            }
            other => Err(CelError::JsonParse(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Builds an environment from an already parsed object.
    pub fn from_document(document: &Map<String, Value>) -> Self {
        let bindings = document
            .iter()
            .map(|(name, value)| (name.clone(), to_cel_value(value)))
            .collect();

        Self {
            bindings,
            shape: Shape::of(document),
            byte_len: 0,
        }
    }

    /// Binds an opaque payload string to [`PAYLOAD_VARIABLE`].
    pub fn payload(data: &str) -> Self {
        let mut bindings = HashMap::with_capacity(1);
        bindings.insert(
            PAYLOAD_VARIABLE.to_string(),
            CelValue::String(Arc::new(data.to_string())),
        );
        Self {
            bindings,
            shape: Shape::default(),
            byte_len: data.len(),
        }
    }

    /// Representative variables used to validate expressions ahead of use.
    pub fn representative() -> Self {
        let document = json!({
            "name": "test",
            "age": 25.0,
            "verified": true,
            "price": 99.99,
            "items": [1, 2, 3],
            "user": {
                "name": "user",
                "role": "admin"
            }
        });
        match document {
            Value::Object(map) => Self::from_document(&map),
            _ => Self::empty(),
        }
    }

    /// Value bound to a top-level key.
    pub fn get(&self, name: &str) -> Option<&CelValue> {
        self.bindings.get(name)
    }

    /// All top-level bindings.
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &CelValue)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Structural signature of the source document.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Approximate memory cost, never zero.
    pub fn cost(&self) -> u64 {
        (self.byte_len as u64)
            .saturating_mul(DOCUMENT_COST_FACTOR)
            .max(1)
    }
}

/// Converts a JSON value into a CEL value. Numbers always become doubles.
pub fn to_cel_value(value: &Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(*b),
        Value::Number(n) => CelValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => CelValue::String(Arc::new(s.clone())),
        Value::Array(items) => CelValue::List(Arc::new(items.iter().map(to_cel_value).collect())),
        Value::Object(fields) => {
            let map: HashMap<Key, CelValue> = fields
                .iter()
                .map(|(k, v)| (Key::String(Arc::new(k.clone())), to_cel_value(v)))
                .collect();
            CelValue::Map(CelMap { map: Arc::new(map) })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True when `name` can be written as a bare CEL identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_reserved(name)
}

fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Variable declarations plus the extension set, ready to compile against.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    declarations: BTreeMap<String, CelType>,
    profile: Profile,
}

impl CompilationContext {
    /// Context with the extension set and no variables.
    pub fn base() -> Self {
        Self {
            declarations: BTreeMap::new(),
            profile: Profile::Document,
        }
    }

    /// Declares one variable per top-level key of the environment.
    pub fn build(environment: &ParsedEnvironment) -> CelResult<Self> {
        let mut declarations = BTreeMap::new();

        for (name, value) in environment.bindings() {
            if is_reserved(name) {
                return Err(CelError::EnvironmentBuild(format!(
                    "'{}' is a reserved word and cannot be declared as a variable",
                    name
                )));
            }
            if !is_identifier(name) {
                tracing::debug!(key = %name, "Skipping key that is not a valid identifier");
                continue;
            }
            declarations.insert(name.clone(), CelType::infer(value));
        }

        Ok(Self {
            declarations,
            profile: Profile::Document,
        })
    }

    /// Context for the opaque-payload path.
    pub fn opaque() -> Self {
        let mut declarations = BTreeMap::new();
        declarations.insert(PAYLOAD_VARIABLE.to_string(), CelType::String);
        Self {
            declarations,
            profile: Profile::Payload,
        }
    }

    /// Declared type of a variable.
    pub fn declaration(&self, name: &str) -> Option<&CelType> {
        self.declarations.get(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    /// Declared variables, sorted by name.
    pub fn declarations(&self) -> impl Iterator<Item = (&String, &CelType)> {
        self.declarations.iter()
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Parses and checks an expression against this context.
    pub fn compile(&self, expression: &str) -> CelResult<CompiledProgram> {
        CompiledProgram::compile(expression, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let env = ParsedEnvironment::parse(r#"{"name": "Jane", "age": 30}"#).unwrap();
        assert_eq!(env.len(), 2);
        assert!(matches!(env.get("age"), Some(CelValue::Float(f)) if *f == 30.0));
        assert!(env.cost() > 0);
    }

    #[test]
    fn test_parse_rejects_malformed_and_non_objects() {
        let err = ParsedEnvironment::parse("{not json").unwrap_err();
        assert!(matches!(err, CelError::JsonParse(_)));

        let err = ParsedEnvironment::parse("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("expected a JSON object, found array"));
    }

    #[test]
    fn test_infers_declared_types() {
        let env = ParsedEnvironment::parse(
            r#"{"s": "x", "b": true, "n": 1, "f": 1.5, "l": [1], "m": {"k": 1}, "z": null}"#,
        )
        .unwrap();
        let ctx = CompilationContext::build(&env).unwrap();

        assert_eq!(ctx.declaration("s"), Some(&CelType::String));
        assert_eq!(ctx.declaration("b"), Some(&CelType::Bool));
        assert_eq!(ctx.declaration("n"), Some(&CelType::Double));
        assert_eq!(ctx.declaration("f"), Some(&CelType::Double));
        assert_eq!(ctx.declaration("l").map(|t| t.to_string()), Some("list(dyn)".into()));
        assert_eq!(
            ctx.declaration("m").map(|t| t.to_string()),
            Some("map(string, dyn)".into())
        );
        assert_eq!(ctx.declaration("z"), Some(&CelType::Dyn));
    }

    #[test]
    fn test_non_identifier_keys_are_skipped() {
        let env = ParsedEnvironment::parse(r#"{"first-name": "a", "ok": 1}"#).unwrap();
        let ctx = CompilationContext::build(&env).unwrap();
        assert!(!ctx.is_declared("first-name"));
        assert!(ctx.is_declared("ok"));
    }

    #[test]
    fn test_reserved_key_fails_build() {
        let env = ParsedEnvironment::parse(r#"{"in": 1}"#).unwrap();
        let err = CompilationContext::build(&env).unwrap_err();
        assert_eq!(err.kind(), "environment_build");
    }

    #[test]
    fn test_payload_environment() {
        let env = ParsedEnvironment::payload("hello");
        assert!(matches!(env.get(PAYLOAD_VARIABLE), Some(CelValue::String(s)) if s.as_str() == "hello"));
        assert_eq!(CompilationContext::opaque().profile(), Profile::Payload);
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("user_name"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("null"));
    }
}
