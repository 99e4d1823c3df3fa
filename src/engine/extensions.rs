//! Versioned extension library installed into every evaluation context.
//!
//! The engine's built-ins (`size`, `contains`, `startsWith`, `endsWith`,
//! `matches`, `has`, `map`, `filter`, `all`, `exists`, `exists_one`, `max`,
//! `min` and the conversions) are always present. This module layers the
//! string, math, list, set, encoder, local-binding and optional-value
//! libraries on top.
//!
//! Namespaced functions such as `math.greatest` or `cel.bind` are ordinary
//! method calls whose receiver is a marker value bound under the namespace
//! name. A namespaced function only runs when its receiver is that marker,
//! so `[1].greatest()` is an error rather than a silent alias.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cel_interpreter::extractors::{Arguments, This};
use cel_interpreter::functions;
use cel_interpreter::{Context, ExecutionError, Expression, FunctionContext, ResolveResult, Value};

use super::environment::Profile;

/// Bumped whenever a function is added, removed or changes behaviour.
pub const EXTENSIONS_VERSION: u32 = 2;

/// Names bound to namespace markers in every context.
pub const NAMESPACES: &[&str] = &["base64", "cel", "lists", "math", "optional", "sets", "strings"];

/// `(library, call form)` pairs installed by [`install`].
pub const EXTENSION_FUNCTIONS: &[(&str, &str)] = &[
    ("strings", "charAt"),
    ("strings", "indexOf"),
    ("strings", "lastIndexOf"),
    ("strings", "lowerAscii"),
    ("strings", "upperAscii"),
    ("strings", "replace"),
    ("strings", "split"),
    ("strings", "substring"),
    ("strings", "trim"),
    ("strings", "join"),
    ("strings", "reverse"),
    ("strings", "strings.quote"),
    ("math", "math.greatest"),
    ("math", "math.least"),
    ("math", "math.abs"),
    ("math", "math.ceil"),
    ("math", "math.floor"),
    ("math", "math.round"),
    ("math", "math.trunc"),
    ("math", "math.sign"),
    ("math", "math.isNaN"),
    ("math", "math.isInf"),
    ("math", "math.isFinite"),
    ("lists", "distinct"),
    ("lists", "flatten"),
    ("lists", "reverse"),
    ("lists", "slice"),
    ("lists", "sort"),
    ("lists", "lists.range"),
    ("sets", "sets.contains"),
    ("sets", "sets.equivalent"),
    ("sets", "sets.intersects"),
    ("encoders", "base64.encode"),
    ("encoders", "base64.decode"),
    ("bindings", "cel.bind"),
    ("optional", "optional.of"),
    ("optional", "optional.ofNonZeroValue"),
    ("optional", "optional.none"),
    ("optional", "hasValue"),
    ("optional", "value"),
    ("optional", "orValue"),
    ("optional", "or"),
];

/// Type tag carried by optional values.
const OPTIONAL_TYPE: &str = "optional_type";

/// Shared root context for a profile, built on first use.
///
/// Holds the function table and the namespace markers; callers evaluate in
/// an inner scope so nothing they bind leaks into the root.
pub fn root(profile: Profile) -> &'static Context<'static> {
    static DOCUMENT: OnceLock<Context<'static>> = OnceLock::new();
    static PAYLOAD: OnceLock<Context<'static>> = OnceLock::new();

    let cell = match profile {
        Profile::Document => &DOCUMENT,
        Profile::Payload => &PAYLOAD,
    };
    cell.get_or_init(|| {
        let mut context = Context::default();
        install(&mut context, profile);
        tracing::debug!(?profile, version = EXTENSIONS_VERSION, "Extension context built");
        context
    })
}

/// Registers the extension set, plus the payload helpers for
/// [`Profile::Payload`].
pub fn install(context: &mut Context<'_>, profile: Profile) {
    for namespace in NAMESPACES {
        context.add_variable_from_value(*namespace, marker(namespace));
    }

    context.add_function("charAt", char_at);
    context.add_function("indexOf", index_of);
    context.add_function("lastIndexOf", last_index_of);
    context.add_function("lowerAscii", lower_ascii);
    context.add_function("upperAscii", upper_ascii);
    context.add_function("replace", replace);
    context.add_function("split", split);
    context.add_function("substring", substring);
    context.add_function("trim", trim);
    context.add_function("join", join);
    context.add_function("reverse", reverse);
    context.add_function("quote", quote);

    context.add_function("greatest", greatest);
    context.add_function("least", least);
    context.add_function("abs", abs);
    context.add_function("ceil", ceil);
    context.add_function("floor", floor);
    context.add_function("round", round);
    context.add_function("trunc", trunc);
    context.add_function("sign", sign);
    context.add_function("isNaN", is_nan);
    context.add_function("isInf", is_inf);
    context.add_function("isFinite", is_finite);

    context.add_function("distinct", distinct);
    context.add_function("flatten", flatten);
    context.add_function("slice", slice);
    context.add_function("sort", sort);
    context.add_function("range", range);

    // Replaces the built-in; plain receivers are delegated back to it.
    context.add_function("contains", contains);
    context.add_function("equivalent", equivalent);
    context.add_function("intersects", intersects);

    context.add_function("encode", base64_encode);
    context.add_function("decode", base64_decode);

    context.add_function("bind", bind);

    context.add_function("of", optional_of);
    context.add_function("ofNonZeroValue", optional_of_non_zero);
    context.add_function("none", optional_none);
    context.add_function("hasValue", has_value);
    context.add_function("value", optional_value);
    context.add_function("orValue", or_value);
    context.add_function("or", optional_or);

    if profile == Profile::Payload {
        context.add_function("len", payload_len);
    }
}

/// Contents of an optional value: `Some(Some(v))` when present,
/// `Some(None)` for `optional.none()`, `None` for anything else.
pub fn as_optional(value: &Value) -> Option<Option<&Value>> {
    match value {
        Value::Function(name, inner) if name.as_str() == OPTIONAL_TYPE => Some(inner.as_deref()),
        _ => None,
    }
}

fn marker(namespace: &str) -> Value {
    Value::Function(Arc::new(namespace.to_string()), None)
}

fn is_marker(value: Option<&Value>, namespace: &str) -> bool {
    matches!(value, Some(Value::Function(name, None)) if name.as_str() == namespace)
}

fn optional(value: Option<Value>) -> Value {
    Value::Function(Arc::new(OPTIONAL_TYPE.to_string()), value.map(Box::new))
}

// ═══════════════════════════════════════════════════════════════════════════
// Argument helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Resolved arguments of a call that must be made as `namespace.name(...)`.
fn namespaced_args(ftx: &FunctionContext, namespace: &str) -> Result<Vec<Value>, ExecutionError> {
    if !is_marker(ftx.this.as_ref(), namespace) {
        return Err(ftx.error(format!("must be called as {}.{}", namespace, ftx.name)));
    }
    ftx.args.iter().map(|arg| ftx.ptx.resolve(arg)).collect()
}

fn namespaced<const N: usize>(
    ftx: &FunctionContext,
    namespace: &str,
) -> Result<[Value; N], ExecutionError> {
    let args = namespaced_args(ftx, namespace)?;
    let count = args.len();
    <[Value; N]>::try_from(args).map_err(|_| ExecutionError::invalid_argument_count(N, count))
}

fn string_arg(function: &str, value: &Value) -> Result<Arc<String>, ExecutionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ExecutionError::function_error(
            function,
            format!("expected string, found {:?}", other),
        )),
    }
}

fn list_arg(function: &str, value: &Value) -> Result<Arc<Vec<Value>>, ExecutionError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(ExecutionError::function_error(
            function,
            format!("expected list, found {:?}", other),
        )),
    }
}

fn index_arg(function: &str, value: &Value) -> Result<usize, ExecutionError> {
    let index = match value {
        Value::Int(i) => *i,
        Value::UInt(u) => i64::try_from(*u).unwrap_or(i64::MAX),
        Value::Float(f) if f.fract() == 0.0 => *f as i64,
        other => {
            return Err(ExecutionError::function_error(
                function,
                format!("expected integer index, found {:?}", other),
            ))
        }
    };
    usize::try_from(index)
        .map_err(|_| ExecutionError::function_error(function, "index must not be negative"))
}

fn number_arg(function: &str, value: &Value) -> Result<f64, ExecutionError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        Value::Float(f) => Ok(*f),
        other => Err(ExecutionError::function_error(
            function,
            format!("expected number, found {:?}", other),
        )),
    }
}

fn string_value(s: String) -> Value {
    Value::String(Arc::new(s))
}

fn char_index(haystack: &str, byte_index: usize) -> i64 {
    haystack[..byte_index].chars().count() as i64
}

// ═══════════════════════════════════════════════════════════════════════════
// strings
// ═══════════════════════════════════════════════════════════════════════════

fn lower_ascii(This(this): This<Value>) -> ResolveResult {
    Ok(string_value(string_arg("lowerAscii", &this)?.to_ascii_lowercase()))
}

fn upper_ascii(This(this): This<Value>) -> ResolveResult {
    Ok(string_value(string_arg("upperAscii", &this)?.to_ascii_uppercase()))
}

fn trim(This(this): This<Value>) -> ResolveResult {
    Ok(string_value(string_arg("trim", &this)?.trim().to_string()))
}

fn replace(This(this): This<Value>, from: Value, to: Value) -> ResolveResult {
    let s = string_arg("replace", &this)?;
    let from = string_arg("replace", &from)?;
    let to = string_arg("replace", &to)?;
    Ok(string_value(s.replace(from.as_str(), to.as_str())))
}

fn split(This(this): This<Value>, separator: Value) -> ResolveResult {
    let s = string_arg("split", &this)?;
    let separator = string_arg("split", &separator)?;
    let parts = s
        .split(separator.as_str())
        .map(|part| string_value(part.to_string()))
        .collect();
    Ok(Value::List(Arc::new(parts)))
}

fn index_of(This(this): This<Value>, needle: Value) -> ResolveResult {
    let s = string_arg("indexOf", &this)?;
    let needle = string_arg("indexOf", &needle)?;
    Ok(Value::Int(
        s.find(needle.as_str()).map(|i| char_index(&s, i)).unwrap_or(-1),
    ))
}

fn last_index_of(This(this): This<Value>, needle: Value) -> ResolveResult {
    let s = string_arg("lastIndexOf", &this)?;
    let needle = string_arg("lastIndexOf", &needle)?;
    Ok(Value::Int(
        s.rfind(needle.as_str()).map(|i| char_index(&s, i)).unwrap_or(-1),
    ))
}

fn char_at(This(this): This<Value>, index: Value) -> ResolveResult {
    let s = string_arg("charAt", &this)?;
    let index = index_arg("charAt", &index)?;
    let count = s.chars().count();
    if index > count {
        return Err(ExecutionError::function_error(
            "charAt",
            format!("index {} out of range for length {}", index, count),
        ));
    }
    Ok(string_value(
        s.chars().nth(index).map(String::from).unwrap_or_default(),
    ))
}

fn substring(This(this): This<Value>, start: Value, end: Value) -> ResolveResult {
    let s = string_arg("substring", &this)?;
    let start = index_arg("substring", &start)?;
    let end = index_arg("substring", &end)?;
    let count = s.chars().count();
    if start > end || end > count {
        return Err(ExecutionError::function_error(
            "substring",
            format!("range {}..{} out of bounds for length {}", start, end, count),
        ));
    }
    Ok(string_value(s.chars().skip(start).take(end - start).collect()))
}

fn join(This(this): This<Value>, separator: Value) -> ResolveResult {
    let items = list_arg("join", &this)?;
    let separator = string_arg("join", &separator)?;
    let parts = items
        .iter()
        .map(|item| string_arg("join", item).map(|s| s.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(string_value(parts.join(separator.as_str())))
}

/// Reverses a string by characters, or a list by elements.
fn reverse(This(this): This<Value>) -> ResolveResult {
    match this {
        Value::String(s) => Ok(string_value(s.chars().rev().collect())),
        Value::List(items) => Ok(Value::List(Arc::new(items.iter().rev().cloned().collect()))),
        other => Err(ExecutionError::function_error(
            "reverse",
            format!("expected string or list, found {:?}", other),
        )),
    }
}

/// `strings.quote(s)`: the string as a double-quoted, escaped literal.
fn quote(ftx: &FunctionContext) -> ResolveResult {
    let [value] = namespaced(ftx, "strings")?;
    let s = string_arg("strings.quote", &value)?;

    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{7}' => quoted.push_str("\\a"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{b}' => quoted.push_str("\\v"),
            '\u{c}' => quoted.push_str("\\f"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    Ok(string_value(quoted))
}

// ═══════════════════════════════════════════════════════════════════════════
// math
// ═══════════════════════════════════════════════════════════════════════════

fn extreme(function: &str, args: Vec<Value>, pick_greater: bool) -> ResolveResult {
    let candidates: Vec<Value> = match args.as_slice() {
        [Value::List(items)] => items.as_ref().clone(),
        _ => args,
    };

    let mut best: Option<(f64, Value)> = None;
    for candidate in candidates {
        let n = number_arg(function, &candidate)?;
        let replace = match &best {
            None => true,
            Some((current, _)) if pick_greater => n > *current,
            Some((current, _)) => n < *current,
        };
        if replace {
            best = Some((n, candidate));
        }
    }

    best.map(|(_, value)| value)
        .ok_or_else(|| ExecutionError::function_error(function, "requires at least one argument"))
}

fn greatest(ftx: &FunctionContext) -> ResolveResult {
    extreme("math.greatest", namespaced_args(ftx, "math")?, true)
}

fn least(ftx: &FunctionContext) -> ResolveResult {
    extreme("math.least", namespaced_args(ftx, "math")?, false)
}

fn abs(ftx: &FunctionContext) -> ResolveResult {
    match namespaced(ftx, "math")? {
        [Value::Int(i)] => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ftx.error("integer overflow")),
        [Value::UInt(u)] => Ok(Value::UInt(u)),
        [Value::Float(f)] => Ok(Value::Float(f.abs())),
        [other] => Err(ftx.error(format!("expected number, found {:?}", other))),
    }
}

fn rounding(ftx: &FunctionContext, op: fn(f64) -> f64) -> ResolveResult {
    match namespaced(ftx, "math")? {
        [Value::Float(f)] => Ok(Value::Float(op(f))),
        [value @ (Value::Int(_) | Value::UInt(_))] => Ok(value),
        [other] => Err(ftx.error(format!("expected number, found {:?}", other))),
    }
}

fn ceil(ftx: &FunctionContext) -> ResolveResult {
    rounding(ftx, f64::ceil)
}

fn floor(ftx: &FunctionContext) -> ResolveResult {
    rounding(ftx, f64::floor)
}

/// Rounds half away from zero.
fn round(ftx: &FunctionContext) -> ResolveResult {
    rounding(ftx, f64::round)
}

fn trunc(ftx: &FunctionContext) -> ResolveResult {
    rounding(ftx, f64::trunc)
}

fn sign(ftx: &FunctionContext) -> ResolveResult {
    match namespaced(ftx, "math")? {
        [Value::Int(i)] => Ok(Value::Int(i.signum())),
        [Value::UInt(u)] => Ok(Value::UInt(u64::from(u > 0))),
        [Value::Float(f)] if f == 0.0 || f.is_nan() => Ok(Value::Float(f)),
        [Value::Float(f)] => Ok(Value::Float(f.signum())),
        [other] => Err(ftx.error(format!("expected number, found {:?}", other))),
    }
}

fn float_test(ftx: &FunctionContext, test: fn(f64) -> bool) -> ResolveResult {
    let [value] = namespaced(ftx, "math")?;
    let n = number_arg(ftx.name.as_str(), &value)?;
    Ok(Value::Bool(test(n)))
}

fn is_nan(ftx: &FunctionContext) -> ResolveResult {
    float_test(ftx, f64::is_nan)
}

fn is_inf(ftx: &FunctionContext) -> ResolveResult {
    float_test(ftx, f64::is_infinite)
}

fn is_finite(ftx: &FunctionContext) -> ResolveResult {
    float_test(ftx, f64::is_finite)
}

// ═══════════════════════════════════════════════════════════════════════════
// lists
// ═══════════════════════════════════════════════════════════════════════════

/// Flattens one level, or `depth` levels when given.
fn flatten(ftx: &FunctionContext, This(this): This<Value>) -> ResolveResult {
    let items = list_arg("flatten", &this)?;
    let depth = match ftx.args.get(ftx.arg_idx) {
        Some(expr) => index_arg("flatten", &ftx.ptx.resolve(expr)?)?,
        None => 1,
    };
    Ok(Value::List(Arc::new(flatten_list(&items, depth))))
}

fn flatten_list(items: &[Value], depth: usize) -> Vec<Value> {
    let mut flat = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::List(inner) if depth > 0 => flat.extend(flatten_list(inner, depth - 1)),
            other => flat.push(other.clone()),
        }
    }
    flat
}

fn distinct(This(this): This<Value>) -> ResolveResult {
    let items = list_arg("distinct", &this)?;
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items.iter() {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    Ok(Value::List(Arc::new(unique)))
}

fn slice(This(this): This<Value>, start: Value, end: Value) -> ResolveResult {
    let items = list_arg("slice", &this)?;
    let start = index_arg("slice", &start)?;
    let end = index_arg("slice", &end)?;
    if start > end || end > items.len() {
        return Err(ExecutionError::function_error(
            "slice",
            format!("range {}..{} out of bounds for length {}", start, end, items.len()),
        ));
    }
    Ok(Value::List(Arc::new(items[start..end].to_vec())))
}

/// Sorts a list of mutually comparable values in ascending order.
fn sort(This(this): This<Value>) -> ResolveResult {
    let items = list_arg("sort", &this)?;
    let mut sorted = items.as_ref().clone();

    let mut incomparable = None;
    sorted.sort_by(|a, b| {
        a.partial_cmp(b).unwrap_or_else(|| {
            incomparable.get_or_insert_with(|| (a.clone(), b.clone()));
            Ordering::Equal
        })
    });

    match incomparable {
        Some((a, b)) => Err(ExecutionError::function_error(
            "sort",
            format!("{:?} cannot be compared to {:?}", a, b),
        )),
        None => Ok(Value::List(Arc::new(sorted))),
    }
}

/// `lists.range(n)`: the integers `0..n`.
fn range(ftx: &FunctionContext) -> ResolveResult {
    let [count] = namespaced(ftx, "lists")?;
    let count = index_arg("lists.range", &count)?;
    let values = (0..count).map(|i| Value::Int(i as i64)).collect();
    Ok(Value::List(Arc::new(values)))
}

// ═══════════════════════════════════════════════════════════════════════════
// sets
// ═══════════════════════════════════════════════════════════════════════════

fn set_pair(ftx: &FunctionContext) -> Result<(Arc<Vec<Value>>, Arc<Vec<Value>>), ExecutionError> {
    let [left, right] = namespaced(ftx, "sets")?;
    let name = ftx.name.as_str();
    Ok((list_arg(name, &left)?, list_arg(name, &right)?))
}

fn is_subset(subset: &[Value], of: &[Value]) -> bool {
    subset.iter().all(|v| of.contains(v))
}

/// `sets.contains(list, sublist)`, or the built-in `contains` for any
/// other receiver.
fn contains(ftx: &FunctionContext) -> ResolveResult {
    if is_marker(ftx.this.as_ref(), "sets") {
        let (list, sublist) = set_pair(ftx)?;
        return Ok(Value::Bool(is_subset(&sublist, &list)));
    }

    let mut args = ftx
        .args
        .iter()
        .map(|arg| ftx.ptx.resolve(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let (this, arg) = match (&ftx.this, args.len()) {
        (Some(this), 1) => (this.clone(), args.remove(0)),
        (None, 2) => {
            let arg = args.remove(1);
            (args.remove(0), arg)
        }
        (Some(_), count) => return Err(ExecutionError::invalid_argument_count(1, count)),
        (None, count) => return Err(ExecutionError::invalid_argument_count(2, count)),
    };
    functions::contains(This(this), arg)
}

fn equivalent(ftx: &FunctionContext) -> ResolveResult {
    let (left, right) = set_pair(ftx)?;
    Ok(Value::Bool(is_subset(&left, &right) && is_subset(&right, &left)))
}

fn intersects(ftx: &FunctionContext) -> ResolveResult {
    let (left, right) = set_pair(ftx)?;
    Ok(Value::Bool(left.iter().any(|v| right.contains(v))))
}

// ═══════════════════════════════════════════════════════════════════════════
// encoders
// ═══════════════════════════════════════════════════════════════════════════

fn base64_encode(ftx: &FunctionContext) -> ResolveResult {
    let encoded = match namespaced(ftx, "base64")? {
        [Value::Bytes(b)] => STANDARD.encode(b.as_slice()),
        [Value::String(s)] => STANDARD.encode(s.as_bytes()),
        [other] => {
            return Err(ftx.error(format!("expected bytes or string, found {:?}", other)));
        }
    };
    Ok(string_value(encoded))
}

fn base64_decode(ftx: &FunctionContext) -> ResolveResult {
    let [value] = namespaced(ftx, "base64")?;
    let s = string_arg("base64.decode", &value)?;
    STANDARD
        .decode(s.as_bytes())
        .map(|bytes| Value::Bytes(Arc::new(bytes)))
        .map_err(|e| ftx.error(e))
}

// ═══════════════════════════════════════════════════════════════════════════
// local bindings
// ═══════════════════════════════════════════════════════════════════════════

/// `cel.bind(name, init, body)`: evaluates `body` with `name` bound to the
/// value of `init`, in a scope that ends with the call.
fn bind(ftx: &FunctionContext) -> ResolveResult {
    if !is_marker(ftx.this.as_ref(), "cel") {
        return Err(ftx.error("must be called as cel.bind"));
    }
    let [name, init, body] = ftx.args.as_slice() else {
        return Err(ExecutionError::invalid_argument_count(3, ftx.args.len()));
    };
    let Expression::Ident(name) = name else {
        return Err(ftx.error("the first argument must be an identifier"));
    };

    let value = ftx.ptx.resolve(init)?;
    let mut scope = ftx.ptx.new_inner_scope();
    scope.add_variable_from_value(name.as_str(), value);
    scope.resolve(body)
}

// ═══════════════════════════════════════════════════════════════════════════
// optional values
// ═══════════════════════════════════════════════════════════════════════════

fn optional_arg(function: &str, value: &Value) -> Result<Option<Value>, ExecutionError> {
    as_optional(value)
        .map(|inner| inner.cloned())
        .ok_or_else(|| {
            ExecutionError::function_error(function, format!("expected optional, found {:?}", value))
        })
}

fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Int(i) => *i == 0,
        Value::UInt(u) => *u == 0,
        Value::Float(f) => *f == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Bytes(b) => b.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.map.is_empty(),
        _ => false,
    }
}

fn optional_of(ftx: &FunctionContext) -> ResolveResult {
    let [value] = namespaced(ftx, "optional")?;
    Ok(optional(Some(value)))
}

fn optional_of_non_zero(ftx: &FunctionContext) -> ResolveResult {
    let [value] = namespaced(ftx, "optional")?;
    Ok(optional((!is_zero_value(&value)).then_some(value)))
}

fn optional_none(ftx: &FunctionContext) -> ResolveResult {
    let [] = namespaced(ftx, "optional")?;
    Ok(optional(None))
}

fn has_value(This(this): This<Value>) -> ResolveResult {
    Ok(Value::Bool(optional_arg("hasValue", &this)?.is_some()))
}

fn optional_value(This(this): This<Value>) -> ResolveResult {
    optional_arg("value", &this)?
        .ok_or_else(|| ExecutionError::function_error("value", "optional.none() has no value"))
}

fn or_value(This(this): This<Value>, default: Value) -> ResolveResult {
    Ok(optional_arg("orValue", &this)?.unwrap_or(default))
}

fn optional_or(This(this): This<Value>, other: Value) -> ResolveResult {
    match optional_arg("or", &this)? {
        Some(_) => Ok(this),
        None => optional_arg("or", &other).map(|_| other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// payload helpers
// ═══════════════════════════════════════════════════════════════════════════

fn payload_len(Arguments(args): Arguments) -> ResolveResult {
    match args.as_slice() {
        [value] => Ok(Value::Int(string_arg("len", value)?.len() as i64)),
        other => Err(ExecutionError::invalid_argument_count(1, other.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str) -> ResolveResult {
        let ast = cel_parser::parse(expression).unwrap();
        root(Profile::Document).new_inner_scope().resolve(&ast)
    }

    fn s(text: &str) -> Value {
        string_value(text.to_string())
    }

    fn ints(items: &[i64]) -> Value {
        Value::List(Arc::new(items.iter().copied().map(Value::Int).collect()))
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(eval("'abc'.upperAscii()").unwrap(), s("ABC"));
        assert_eq!(eval("'  x '.trim()").unwrap(), s("x"));
        assert_eq!(eval("'a-b-c'.replace('-', '+')").unwrap(), s("a+b+c"));
        assert_eq!(eval("'héllo'.indexOf('l')").unwrap(), Value::Int(2));
        assert_eq!(eval("'abc'.indexOf('z')").unwrap(), Value::Int(-1));
        assert_eq!(eval("'hello'.substring(1, 3)").unwrap(), s("el"));
        assert!(eval("'hi'.substring(1, 5)").is_err());
        assert_eq!(eval("['a', 'b'].join(',')").unwrap(), s("a,b"));
        assert_eq!(eval("'abc'.reverse()").unwrap(), s("cba"));
        assert_eq!(eval(r#"strings.quote('say "hi"')"#).unwrap(), s(r#""say \"hi\"""#));
    }

    #[test]
    fn test_math_namespace() {
        assert_eq!(eval("math.greatest(1, 2)").unwrap(), Value::Int(2));
        assert_eq!(eval("math.greatest(3, 7.5, -1)").unwrap(), Value::Float(7.5));
        assert_eq!(eval("math.least([3, -1])").unwrap(), Value::Int(-1));
        assert_eq!(eval("math.abs(-4)").unwrap(), Value::Int(4));
        assert_eq!(eval("math.floor(2.7)").unwrap(), Value::Float(2.0));
        assert_eq!(eval("math.round(2.5)").unwrap(), Value::Float(3.0));
        assert_eq!(eval("math.trunc(-2.7)").unwrap(), Value::Float(-2.0));
        assert_eq!(eval("math.sign(-3.5)").unwrap(), Value::Float(-1.0));
        assert_eq!(eval("math.isFinite(1.0)").unwrap(), Value::Bool(true));
        assert!(eval("math.abs('x')").is_err());
        assert!(eval("math.greatest()").is_err());
    }

    #[test]
    fn test_namespaced_functions_require_marker() {
        assert!(eval("[1, 2].greatest()").is_err());
        assert!(eval("greatest(1, 2)").is_err());
        assert!(eval("'aGk='.decode()").is_err());
    }

    #[test]
    fn test_list_helpers() {
        assert_eq!(eval("[[1], 2].flatten()").unwrap(), ints(&[1, 2]));
        assert_eq!(eval("[[1, [2]], 3].flatten(2)").unwrap(), ints(&[1, 2, 3]));
        assert_eq!(eval("[1, 1, 2].distinct()").unwrap(), ints(&[1, 2]));
        assert_eq!(eval("[3, 1, 2].sort()").unwrap(), ints(&[1, 2, 3]));
        assert_eq!(eval("[1, 2, 3].reverse()").unwrap(), ints(&[3, 2, 1]));
        assert_eq!(eval("[1, 2, 3].slice(1, 3)").unwrap(), ints(&[2, 3]));
        assert_eq!(eval("lists.range(3)").unwrap(), ints(&[0, 1, 2]));
        assert!(eval("[1, 'a'].sort()").is_err());
    }

    #[test]
    fn test_set_helpers() {
        assert_eq!(eval("sets.contains([1, 2, 3], [1, 3])").unwrap(), Value::Bool(true));
        assert_eq!(eval("sets.contains([1, 2], [4])").unwrap(), Value::Bool(false));
        assert_eq!(eval("sets.equivalent([1, 2], [2, 1, 1])").unwrap(), Value::Bool(true));
        assert_eq!(eval("sets.intersects([1, 2], [9])").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_builtin_contains_still_works() {
        assert_eq!(eval("[1, 2].contains(2)").unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc'.contains('b')").unwrap(), Value::Bool(true));
        assert_eq!(eval("{'a': 1}.contains('a')").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_base64() {
        assert_eq!(eval("base64.encode(b'hello')").unwrap(), s("aGVsbG8="));
        assert_eq!(
            eval("base64.decode('aGVsbG8=')").unwrap(),
            Value::Bytes(Arc::new(b"hello".to_vec()))
        );
        assert!(eval("base64.decode('%%%')").is_err());
    }

    #[test]
    fn test_local_binding() {
        assert_eq!(eval("cel.bind(x, 1, x + 1)").unwrap(), Value::Int(2));
        assert_eq!(
            eval("cel.bind(a, 'x', cel.bind(b, a + 'y', b + a))").unwrap(),
            s("xyx")
        );
        assert!(eval("cel.bind(x, 1)").is_err());
        assert!(eval("cel.bind('x', 1, 2)").is_err());
    }

    #[test]
    fn test_optional_values() {
        assert_eq!(eval("optional.of(1).value()").unwrap(), Value::Int(1));
        assert_eq!(eval("optional.none().hasValue()").unwrap(), Value::Bool(false));
        assert_eq!(eval("optional.none().orValue(5)").unwrap(), Value::Int(5));
        assert_eq!(eval("optional.ofNonZeroValue('').hasValue()").unwrap(), Value::Bool(false));
        assert_eq!(
            eval("optional.none().or(optional.of(2)).value()").unwrap(),
            Value::Int(2)
        );
        assert!(eval("optional.none().value()").is_err());
        assert!(eval("'x'.hasValue()").is_err());
    }

    #[test]
    fn test_payload_len() {
        let ast = cel_parser::parse("len('four')").unwrap();
        let value = root(Profile::Payload).new_inner_scope().resolve(&ast).unwrap();
        assert_eq!(value, Value::Int(4));
        assert!(eval("len('four')").is_err());
    }

    #[test]
    fn test_function_table() {
        assert_eq!(EXTENSION_FUNCTIONS.len(), 42);
        assert_eq!(EXTENSIONS_VERSION, 2);
        assert!(EXTENSION_FUNCTIONS.iter().any(|(_, name)| *name == "cel.bind"));
    }
}
