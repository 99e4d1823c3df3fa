//! Direct lookup for trivial field-access expressions.

use std::sync::Arc;

use cel_interpreter::objects::Key;
use cel_interpreter::Value as CelValue;

use super::environment::ParsedEnvironment;
use super::format::render;

/// Resolves a top-level key or a single `outer.inner` step without
/// compiling anything.
///
/// Key names are matched verbatim, so keys that are not valid identifiers
/// (`first-name`) are still reachable. Returns `None` whenever the path does
/// not exist, so the caller falls through to compilation.
pub fn resolve(expression: &str, environment: &ParsedEnvironment) -> Option<String> {
    let expression = expression.trim();
    if expression.is_empty() || environment.is_empty() {
        return None;
    }

    if let Some(value) = environment.get(expression) {
        return Some(render(value));
    }

    if expression.chars().any(char::is_whitespace) {
        return None;
    }

    let (outer, inner) = expression.split_once('.')?;
    if inner.contains('.') {
        return None;
    }

    match environment.get(outer)? {
        CelValue::Map(map) => map
            .map
            .get(&Key::String(Arc::new(inner.to_string())))
            .map(render),
        _ => None,
    }
}
