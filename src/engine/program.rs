//! Compiled, reusable programs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use cel_interpreter::{Expression, Value as CelValue};
use cel_parser::Member;

use super::environment::{CompilationContext, ParsedEnvironment, Profile};
use super::extensions::{self, NAMESPACES};
use crate::types::errors::CelError;
use crate::CelResult;

/// Fixed overhead charged for every cached program.
const PROGRAM_BASE_COST: u64 = 512;

/// Additional cost per byte of expression text.
const PROGRAM_COST_PER_BYTE: u64 = 32;

/// Macros whose identifier argument binds a comprehension variable.
const COMPREHENSION_MACROS: &[&str] = &["all", "exists", "exists_one", "map", "filter"];

/// An expression parsed and checked against a compilation context.
///
/// Immutable once built; the pipeline shares it as `Arc<CompiledProgram>`.
pub struct CompiledProgram {
    ast: Expression,
    expression: String,
    profile: Profile,
    variables: Vec<String>,
}

impl CompiledProgram {
    pub(crate) fn compile(expression: &str, context: &CompilationContext) -> CelResult<Self> {
        let ast = cel_parser::parse(expression).map_err(|e| CelError::compile(e.to_string()))?;

        let mut variables = BTreeSet::new();
        free_variables(&ast, &mut Vec::new(), &mut variables);

        let undeclared: Vec<String> = variables
            .iter()
            .filter(|name| !context.is_declared(name))
            .cloned()
            .collect();

        if !undeclared.is_empty() {
            let message = undeclared
                .iter()
                .map(|name| format!("undeclared reference to '{}'", name))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CelError::Compile {
                message,
                undeclared,
            });
        }

        Ok(Self {
            ast,
            expression: expression.to_string(),
            profile: context.profile(),
            variables: variables.into_iter().collect(),
        })
    }

    /// Runs the program with the environment's bindings as the activation.
    ///
    /// Bindings live in a scope over the profile's shared function table,
    /// so a document key shadows a namespace of the same name.
    pub fn execute(&self, environment: &ParsedEnvironment) -> CelResult<CelValue> {
        let mut scope = extensions::root(self.profile).new_inner_scope();
        for (name, value) in environment.bindings() {
            scope.add_variable_from_value(name.clone(), value.clone());
        }

        scope
            .resolve(&self.ast)
            .map_err(|e| CelError::Eval(e.to_string()))
    }

    /// Approximate memory cost used for cache admission.
    pub fn cost(&self) -> u64 {
        PROGRAM_BASE_COST
            + (self.expression.len() as u64).saturating_mul(PROGRAM_COST_PER_BYTE)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Free variables the expression references, sorted.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("expression", &self.expression)
            .field("profile", &self.profile)
            .field("variables", &self.variables)
            .finish()
    }
}

/// Collects identifiers not bound by an enclosing comprehension or
/// `cel.bind`, e.g. `items` but not `x` in `items.all(x, x > 0.0)`.
fn free_variables(expr: &Expression, scope: &mut Vec<Arc<String>>, free: &mut BTreeSet<String>) {
    match expr {
        Expression::Ident(name) => {
            if !scope.contains(name) {
                free.insert(name.to_string());
            }
        }
        Expression::FunctionCall(function, target, args) => {
            let name = match function.as_ref() {
                Expression::Ident(name) => name.as_str(),
                _ => "",
            };
            if let Some(target) = target {
                match target.as_ref() {
                    Expression::Ident(ns)
                        if NAMESPACES.contains(&ns.as_str()) && !scope.contains(ns) => {}
                    target => free_variables(target, scope, free),
                }
            }

            let binding = match (name, target.as_deref(), args.as_slice()) {
                ("bind", Some(Expression::Ident(ns)), [Expression::Ident(var), _, _])
                    if ns.as_str() == "cel" =>
                {
                    Some((0, var, 2))
                }
                (m, Some(_), [Expression::Ident(var), _, ..]) if COMPREHENSION_MACROS.contains(&m) => {
                    Some((0, var, 1))
                }
                (m, None, [_, Expression::Ident(var), _, ..]) if COMPREHENSION_MACROS.contains(&m) => {
                    Some((1, var, 2))
                }
                _ => None,
            };

            match binding {
                Some((var_index, var, body_start)) => {
                    for (i, arg) in args[..body_start].iter().enumerate() {
                        if i != var_index {
                            free_variables(arg, scope, free);
                        }
                    }
                    scope.push(Arc::clone(var));
                    for arg in &args[body_start..] {
                        free_variables(arg, scope, free);
                    }
                    scope.pop();
                }
                None => {
                    for arg in args {
                        free_variables(arg, scope, free);
                    }
                }
            }
        }
        Expression::Member(base, member) => {
            free_variables(base, scope, free);
            match member.as_ref() {
                Member::Attribute(_) => {}
                Member::Index(index) => free_variables(index, scope, free),
                Member::Fields(fields) => {
                    for (_, value) in fields {
                        free_variables(value, scope, free);
                    }
                }
            }
        }
        Expression::Arithmetic(left, _, right)
        | Expression::Relation(left, _, right)
        | Expression::Or(left, right)
        | Expression::And(left, right) => {
            free_variables(left, scope, free);
            free_variables(right, scope, free);
        }
        Expression::Ternary(condition, then, otherwise) => {
            free_variables(condition, scope, free);
            free_variables(then, scope, free);
            free_variables(otherwise, scope, free);
        }
        Expression::Unary(_, operand) => free_variables(operand, scope, free),
        Expression::List(items) => {
            for item in items {
                free_variables(item, scope, free);
            }
        }
        Expression::Map(entries) => {
            for (key, value) in entries {
                free_variables(key, scope, free);
                free_variables(value, scope, free);
            }
        }
        Expression::Atom(_) => {}
    }
}
