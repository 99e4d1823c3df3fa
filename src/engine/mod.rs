//! Expression evaluation.
//!
//! A request flows through these stages:
//!
//! 1. [`ParsedEnvironment`]: the JSON document, parsed once and cached by
//!    its raw text.
//! 2. [`fast_path::resolve`]: plain `field` and `outer.inner` lookups that
//!    need no compilation.
//! 3. [`StructuralKey`]: expression plus document shape, the program cache
//!    key.
//! 4. [`CompilationContext`] and [`CompiledProgram`]: declarations inferred
//!    from the document, compiled once per key.
//! 5. [`format::render`]: the canonical string form of the result.
//!
//! [`Evaluator`] ties the stages to the two caches.

pub mod environment;
pub mod extensions;
pub mod fast_path;
pub mod format;
pub mod key;
pub mod pipeline;
pub mod program;

pub use environment::{CelType, CompilationContext, ParsedEnvironment, Profile};
pub use key::{CoarseType, Shape, StructuralKey};
pub use pipeline::{CacheContext, CheckOutcome, Evaluation, Evaluator, Route};
pub use program::CompiledProgram;
