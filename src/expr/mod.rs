//! Expression evaluation.
//!
//! The expression language has no syntax of its own distinct from its
//! JSON wire form: an operator application is a single-key object, a
//! literal object has any other key count, and arrays are literals whose
//! elements are themselves recursively-evaluated sub-expressions. This
//! module provides the resolver (tree-walking evaluator with an
//! iteration/derived-cycle context) and the fixed operator table.

pub mod operators;
pub mod resolver;

pub use resolver::EvalContext;
