//! Expression binding.
//!
//! The atlas consumes expressions through the [`ExpressionEngine`] seam:
//! compile text once, evaluate the compiled form against an
//! [`ExpressionContext`] many times. Failures never escape as panics; both
//! steps return [`ExpressionError`].
//!
//! ```text
//! text → ExpressionBinding → ExpressionCache (LRU by text) → ExpressionEngine::compile
//!                 ↓
//!        CompiledExpression::evaluate(ExpressionContext) → Value
//! ```
//!
//! [`SimpleExpressionEngine`] is the bundled engine; any other implementation
//! of the trait can be supplied to the atlas instead.

pub mod parser;
pub mod context;
pub mod cache;
pub mod binding;
pub mod simple;

use std::fmt;
use std::sync::Arc;

use crate::types::Value;

pub use context::ExpressionContext;
pub use cache::{ExpressionCache, CacheConfig, CacheStats};
pub use binding::{ExpressionBinding, ExpressionSlot};
pub use simple::SimpleExpressionEngine;

/// Error type for expression compilation and evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// Text could not be parsed.
    #[error("Parse error at {position}: {message}")]
    Parse {
        /// Character offset of the error.
        position: usize,
        /// Description.
        message: String,
    },
    /// Call to a function the engine does not provide.
    #[error("Function {0} not found")]
    UnknownFunction(String),
    /// Function called with the wrong number of arguments.
    #[error("Function {name} expects {expected} arguments, got {got}")]
    Arity {
        /// Function name.
        name: String,
        /// Expected count description.
        expected: String,
        /// Supplied count.
        got: usize,
    },
    /// Field reference not present on the context feature.
    #[error("Field '{0}' not found")]
    UnknownField(String),
    /// Variable not bound in the context.
    #[error("Variable '{0}' not found")]
    UnknownVariable(String),
    /// Field referenced without a feature in the context.
    #[error("No feature available in expression context")]
    NoFeature,
    /// Operand of the wrong type.
    #[error("Type error: {0}")]
    Type(String),
    /// Evaluation failure raised by a function body.
    #[error("Evaluation error: {0}")]
    Eval(String),
}

/// A compiled expression ready for repeated evaluation.
pub trait CompiledExpression: Send + Sync + fmt::Debug {
    /// Evaluate against a context.
    fn evaluate(&self, context: &ExpressionContext<'_>) -> Result<Value, ExpressionError>;

    /// Text this expression was compiled from.
    fn source(&self) -> &str;
}

/// Trait for expression services.
///
/// Implementations must be deterministic: the same text compiles to an
/// expression that yields the same value for the same context.
pub trait ExpressionEngine: Send + Sync {
    /// Compile expression text.
    fn compile(&self, text: &str) -> Result<Arc<dyn CompiledExpression>, ExpressionError>;
}
