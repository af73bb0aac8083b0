//! Interpreter module for qic.
//!
//! This module evaluates the expression language queries are written in,
//! against one decoded document bound to `_`.
//!
//! # Architecture
//!
//! - **Scope**: Variable bindings with nested frames for calls and comprehensions
//! - **eval**: Reduces expressions to values, borrowing through the document
//! - **exec**: Runs statement blocks, loops and function bodies
//! - **builtins / methods**: The callable surface, including the ambient helpers
//!
//! Names that are not bound in scope and are not builtins fall back to the
//! keys of the document root, resolved case-insensitively when unambiguous.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use qic_kernel::interpreter::Interpreter;
//! use qic_kernel::keys::KeyIndex;
//! use qic_kernel::value::Value;
//!
//! let document = Value::from(serde_json::json!({"Name": "qic", "tags": ["a", "b"]}));
//! let keys = Rc::new(KeyIndex::build(&document));
//! let mut interp = Interpreter::new(document, keys);
//!
//! assert_eq!(interp.eval_str("name").unwrap(), Value::from("qic"));
//! assert_eq!(interp.eval_str("len(tags)").unwrap(), Value::Int(2));
//! ```

mod builtins;
mod error;
mod eval;
mod exec;
mod methods;
mod ops;
mod scope;
mod strformat;

pub use builtins::helper_names;
pub use error::{EvalError, EvalResult};
pub use eval::Interpreter;
pub use exec::ControlFlow;
pub use scope::Scope;
