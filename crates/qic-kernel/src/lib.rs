//! qic-kernel: query JSON, YAML and XML documents with shorthand expressions.
//!
//! This crate provides:
//!
//! - **Formats**: Decoding and encoding of JSON, YAML and XML documents
//! - **Keys**: The case-insensitive index of every key in a document
//! - **Expand**: Rewriting `a[].b`, `a.{b,c}` and `a.b` shorthand
//! - **Lexer / Parser / AST**: The expression language, via logos and chumsky
//! - **Interpreter**: Sandboxed evaluation with builtins and output helpers
//! - **Strategy / Function**: Choosing how expanded code is run
//! - **Kernel**: A session over one document
//! - **Display**: Filters and encodings applied to results

pub mod ast;
pub mod display;
pub mod expand;
pub mod filter;
pub mod formats;
pub mod function;
pub mod helpers;
pub mod interpreter;
pub mod kernel;
pub mod keys;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod strategy;
pub mod table;
pub mod value;

pub use display::{DisplayConfig, Rendered};
pub use formats::{Format, LoadError};
pub use interpreter::{EvalError, EvalResult};
pub use kernel::{Kernel, KernelConfig};
pub use keys::{KeyIndex, KeyMatch};
pub use report::{Diagnostic, Emission, Level};
pub use value::Value;
