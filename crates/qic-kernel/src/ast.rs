//! Abstract syntax tree for expanded query code.

mod types;

pub use types::*;
