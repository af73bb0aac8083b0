//! Evaluation errors.
//!
//! Each variant renders as a single `Kind: message` line, which is what the
//! front end shows when every evaluation strategy has failed.

use thiserror::Error;

use crate::lexer::LexerError;
use crate::parser::ParseError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("NameError: name '{0}' is not defined")]
    Name(String),
    #[error("TypeError: {0}")]
    Type(String),
    /// Holds the repr of the missing key.
    #[error("KeyError: {0}")]
    Key(String),
    #[error("IndexError: {0}")]
    Index(String),
    #[error("AttributeError: {0}")]
    Attribute(String),
    #[error("ValueError: {0}")]
    Value(String),
    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),
    #[error("ImportError: {0}")]
    Import(String),
    #[error("OverflowError: {0}")]
    Overflow(String),
    #[error("RecursionError: maximum recursion depth exceeded")]
    Recursion,
    #[error("SyntaxError: {0}")]
    Syntax(String),
}

impl EvalError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        EvalError::Type(msg.into())
    }

    pub fn value_error(msg: impl Into<String>) -> Self {
        EvalError::Value(msg.into())
    }

    /// Fold parser errors into one SyntaxError. An integer literal out of
    /// range is an OverflowError instead.
    pub fn from_parse_errors(errors: &[ParseError]) -> Self {
        if errors
            .iter()
            .any(|e| e.lexer == Some(LexerError::IntegerOverflow))
        {
            return EvalError::Overflow("int too large to convert to 64-bit integer".into());
        }
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        EvalError::Syntax(message)
    }
}

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;
