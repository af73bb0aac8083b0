//! What one turn produces, in order: diagnostics, printed text and results.
//!
//! Diagnostics are the `# ...` lines written to stderr. They are separate
//! from `tracing`, which is for developers and filtered by `RUST_LOG`.

use crate::value::Value;

/// Severity of a user-facing diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Plain,
    Notice,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub text: String,
}

/// One item of turn output.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Diagnostic(Diagnostic),
    /// Text written by `print` and other helpers.
    Print(String),
    /// A value to hand to the display collaborator.
    Result(Value),
}

/// Collects emissions, dropping debug lines above the configured verbosity.
#[derive(Debug, Clone, Default)]
pub struct Report {
    verbosity: u8,
    emissions: Vec<Emission>,
}

impl Report {
    pub fn new(verbosity: u8) -> Self {
        Self {
            verbosity,
            emissions: Vec::new(),
        }
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn diagnostic(&mut self, level: Level, text: impl Into<String>) {
        self.emissions.push(Emission::Diagnostic(Diagnostic {
            level,
            text: text.into(),
        }));
    }

    /// A diagnostic shown only at `-X` repeated at least `min` times.
    pub fn debug(&mut self, min: u8, level: Level, text: impl Into<String>) {
        if self.verbosity >= min {
            self.diagnostic(level, text);
        }
    }

    pub fn print(&mut self, text: String) {
        if !text.is_empty() {
            self.emissions.push(Emission::Print(text));
        }
    }

    pub fn result(&mut self, value: Value) {
        self.emissions.push(Emission::Result(value));
    }

    pub fn emissions(&self) -> &[Emission] {
        &self.emissions
    }

    pub fn take(&mut self) -> Vec<Emission> {
        std::mem::take(&mut self.emissions)
    }
}
