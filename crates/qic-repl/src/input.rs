//! Line input helpers: word completion and arrow-key residue detection.

use std::sync::LazyLock;

use regex::Regex;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

static ARROW_RESIDUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\x1b|\^\[)(?:\[|O)[ABCD]$").expect("arrow pattern is valid"));

/// Whether an accepted line ends in an arrow-key escape sequence that the
/// line editor did not consume, as happens on terminals without editing.
pub fn is_arrow_residue(line: &str) -> bool {
    ARROW_RESIDUE.is_match(line)
}

/// Tab completion over a fixed word list.
#[derive(Debug, Clone, Default)]
pub struct WordCompleter {
    words: Vec<String>,
}

impl WordCompleter {
    /// Words are sorted and de-duplicated.
    pub fn new(words: impl IntoIterator<Item = String>) -> Self {
        let mut words: Vec<String> = words.into_iter().collect();
        words.sort();
        words.dedup();
        Self { words }
    }

    /// Start of the word ending at `pos`, and the words it may complete to.
    pub fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<&str>) {
        let head = &line[..pos];
        let start = head
            .char_indices()
            .rev()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
            .map_or(0, |(i, c)| i + c.len_utf8());
        let prefix = &head[start..];
        if prefix.is_empty() {
            return (start, Vec::new());
        }
        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(prefix))
            .map(String::as_str)
            .collect();
        (start, matches)
    }
}

impl Completer for WordCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, matches) = self.candidates(line, pos);
        let pairs = matches
            .into_iter()
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w.to_string(),
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for WordCompleter {
    type Hint = String;
}

impl Highlighter for WordCompleter {}

impl Validator for WordCompleter {}

impl Helper for WordCompleter {}
