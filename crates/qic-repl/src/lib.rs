//! qic REPL: interactive queries against one loaded document.
//!
//! Each accepted line is either a meta-command handled here or a query
//! handed to the kernel:
//!
//! - `quit()`, `\q`: exit
//! - `dotkey` / `nodotkey` / `no dotkey`: toggle dot-path resolution
//! - `\hist`, `\history`: list history
//! - `\r N`, `\N`: re-run history entry N
//! - `!cmd`: run a shell command
//! - `'''`: start or end a multi-line block
//!
//! Queries mentioning `return` are compiled as functions. Everything else
//! is recorded in history and run through expansion and evaluation.

pub mod format;
pub mod history;
pub mod input;

use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;

use qic_kernel::display::DisplayConfig;
use qic_kernel::function::mentions_return;
use qic_kernel::helpers::run_shell;
use qic_kernel::interpreter::helper_names;
use qic_kernel::kernel::prepare_query;
use qic_kernel::{Kernel, Level};

use crate::format::Console;
use crate::history::History;
use crate::input::{WordCompleter, is_arrow_residue};

/// Prompt shown before each line.
pub const PROMPT: &str = "[qic] $ ";

/// Opens and closes a multi-line block.
pub const BLOCK_DELIMITER: &str = "'''";

const EOF_MESSAGE: &str = "# IO Error. Pipeline input is not supported in interactive mode, pls use (-f).";

static SHELL_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!\s*(\S.*)").expect("shell escape pattern is valid"));
static BACK_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\(?:r )?(\d+)").expect("back-reference pattern is valid"));

/// Where the session is between lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Prompting,
    /// Inside a `'''` block, holding the lines so far.
    BlockCapture(Vec<String>),
}

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// REPL state around one kernel.
pub struct Repl {
    kernel: Kernel,
    display: DisplayConfig,
    history: History,
    state: SessionState,
    dot_resolution: bool,
}

impl Repl {
    pub fn new(kernel: Kernel, display: DisplayConfig) -> Self {
        Self {
            kernel,
            display,
            history: History::new(),
            state: SessionState::Prompting,
            dot_resolution: true,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn dot_resolution(&self) -> bool {
        self.dot_resolution
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Document keys in every spelling, helper names and `_`.
    pub fn completion_words(&self) -> Vec<String> {
        let mut words: Vec<String> = Vec::new();
        for (lowered, spellings) in self.kernel.keys().iter() {
            words.push(lowered.to_string());
            words.extend(spellings.iter().cloned());
        }
        words.extend(helper_names().map(str::to_string));
        words.push("_".to_string());
        words
    }

    /// Process one input line.
    pub fn process_line(&mut self, line: &str, console: &mut dyn Console) -> Flow {
        if let SessionState::BlockCapture(lines) = &mut self.state {
            if !line.starts_with(BLOCK_DELIMITER) {
                lines.push(line.to_string());
                return Flow::Continue;
            }
            let block = std::mem::take(lines).join("\n");
            self.state = SessionState::Prompting;
            return self.dispatch(&block, console);
        }

        if line.trim().is_empty() {
            return Flow::Continue;
        }
        if line.starts_with(BLOCK_DELIMITER) {
            self.state = SessionState::BlockCapture(Vec::new());
            return Flow::Continue;
        }
        let line = prepare_query(line);
        self.dispatch(&line, console)
    }

    fn dispatch(&mut self, text: &str, console: &mut dyn Console) -> Flow {
        let text = if is_arrow_residue(text) { "\\hist" } else { text };
        let command = text.trim();

        match command {
            "quit()" | "\\q" => return Flow::Exit,
            "dotkey" => {
                self.dot_resolution = true;
                return Flow::Continue;
            }
            "nodotkey" | "no dotkey" => {
                self.dot_resolution = false;
                return Flow::Continue;
            }
            "\\hist" | "\\history" => {
                self.show_history(console);
                return Flow::Continue;
            }
            _ => {}
        }

        if let Some(caps) = SHELL_ESCAPE.captures(command) {
            shell_escape(&caps[1], console);
            return Flow::Continue;
        }

        let mut from_history = false;
        let mut query = text.to_string();
        if let Some(caps) = BACK_REFERENCE.captures(command) {
            let entry = caps[1].parse::<usize>().ok().and_then(|i| self.history.get(i));
            match entry {
                Some(entry) => {
                    query = entry.to_string();
                    from_history = true;
                }
                None => {
                    console.diagnostic(Level::Warning, &format!("# history index {} is out of range.", &caps[1]));
                    return Flow::Continue;
                }
            }
        }

        if mentions_return(&query) {
            self.kernel.run_function(&query, self.dot_resolution);
        } else if query.trim_start().starts_with('\\') {
            console.diagnostic(Level::Warning, "# command not recognized.");
            return Flow::Continue;
        } else {
            if !from_history {
                self.history.push(query.as_str());
            }
            self.kernel.run(&query, self.dot_resolution);
        }
        format::emit(self.kernel.take_emissions(), &self.display, console);
        Flow::Continue
    }

    fn show_history(&self, console: &mut dyn Console) {
        if self.history.is_empty() {
            console.diagnostic(Level::Warning, "# no history found.");
        }
        for (i, cmd) in self.history.iter().enumerate() {
            console.diagnostic(Level::Notice, &format!("# {i:3} : {cmd}"));
        }
    }
}

fn shell_escape(cmd: &str, console: &mut dyn Console) {
    match run_shell(cmd) {
        Ok((stdout, stderr)) => {
            console.out(&format!("{stdout}\n"));
            if !stderr.is_empty() {
                console.out(&format!("{stderr}\n"));
            }
        }
        Err(e) => console.diagnostic(Level::Warning, &format!("# {cmd}: {e}")),
    }
}

fn history_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.data_dir().join("qic").join("history.txt"))
}

/// Save line-editor history to disk.
fn save_history(rl: &mut Editor<WordCompleter, DefaultHistory>, history_path: &Option<PathBuf>) {
    if let Some(path) = history_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

/// Run the interactive loop until quit or end of input.
pub fn run(mut repl: Repl, console: &mut dyn Console) -> Result<()> {
    let mut rl: Editor<WordCompleter, DefaultHistory> =
        Editor::new().context("Failed to create editor")?;
    rl.set_helper(Some(WordCompleter::new(repl.completion_words())));

    let history_path = history_path();
    if let Some(ref path) = history_path {
        if let Err(e) = rl.load_history(path) {
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = rl.add_history_entry(line.as_str()) {
                        tracing::warn!("Failed to add history entry: {}", e);
                    }
                }
                if repl.process_line(&line, console) == Flow::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                console.diagnostic(Level::Critical, EOF_MESSAGE);
                break;
            }
            Err(err) => {
                console.diagnostic(Level::Critical, &format!("# IO Error. {err}"));
                break;
            }
        }
    }

    save_history(&mut rl, &history_path);
    Ok(())
}
