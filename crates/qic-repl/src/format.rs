//! Output for the REPL and batch runs.
//!
//! Kernel emissions are written to a [`Console`]: printed text and results
//! to stdout, `# ...` diagnostics to stderr. Colour is applied here and
//! nowhere else.

use std::io::{IsTerminal, Write};

use owo_colors::OwoColorize;

use qic_kernel::display::{self, DisplayConfig, Rendered};
use qic_kernel::{Emission, Level};

/// Where turn output goes.
pub trait Console {
    /// Write text to the output stream as-is.
    fn out(&mut self, text: &str);

    /// Write one diagnostic line.
    fn diagnostic(&mut self, level: Level, text: &str);
}

/// The process's stdout and stderr.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
    plain: bool,
}

impl Terminal {
    pub fn new(plain: bool) -> Self {
        Self { plain }
    }
}

impl Console for Terminal {
    fn out(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            tracing::warn!("Failed to write output: {}", e);
        }
    }

    fn diagnostic(&mut self, level: Level, text: &str) {
        eprintln!("{}", paint_diagnostic(level, text, self.plain));
    }
}

/// Collects output in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub out: String,
    pub diagnostics: Vec<(Level, String)>,
}

impl Captured {
    /// Diagnostic texts without their levels.
    pub fn diagnostic_texts(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|(_, t)| t.as_str()).collect()
    }
}

impl Console for Captured {
    fn out(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn diagnostic(&mut self, level: Level, text: &str) {
        self.diagnostics.push((level, text.to_string()));
    }
}

/// Colour is used only on a terminal that is not `dumb`.
pub fn supports_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
}

/// Write a turn's emissions in order.
pub fn emit(emissions: Vec<Emission>, config: &DisplayConfig, console: &mut dyn Console) {
    for emission in emissions {
        match emission {
            Emission::Diagnostic(d) => console.diagnostic(d.level, &d.text),
            Emission::Print(text) => console.out(&text),
            Emission::Result(value) => {
                let mut notices = Vec::new();
                let rendered = display::render(value, config, &mut notices);
                for notice in notices {
                    console.diagnostic(Level::Notice, &notice);
                }
                let Some(rendered) = rendered else { continue };
                let text = match rendered {
                    Rendered::Json(json) if !config.plain => colorize_json(&json),
                    other => other.text().to_string(),
                };
                console.out(&format!("{text}\n"));
            }
        }
    }
}

fn paint_diagnostic(level: Level, text: &str, plain: bool) -> String {
    if plain {
        return text.to_string();
    }
    match level {
        Level::Plain => text.to_string(),
        Level::Notice => text.cyan().to_string(),
        Level::Warning => text.yellow().to_string(),
        Level::Critical => text.red().to_string(),
    }
}

/// Colour JSON tokens: keys, strings, numbers and literals.
pub fn colorize_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len() * 2);
    let mut chars = json.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            '"' => {
                let mut end = json.len();
                let mut escaped = false;
                for (i, ch) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == '"' {
                        end = i + 1;
                        break;
                    }
                }
                let token = &json[start..end];
                if json[end..].trim_start().starts_with(':') {
                    out.push_str(&token.blue().bold().to_string());
                } else {
                    out.push_str(&token.green().to_string());
                }
            }
            '-' | '0'..='9' => {
                let mut end = start + 1;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-') {
                        end = i + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = &json[start..end];
                out.push_str(&token.cyan().to_string());
            }
            't' | 'f' | 'n' => {
                let mut end = start + 1;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_alphabetic() {
                        end = i + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = &json[start..end];
                out.push_str(&token.magenta().to_string());
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qic_kernel::{Diagnostic, Value};

    fn strip(text: &str) -> String {
        qic_kernel::formats::strip_ansi(text).into_owned()
    }

    #[test]
    fn colouring_keeps_the_text() {
        let json = "{\n  \"a\": [1, -2.5e3, \"x\\\"y\"],\n  \"b\": null,\n  \"c\": true\n}";
        let coloured = colorize_json(json);
        assert_ne!(coloured, json);
        assert_eq!(strip(&coloured), json);
    }

    #[test]
    fn keys_and_values_differ() {
        let coloured = colorize_json(r#"{"k": "v"}"#);
        assert!(coloured.contains(&"\"k\"".blue().bold().to_string()));
        assert!(coloured.contains(&"\"v\"".green().to_string()));
    }

    #[test]
    fn numbers_and_literals_are_coloured() {
        let coloured = colorize_json("[12, -0.5, true, null]");
        assert!(coloured.contains(&"12".cyan().to_string()));
        assert!(coloured.contains(&"-0.5".cyan().to_string()));
        assert!(coloured.contains(&"true".magenta().to_string()));
        assert!(coloured.contains(&"null".magenta().to_string()));
        assert_eq!(strip(&coloured), "[12, -0.5, true, null]");
    }

    #[test]
    fn emissions_in_order() {
        let config = DisplayConfig {
            plain: true,
            compact: true,
            rows: 1,
            ..DisplayConfig::default()
        };
        let mut console = Captured::default();
        emit(
            vec![
                Emission::Print("hi\n".into()),
                Emission::Diagnostic(Diagnostic {
                    level: Level::Warning,
                    text: "# careful".into(),
                }),
                Emission::Result(Value::List(vec![Value::Int(1), Value::Int(2)])),
                Emission::Result(Value::None),
                Emission::Result(Value::from("text")),
            ],
            &config,
            &mut console,
        );
        assert_eq!(console.out, "hi\n[1]\ntext\n");
        assert_eq!(
            console.diagnostics,
            vec![
                (Level::Warning, "# careful".to_string()),
                (Level::Notice, "# _[] 2 -> 1".to_string()),
            ]
        );
    }

    #[test]
    fn plain_diagnostics_are_uncoloured() {
        assert_eq!(paint_diagnostic(Level::Critical, "# x", true), "# x");
        assert_ne!(paint_diagnostic(Level::Critical, "# x", false), "# x");
    }
}
