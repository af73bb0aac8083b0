//! Lexer for expanded query code.
//!
//! Converts source text into a stream of tokens using the logos lexer
//! generator, then runs a layout pass that turns line structure into
//! `Newline`, `Indent` and `Dedent` tokens.
//!
//! # Token Categories
//!
//! - **Keywords**: `and`, `def`, `for`, `if`, `in`, `lambda`, `not`, `return`, ...
//! - **Literals**: strings (single, double and raw), integers, floats
//! - **Operators**: arithmetic, comparison, assignment and augmented assignment
//! - **Punctuation**: brackets, `,`, `:`, `;`, `.`
//! - **Layout**: synthesized from line breaks outside brackets

use logos::{Logos, Span};
use std::fmt;
use thiserror::Error;

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default, Error)]
pub enum LexerError {
    #[default]
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("invalid number")]
    InvalidNumber,
    #[error("integer literal is too large")]
    IntegerOverflow,
    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords (must come before Ident for priority)
    // ═══════════════════════════════════════════════════════════════════
    #[token("and")]
    And,

    #[token("as")]
    As,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("def")]
    Def,

    #[token("del")]
    Del,

    #[token("elif")]
    Elif,

    #[token("else")]
    Else,

    #[token("False")]
    False,

    #[token("for")]
    For,

    #[token("from")]
    From,

    #[token("if")]
    If,

    #[token("import")]
    Import,

    #[token("in")]
    In,

    #[token("is")]
    Is,

    #[token("lambda")]
    Lambda,

    #[token("None")]
    None,

    #[token("not")]
    Not,

    #[token("or")]
    Or,

    #[token("pass")]
    Pass,

    #[token("return")]
    Return,

    #[token("True")]
    True,

    #[token("while")]
    While,

    // ═══════════════════════════════════════════════════════════════════
    // Operators (longer first)
    // ═══════════════════════════════════════════════════════════════════
    #[token("**")]
    Pow,

    #[token("//")]
    FloorDiv,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LtEq,

    #[token(">=")]
    GtEq,

    #[token("+=")]
    PlusEq,

    #[token("-=")]
    MinusEq,

    #[token("*=")]
    StarEq,

    #[token("/=")]
    SlashEq,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("=")]
    Assign,

    // ═══════════════════════════════════════════════════════════════════
    // Punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(";")]
    Semi,

    #[token(".")]
    Dot,

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════

    /// Quoted string with escapes processed.
    #[regex(r#""([^"\\\n]|\\.)*""#, lex_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", lex_string)]
    #[regex(r#"[rR]"([^"\\\n]|\\.)*""#, lex_raw_string)]
    #[regex(r"[rR]'([^'\\\n]|\\.)*'", lex_raw_string)]
    Str(String),

    /// A lone quote that never closes.
    #[regex(r#"["']"#, lex_unterminated)]
    Unterminated,

    #[regex(r"[0-9]+", lex_int)]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", lex_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", lex_float)]
    Float(f64),

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // ═══════════════════════════════════════════════════════════════════
    // Layout
    // ═══════════════════════════════════════════════════════════════════

    /// Line break followed by the next line's indentation width.
    #[regex(r"\n[ \t]*", |lex| lex.slice().len() - 1)]
    LineBreak(usize),

    /// Comment: `# ...` to end of line
    #[regex(r"#[^\n]*", allow_greedy = true)]
    Comment,

    /// Backslash-newline joins two physical lines.
    #[regex(r"\\\r?\n")]
    LineContinuation,

    /// End of a logical line: synthesized by the layout pass.
    Newline,

    /// Deeper indentation: synthesized by the layout pass.
    Indent,

    /// Return to an outer indentation level: synthesized by the layout pass.
    Dedent,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::And => "and",
            Token::As => "as",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Def => "def",
            Token::Del => "del",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::False => "False",
            Token::For => "for",
            Token::From => "from",
            Token::If => "if",
            Token::Import => "import",
            Token::In => "in",
            Token::Is => "is",
            Token::Lambda => "lambda",
            Token::None => "None",
            Token::Not => "not",
            Token::Or => "or",
            Token::Pass => "pass",
            Token::Return => "return",
            Token::True => "True",
            Token::While => "while",
            Token::Pow => "**",
            Token::FloorDiv => "//",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semi => ";",
            Token::Dot => ".",
            Token::Str(s) => return write!(f, "{s:?}"),
            Token::Unterminated => "unterminated string",
            Token::Int(i) => return write!(f, "{i}"),
            Token::Float(x) => return write!(f, "{x}"),
            Token::Ident(name) => return write!(f, "{name}"),
            Token::LineBreak(_) | Token::Newline => "newline",
            Token::Comment => "comment",
            Token::LineContinuation => "line continuation",
            Token::Indent => "indent",
            Token::Dedent => "dedent",
        };
        write!(f, "'{text}'")
    }
}

/// Lex a quoted string literal, processing escape sequences.
fn lex_string(lex: &mut logos::Lexer<Token>) -> Result<String, LexerError> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

/// Lex a raw string literal: `r'...'` keeps backslashes verbatim.
fn lex_raw_string(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[2..s.len() - 1].to_string()
}

/// A lone quote character means the string never closed.
fn lex_unterminated(_lex: &mut logos::Lexer<Token>) -> Result<(), LexerError> {
    Err(LexerError::UnterminatedString)
}

fn lex_int(lex: &mut logos::Lexer<Token>) -> Result<i64, LexerError> {
    lex.slice().parse().map_err(|_| LexerError::IntegerOverflow)
}

fn lex_float(lex: &mut logos::Lexer<Token>) -> Result<f64, LexerError> {
    lex.slice().parse().map_err(|_| LexerError::InvalidNumber)
}

/// Process backslash escapes. Unknown escapes keep their backslash.
pub fn unescape(body: &str) -> Result<String, LexerError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => out.push(hex_escape(&mut chars, 2)?),
            Some('u') => out.push(hex_escape(&mut chars, 4)?),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(LexerError::InvalidEscape),
        }
    }
    Ok(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, digits: usize) -> Result<char, LexerError> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return Err(LexerError::InvalidEscape);
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or(LexerError::InvalidEscape)
}

/// Tokenize source code into a vector of spanned tokens.
///
/// Comments and line continuations are dropped. Line breaks are replaced
/// by layout tokens: the first line's indentation is the base level, and
/// breaks inside brackets are ignored.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Vec<Spanned<LexerError>>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(Token::Comment | Token::LineContinuation) => {}
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(err) => errors.push(Spanned::new(err, span)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    layout(tokens, source).map_err(|e| vec![e])
}

/// Column of a byte offset within its line.
fn column(source: &str, offset: usize) -> usize {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    offset - line_start
}

fn layout(tokens: Vec<Spanned<Token>>, source: &str) -> Result<Vec<Spanned<Token>>, Spanned<LexerError>> {
    let mut out = Vec::with_capacity(tokens.len() + 4);
    let mut indents: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut pending: Option<(usize, Span)> = None;

    for Spanned { token, span } in tokens {
        if let Token::LineBreak(width) = token {
            if depth == 0 {
                pending = Some((width, span));
            }
            continue;
        }

        if indents.is_empty() {
            indents.push(column(source, span.start));
            pending = None;
        } else if let Some((width, brk)) = pending.take() {
            out.push(Spanned::new(Token::Newline, brk.clone()));
            let top = indents.last().copied().unwrap_or(0);
            if width > top {
                indents.push(width);
                out.push(Spanned::new(Token::Indent, brk));
            } else {
                while indents.len() > 1 && indents.last().is_some_and(|&level| width < level) {
                    indents.pop();
                    out.push(Spanned::new(Token::Dedent, brk.clone()));
                }
                if indents.last() != Some(&width) {
                    return Err(Spanned::new(LexerError::InconsistentDedent, brk));
                }
            }
        }

        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push(Spanned::new(token, span));
    }

    if !indents.is_empty() {
        let end = source.len()..source.len();
        out.push(Spanned::new(Token::Newline, end.clone()));
        for _ in 1..indents.len() {
            out.push(Spanned::new(Token::Dedent, end.clone()));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("lexer should succeed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    fn ident(name: &str) -> Token {
        Token::Ident(name.to_string())
    }

    #[test]
    fn keywords_beat_identifiers() {
        assert_eq!(lex("for"), vec![Token::For, Token::Newline]);
        assert_eq!(lex("format"), vec![ident("format"), Token::Newline]);
        assert_eq!(lex("None"), vec![Token::None, Token::Newline]);
        assert_eq!(lex("none"), vec![ident("none"), Token::Newline]);
    }

    #[test]
    fn subscript_chain() {
        assert_eq!(
            lex("a['b'][0]"),
            vec![
                ident("a"),
                Token::LBracket,
                Token::Str("b".into()),
                Token::RBracket,
                Token::LBracket,
                Token::Int(0),
                Token::RBracket,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(lex("1.5")[0], Token::Float(1.5));
        assert_eq!(lex("2e3")[0], Token::Float(2000.0));
        assert_eq!(lex("42")[0], Token::Int(42));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(lex(r#""a\nb""#)[0], Token::Str("a\nb".into()));
        assert_eq!(lex(r"'\d+'")[0], Token::Str("\\d+".into()));
        assert_eq!(lex(r"r'\n'")[0], Token::Str("\\n".into()));
        assert_eq!(lex(r#"'it\'s'"#)[0], Token::Str("it's".into()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let errs = tokenize("x = 'abc").unwrap_err();
        assert_eq!(errs[0].token, LexerError::UnterminatedString);
    }

    #[test]
    fn indentation_produces_layout_tokens() {
        let tokens = lex("if x:\n    y\nz");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                ident("x"),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                ident("y"),
                Token::Newline,
                Token::Dedent,
                ident("z"),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn dedent_at_end_of_input() {
        let tokens = lex("def f(_):\n    return _\n");
        assert_eq!(&tokens[tokens.len() - 2..], &[Token::Newline, Token::Dedent]);
    }

    #[test]
    fn brackets_suppress_line_breaks() {
        assert_eq!(
            lex("[1,\n   2]"),
            vec![
                Token::LBracket,
                Token::Int(1),
                Token::Comma,
                Token::Int(2),
                Token::RBracket,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn base_indentation_is_the_first_line() {
        assert_eq!(lex("    a\n    b"), vec![ident("a"), Token::Newline, ident("b"), Token::Newline]);
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        assert_eq!(
            lex("a\n\n# note\n   \nb  # trailing"),
            vec![ident("a"), Token::Newline, ident("b"), Token::Newline]
        );
    }

    #[test]
    fn inconsistent_dedent() {
        let errs = tokenize("if x:\n    a\n  b").unwrap_err();
        assert_eq!(errs[0].token, LexerError::InconsistentDedent);
    }

    #[test]
    fn line_continuation_joins_lines() {
        assert_eq!(lex("a + \\\n b"), vec![ident("a"), Token::Plus, ident("b"), Token::Newline]);
    }

    #[test]
    fn empty_source_has_no_tokens() {
        assert!(lex("").is_empty());
        assert!(lex("  \n # only a comment\n").is_empty());
    }
}
