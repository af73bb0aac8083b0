//! `[]` list shorthand: `a[].b` maps `.b` over the sequence `a`.
//!
//! A run is the path text around a marker: to the left, identifiers, dots
//! and balanced `[...]`/`(...)` groups; to the right, the same plus `{...}`
//! groups. An unmatched opening bracket ends the run, so `len(a[])` only
//! rewrites `a[]`. A `[]` with no path to its left is an empty list literal.

use super::{is_path_char, string_mask};

/// Pass-scoped fresh names: `_q0`, `_q1`, ...
#[derive(Debug, Default)]
struct Fresh(usize);

impl Fresh {
    fn next(&mut self) -> String {
        let name = format!("_q{}", self.0);
        self.0 += 1;
        name
    }
}

pub(super) fn expand(code: &str) -> String {
    if !code.contains("[]") {
        return code.to_string();
    }
    let mut fresh = Fresh::default();
    let mut out = String::with_capacity(code.len() * 2);
    let mut rest = code;
    while let Some(marker) = find_marker(rest) {
        let mask = string_mask(rest);
        let start = scan_left(rest, marker, &mask);
        let end = scan_right(rest, marker + 2, &mask);
        out.push_str(&rest[..start]);
        out.push_str(&nest(&rest[start..end], &mut fresh));
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// `l[]x` becomes `[ <x over v> for v in l ]`, recursing into `x`.
fn nest(chain: &str, fresh: &mut Fresh) -> String {
    let Some(marker) = find_marker(chain) else {
        return chain.to_string();
    };
    let var = fresh.next();
    let (base, tail) = (&chain[..marker], &chain[marker + 2..]);
    let inner = nest(&format!("{var}{tail}"), fresh);
    format!("[ {inner} for {var} in {base} ]")
}

/// Byte offset of the first `[]` that follows a path and is not quoted.
fn find_marker(code: &str) -> Option<usize> {
    let mask = string_mask(code);
    code.match_indices("[]")
        .map(|(i, _)| i)
        .find(|&i| {
            !mask[i]
                && code[..i]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | ']' | ')'))
        })
}

fn opener(close: char) -> Option<char> {
    match close {
        ']' => Some('['),
        ')' => Some('('),
        '}' => Some('{'),
        _ => None,
    }
}

fn closer(open: char) -> Option<char> {
    match open {
        '[' => Some(']'),
        '(' => Some(')'),
        '{' => Some('}'),
        _ => None,
    }
}

/// Start of the run ending at byte `end`. Brackets inside string literals
/// are not counted.
fn scan_left(code: &str, end: usize, mask: &[bool]) -> usize {
    let chars: Vec<(usize, char)> = code[..end].char_indices().collect();
    let mut start = end;
    let mut i = chars.len();
    while i > 0 {
        let (pos, c) = chars[i - 1];
        if is_path_char(c) {
            start = pos;
            i -= 1;
            continue;
        }
        if matches!(c, ']' | ')') {
            let Some(open) = opener(c) else { break };
            let mut depth = 0usize;
            let mut j = i;
            let mut matched = None;
            while j > 0 {
                let (p, ch) = chars[j - 1];
                if mask[p] {
                    j -= 1;
                    continue;
                }
                if ch == c {
                    depth += 1;
                } else if ch == open {
                    depth -= 1;
                    if depth == 0 {
                        matched = Some((j - 1, p));
                        break;
                    }
                }
                j -= 1;
            }
            match matched {
                Some((index, pos)) => {
                    start = pos;
                    i = index;
                    continue;
                }
                None => break,
            }
        }
        break;
    }
    start
}

/// End of the run starting at byte `from`.
fn scan_right(code: &str, from: usize, mask: &[bool]) -> usize {
    let mut end = from;
    let mut chars = code[from..].char_indices().map(|(i, c)| (i + from, c)).peekable();
    while let Some(&(pos, c)) = chars.peek() {
        if is_path_char(c) {
            end = pos + c.len_utf8();
            chars.next();
            continue;
        }
        let Some(close) = closer(c) else { break };
        let mut depth = 0usize;
        let mut closed = None;
        for (p, ch) in chars.by_ref() {
            if mask[p] {
                continue;
            }
            if ch == c {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    closed = Some(p + ch.len_utf8());
                    break;
                }
            }
        }
        match closed {
            Some(p) => end = p,
            None => break,
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a[].b", "[ _q0.b for _q0 in a ]")]
    #[case("a[].b[].c", "[ [ _q1.c for _q1 in _q0.b ] for _q0 in a ]")]
    #[case("len(a[])", "len([ _q0 for _q0 in a ])")]
    #[case("_t(rows[].name, header)", "_t([ _q0.name for _q0 in rows ], header)")]
    #[case("x['k'][][0]", "[ _q0[0] for _q0 in x['k'] ]")]
    #[case("a[].f(1, 2).g", "[ _q0.f(1, 2).g for _q0 in a ]")]
    #[case("a[].x + b[].y", "[ _q0.x for _q0 in a ] + [ _q1.y for _q1 in b ]")]
    #[case("a[].{x,y}", "[ _q0.{x,y} for _q0 in a ]")]
    #[case("a['x]'][]", "[ _q0 for _q0 in a['x]'] ]")]
    #[case("a[]['(k]'].b", "[ _q0['(k]'].b for _q0 in a ]")]
    fn rewrites(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(expand(code), expected);
    }

    #[rstest]
    #[case("x = []")]
    #[case("f([], 1)")]
    #[case("'a[]'")]
    #[case("plain.path")]
    fn leaves_alone(#[case] code: &str) {
        assert_eq!(expand(code), code);
    }

    #[test]
    fn expansion_is_idempotent() {
        let once = expand("a[].b[].c[]");
        assert_eq!(once.matches(" for ").count(), 3);
        assert_eq!(expand(&once), once);
    }
}
