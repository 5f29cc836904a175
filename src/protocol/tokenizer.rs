//! Command Line Tokenizer
//!
//! Splits a command line into structural tokens. Separators are space and
//! tab. Three token shapes exist on the wire:
//!
//! 1. **Bare token**: bytes until the next separator (`foo`, `42`)
//! 2. **Quoted string**: `"..."` with `\` escaping the next byte; the token
//!    includes both quotes (`"hello world"`)
//! 3. **JSON-like block**: starts with `{` or `[` and ends at the byte that
//!    brings both the brace depth and the bracket depth back to zero.
//!    Quotes inside the block open strings; inside a string only a
//!    non-escaped `"` matters, so braces in string content do not affect
//!    nesting (`{"a":"}"}` is one token).
//!
//! The tokenizer delimits tokens structurally; it does not validate JSON
//! content. Callers treat every token uniformly as an opaque `&str` slice.
//! Both cuts run in O(n) over the examined bytes.

use thiserror::Error;

/// Errors produced while cutting a token off a command line.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeError {
    /// The input contained only separators (or nothing at all).
    #[error("missing token")]
    NoToken,

    /// The input looked like a token but was incomplete: an unclosed quoted
    /// string, unbalanced braces/brackets, or a depth underflow.
    #[error("malformed token")]
    Malformed,
}

#[inline]
fn is_sep(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Cuts the first whitespace-delimited token off `s`.
///
/// Leading separators are skipped and trailing separators after the token
/// are consumed, so the returned remainder starts at the next token (or is
/// empty). Fails only with [`TokenizeError::NoToken`]; a bare cut can never
/// be malformed.
///
/// ```
/// use glowkv::protocol::cut_simple;
///
/// let (tok, rest) = cut_simple("  GET   foo ").unwrap();
/// assert_eq!(tok, "GET");
/// assert_eq!(rest, "foo ");
/// ```
pub fn cut_simple(s: &str) -> Result<(&str, &str), TokenizeError> {
    let b = s.as_bytes();
    let n = b.len();

    let mut i = 0;
    while i < n && is_sep(b[i]) {
        i += 1;
    }
    if i == n {
        return Err(TokenizeError::NoToken);
    }

    let mut j = i;
    while j < n && !is_sep(b[j]) {
        j += 1;
    }

    let mut k = j;
    while k < n && is_sep(b[k]) {
        k += 1;
    }

    Ok((&s[i..j], &s[k..]))
}

/// Cuts the first data-aware token off `s`.
///
/// Dispatches on the first non-separator byte: `"` starts a quoted string,
/// `{` or `[` starts a JSON-like block, anything else is a bare token.
/// Quoted and block tokens keep their delimiters. Trailing separators are
/// consumed like in [`cut_simple`].
pub fn cut_smart(s: &str) -> Result<(&str, &str), TokenizeError> {
    let b = s.as_bytes();
    let n = b.len();

    let mut i = 0;
    while i < n && is_sep(b[i]) {
        i += 1;
    }
    if i == n {
        return Err(TokenizeError::NoToken);
    }

    match b[i] {
        b'"' => cut_quoted(s, i),
        b'{' | b'[' => cut_block(s, i),
        _ => {
            let mut j = i;
            while j < n && !is_sep(b[j]) {
                j += 1;
            }
            Ok((&s[i..j], eat_seps(s, j)))
        }
    }
}

/// Quoted string: scan until a non-escaped closing quote. An escaped byte is
/// consumed literally and can never terminate the string.
fn cut_quoted(s: &str, start: usize) -> Result<(&str, &str), TokenizeError> {
    let b = s.as_bytes();
    let n = b.len();

    let mut j = start + 1;
    let mut escaped = false;
    while j < n {
        let c = b[j];
        if escaped {
            escaped = false;
            j += 1;
            continue;
        }
        match c {
            b'\\' => escaped = true,
            b'"' => {
                j += 1;
                return Ok((&s[start..j], eat_seps(s, j)));
            }
            _ => {}
        }
        j += 1;
    }

    // End of input before the closing quote.
    Err(TokenizeError::Malformed)
}

/// JSON-like block: track brace and bracket depth plus an in-string flag.
/// The token ends, inclusively, at the byte that brings both depths to zero.
fn cut_block(s: &str, start: usize) -> Result<(&str, &str), TokenizeError> {
    let b = s.as_bytes();
    let n = b.len();

    let mut brace_depth: i32 = 0;
    let mut bracket_depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    let mut j = start;
    while j < n {
        let c = b[j];

        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
            j += 1;
            continue;
        }

        match c {
            b'"' => in_string = true,
            b'{' => brace_depth += 1,
            b'}' => {
                brace_depth -= 1;
                if brace_depth < 0 {
                    return Err(TokenizeError::Malformed);
                }
            }
            b'[' => bracket_depth += 1,
            b']' => {
                bracket_depth -= 1;
                if bracket_depth < 0 {
                    return Err(TokenizeError::Malformed);
                }
            }
            _ => {}
        }

        j += 1;

        if brace_depth == 0 && bracket_depth == 0 {
            return Ok((&s[start..j], eat_seps(s, j)));
        }
    }

    // End of input with open depths or inside a string.
    Err(TokenizeError::Malformed)
}

/// Skips separators starting at byte offset `from` and returns the rest.
fn eat_seps(s: &str, from: usize) -> &str {
    let b = s.as_bytes();
    let mut k = from;
    while k < b.len() && is_sep(b[k]) {
        k += 1;
    }
    &s[k..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_basic() {
        assert_eq!(cut_simple("foo bar"), Ok(("foo", "bar")));
        assert_eq!(cut_simple("  tok  rest"), Ok(("tok", "rest")));
        assert_eq!(cut_simple("\tfoo\t \tbar baz"), Ok(("foo", "bar baz")));
        assert_eq!(cut_simple("single"), Ok(("single", "")));
        assert_eq!(cut_simple("trailing   "), Ok(("trailing", "")));
    }

    #[test]
    fn simple_no_token() {
        assert_eq!(cut_simple(""), Err(TokenizeError::NoToken));
        assert_eq!(cut_simple("   \t  "), Err(TokenizeError::NoToken));
    }

    #[test]
    fn simple_round_trip_property() {
        // cut_simple("  <tok>  rest") == ("<tok>", "rest") for any
        // whitespace-free token.
        for tok in ["a", "GET", "{weird}", "\"half", "x-y_z.9"] {
            let line = format!("  {}  rest", tok);
            assert_eq!(cut_simple(&line), Ok((tok, "rest")));
        }
    }

    #[test]
    fn smart_bare() {
        assert_eq!(cut_smart("foo bar"), Ok(("foo", "bar")));
        assert_eq!(cut_smart("  42 "), Ok(("42", "")));
        assert_eq!(cut_smart(""), Err(TokenizeError::NoToken));
        assert_eq!(cut_smart(" \t"), Err(TokenizeError::NoToken));
    }

    #[test]
    fn smart_quoted() {
        assert_eq!(
            cut_smart("\"hello world\" rest"),
            Ok(("\"hello world\"", "rest"))
        );
        // Token keeps its quotes.
        assert_eq!(cut_smart("\"\""), Ok(("\"\"", "")));
        // Escaped quote does not terminate the string.
        assert_eq!(
            cut_smart(r#""a \" b" tail"#),
            Ok((r#""a \" b""#, "tail"))
        );
    }

    #[test]
    fn smart_quoted_malformed() {
        assert_eq!(cut_smart("\"unterminated"), Err(TokenizeError::Malformed));
        // The closing quote is escaped, so the string never ends.
        assert_eq!(cut_smart(r#""a\""#), Err(TokenizeError::Malformed));
    }

    #[test]
    fn smart_block() {
        assert_eq!(
            cut_smart(r#"{"a":1,"b":[2,3]} rest"#),
            Ok((r#"{"a":1,"b":[2,3]}"#, "rest"))
        );
        assert_eq!(cut_smart("[1,[2,[3]]]"), Ok(("[1,[2,[3]]]", "")));
        assert_eq!(cut_smart("{} {}"), Ok(("{}", "{}")));
        // Block ends as soon as both depths hit zero.
        assert_eq!(cut_smart("[1,2]]"), Ok(("[1,2]", "]")));
    }

    #[test]
    fn smart_block_string_content() {
        // Braces inside strings must not affect nesting.
        assert_eq!(cut_smart(r#"{"a":"}"}"#), Ok((r#"{"a":"}"}"#, "")));
        assert_eq!(
            cut_smart(r#"{"q":"[\"{"} x"#),
            Ok((r#"{"q":"[\"{"}"#, "x"))
        );
    }

    #[test]
    fn smart_block_malformed() {
        assert_eq!(cut_smart("{\"a\":1"), Err(TokenizeError::Malformed));
        assert_eq!(cut_smart("[1,2"), Err(TokenizeError::Malformed));
        // Depth underflow.
        assert_eq!(cut_smart("{]}"), Err(TokenizeError::Malformed));
        assert_eq!(cut_smart("[}]"), Err(TokenizeError::Malformed));
        // End of input while still inside a string.
        assert_eq!(cut_smart("{\"open"), Err(TokenizeError::Malformed));
    }

    #[test]
    fn smart_leading_close_is_bare() {
        // A leading `}` or `]` is not a block opener; it reads as a bare
        // token like any other byte.
        assert_eq!(cut_smart("}x y"), Ok(("}x", "y")));
        assert_eq!(cut_smart("]"), Ok(("]", "")));
    }

    #[test]
    fn smart_chained_cuts() {
        let line = r#"key {"n":[1,2]} 30"#;
        let (key, rest) = cut_smart(line).unwrap();
        let (value, rest) = cut_smart(rest).unwrap();
        let (ttl, rest) = cut_smart(rest).unwrap();
        assert_eq!(key, "key");
        assert_eq!(value, r#"{"n":[1,2]}"#);
        assert_eq!(ttl, "30");
        assert_eq!(rest, "");
    }

    #[test]
    fn smart_handles_multibyte_input() {
        assert_eq!(cut_smart("héllo wörld"), Ok(("héllo", "wörld")));
        assert_eq!(cut_smart("\"héllo wörld\""), Ok(("\"héllo wörld\"", "")));
    }
}
