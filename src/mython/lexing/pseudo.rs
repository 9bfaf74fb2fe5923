//! Pseudo-token recognition
//!
//!     The token stream works one physical line at a time and asks this scanner for the single
//!     longest token that starts at a given offset. Leading blanks are skipped by the caller,
//!     so none of these patterns account for them.
//!
//!     Strings get two shapes. A complete single-line literal, or one whose line ends in a
//!     backslash continuation, is [Pseudo::String]; only the opening quotes of a triple-quoted
//!     literal are matched ([Pseudo::TripleQuote]) and the rest is found with [string_end],
//!     because a triple-quoted string may run over several lines.

use std::ops::Range;

use logos::Logos;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    #[regex(r"\\\r?\n")]
    Continuation,

    #[regex(r"#[^\r\n]*")]
    Comment,

    #[regex(r#"[uUbB]?[rR]?('''|""")"#)]
    TripleQuote,

    #[regex(r#"[uUbB]?[rR]?'[^\n'\\]*(\\.[^\n'\\]*)*('|\\\r?\n)"#)]
    #[regex(r#"[uUbB]?[rR]?"[^\n"\\]*(\\.[^\n"\\]*)*("|\\\r?\n)"#)]
    String,

    #[regex(r"0[xX][0-9a-fA-F]+[lL]?")]
    #[regex(r"0[bB][01]+[lL]?")]
    #[regex(r"0[oO][0-7]+[lL]?")]
    #[regex(r"0[0-7]*[lL]?")]
    #[regex(r"[1-9][0-9]*[lL]?")]
    #[regex(r"([0-9]+\.[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?[jJ]?")]
    #[regex(r"[0-9]+[eE][-+]?[0-9]+[jJ]?")]
    #[regex(r"[0-9]+[jJ]")]
    Number,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name,

    #[regex(r"\*\*=?|>>=?|<<=?|<>|!=|//=?|[+\-*/%&|^=<>]=?|~")]
    Operator,

    #[regex(r"[\[\](){}]")]
    Bracket,

    #[regex(r"[:;.,`@]")]
    Special,

    #[token("!")]
    Bang,
}

/// Scans the token starting exactly at `pos`. `None` means no token starts there.
pub fn scan(line: &str, pos: usize) -> Option<(Pseudo, Range<usize>)> {
    let rest = line.get(pos..)?;
    let mut lexer = Pseudo::lexer(rest);
    match lexer.next() {
        Some(Ok(pseudo)) => {
            let span = lexer.span();
            Some((pseudo, pos + span.start..pos + span.end))
        }
        _ => None,
    }
}

static SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^[^'\\]*(?:\\(?s:.)[^'\\]*)*'"#).unwrap());
static DOUBLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^[^"\\]*(?:\\(?s:.)[^"\\]*)*""#).unwrap());
static SINGLE3: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:[^'\\]|\\(?s:.)|'{1,2}(?:[^'\\]|\\(?s:.)))*'''"#).unwrap()
});
static DOUBLE3: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:[^"\\]|\\(?s:.)|"{1,2}(?:[^"\\]|\\(?s:.)))*""""#).unwrap()
});

/// The closing delimiter a string literal is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
    TripleSingle,
    TripleDouble,
}

impl Quote {
    /// Reads the quote style of a literal's opening, prefix letters included.
    pub fn of(literal: &str) -> Option<Quote> {
        let body = literal.trim_start_matches(|c: char| "uUbBrR".contains(c));
        if body.starts_with("'''") {
            Some(Quote::TripleSingle)
        } else if body.starts_with("\"\"\"") {
            Some(Quote::TripleDouble)
        } else if body.starts_with('\'') {
            Some(Quote::Single)
        } else if body.starts_with('"') {
            Some(Quote::Double)
        } else {
            None
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Quote::Single => &SINGLE,
            Quote::Double => &DOUBLE,
            Quote::TripleSingle => &SINGLE3,
            Quote::TripleDouble => &DOUBLE3,
        }
    }
}

/// Finds where a string body starting at `from` is closed, returning the offset just past
/// the closing quotes.
pub fn string_end(text: &str, from: usize, quote: Quote) -> Option<usize> {
    let rest = text.get(from..)?;
    quote.pattern().find(rest).map(|found| from + found.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<(Pseudo, &str)> {
        let mut pos = 0;
        let mut found = Vec::new();
        while pos < line.len() {
            if line[pos..].starts_with(' ') {
                pos += 1;
                continue;
            }
            let (pseudo, range) = scan(line, pos).unwrap();
            found.push((pseudo, &line[range.clone()]));
            pos = range.end;
        }
        found
    }

    #[test]
    fn test_operators_prefer_the_longest_spelling() {
        assert_eq!(
            kinds("a **= b != !c"),
            vec![
                (Pseudo::Name, "a"),
                (Pseudo::Operator, "**="),
                (Pseudo::Name, "b"),
                (Pseudo::Operator, "!="),
                (Pseudo::Bang, "!"),
                (Pseudo::Name, "c"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0x1F 017 3.5e-2 .5 10L 2j"),
            vec![
                (Pseudo::Number, "0x1F"),
                (Pseudo::Number, "017"),
                (Pseudo::Number, "3.5e-2"),
                (Pseudo::Number, ".5"),
                (Pseudo::Number, "10L"),
                (Pseudo::Number, "2j"),
            ]
        );
    }

    #[test]
    fn test_strings_and_prefixes() {
        assert_eq!(
            kinds(r#"r'a\'b' u"x" b'''"#),
            vec![
                (Pseudo::String, r"r'a\'b'"),
                (Pseudo::String, "u\"x\""),
                (Pseudo::TripleQuote, "b'''"),
            ]
        );
        assert_eq!(kinds("'abc\\\n"), vec![(Pseudo::String, "'abc\\\n")]);
    }

    #[test]
    fn test_unterminated_quote_is_not_a_token() {
        assert_eq!(scan("'abc\n", 0), None);
    }

    #[test]
    fn test_string_end() {
        let text = "doc ''' inner ''' tail";
        assert_eq!(string_end(text, 0, Quote::TripleSingle), Some(7));
        assert_eq!(string_end("a\\'b' rest", 0, Quote::Single), Some(5));
        assert_eq!(string_end("no end\n", 0, Quote::Double), None);
        assert_eq!(Quote::of("x'"), None);
        assert_eq!(Quote::of("br'''"), Some(Quote::TripleSingle));
    }
}
