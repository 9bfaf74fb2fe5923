//! Verbatim captures
//!
//!     Both captures bypass normal scanning. A raw suite is an indented block read as plain
//!     lines: the block's own indentation is removed and everything else, blank lines and
//!     comments included, is kept exactly. A nested expression is everything between an
//!     opening delimiter and its balancing closer, across as many lines as it takes.

use std::sync::Arc;

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{measure_indent, LexerMode, TokenStream};
use crate::mython::error::LexError;
use crate::mython::lexing::tokens::TokenKind;

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A\s*\z").unwrap());
static LEADING_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A[ \t\x0c]+").unwrap());

/// The closing delimiter for an opening one, if it is one of `( [ { <`.
pub fn closer(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        '<' => Some('>'),
        _ => None,
    }
}

fn is_blank(line: &str) -> bool {
    !line.is_empty() && BLANK_LINE.is_match(line)
}

/// What is left of a block line once the block indentation is gone. Blank lines shorter
/// than the indentation keep only their line ending.
fn strip_indent(line: &str, indent: usize) -> &str {
    if line.len() > indent {
        if let Some(rest) = line.get(indent..) {
            return rest;
        }
    }
    line_ending(line)
}

fn line_ending(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

impl TokenStream {
    /// The rest of the line after the colon, when there is any, becomes the suite.
    pub(super) fn capture_inline_suite(&mut self) -> bool {
        let line = Arc::clone(&self.line);
        let rest = &line[self.pos..];
        let text = rest.trim();
        if text.is_empty() {
            return false;
        }
        let start = self.pos + (rest.len() - rest.trim_start().len());
        let end = start + text.len();
        self.emit(
            TokenKind::MySuite,
            text,
            self.at(start),
            self.at(end),
            line.clone(),
        );
        self.pos = end;
        self.mode = LexerMode::Normal;
        trace!("captured inline suite at line {}", self.lnum);
        true
    }

    /// Reads the indented block that starts with `first` and hands back the first line after
    /// it, which the stream then scans normally.
    pub(super) fn capture_raw_suite(&mut self, first: String) -> Result<String, LexError> {
        let start_line = self.lnum;
        let mut captured: Vec<String> = Vec::new();
        let mut line = first;
        while is_blank(&line) {
            captured.push(line);
            line = self.readline();
        }
        if line.is_empty() {
            return Err(LexError::EmptyRawSuite { line: start_line });
        }

        let indent = LEADING_BLANKS
            .find(&line)
            .map(|found| found.as_str().to_string())
            .unwrap_or_default();
        let (width, _) = measure_indent(&indent, self.tab_size);
        let enclosing = self.indents.last().copied().unwrap_or(0);
        if width <= enclosing {
            return Err(LexError::RawSuiteIndentation {
                line: self.lnum,
                expected: enclosing,
                found: width,
            });
        }

        while !line.is_empty() && line.starts_with(&indent) {
            captured.push(line);
            line = self.readline();
            while is_blank(&line) {
                captured.push(line);
                line = self.readline();
            }
        }

        let text: String = captured
            .iter()
            .map(|captured| strip_indent(captured, indent.len()))
            .collect();
        let start = self.position(start_line, indent.len());
        let end = self.position(start_line + captured.len(), 0);
        self.emit(
            TokenKind::MySuite,
            text,
            start,
            end,
            Arc::from(captured.concat()),
        );
        self.mode = LexerMode::Normal;
        trace!(
            "captured raw suite of {} lines from line {}",
            captured.len(),
            start_line
        );
        Ok(line)
    }

    /// Reads up to the delimiter balancing `open`, then yields MYEXPR and the closer.
    pub(super) fn capture_nested_expr(&mut self, open: char) -> Result<(), LexError> {
        self.mode = LexerMode::Normal;
        let Some(close) = closer(open) else {
            return Ok(());
        };
        let start = self.at(self.pos);
        let mut line = Arc::clone(&self.line);
        let mut source = line.to_string();
        let mut text = String::new();
        let mut pos = self.pos;
        let mut depth = 1usize;

        let close_at = loop {
            let mut found = None;
            for (offset, ch) in line[pos..].char_indices() {
                if ch == open {
                    depth += 1;
                } else if ch == close {
                    depth -= 1;
                    if depth == 0 {
                        found = Some(pos + offset);
                        break;
                    }
                }
            }
            match found {
                Some(at) => {
                    text.push_str(&line[pos..at]);
                    break at;
                }
                None => {
                    text.push_str(&line[pos..]);
                    let next = self.readline();
                    if next.is_empty() {
                        return Err(LexError::UnterminatedNestedExpr {
                            delimiter: open,
                            start,
                        });
                    }
                    source.push_str(&next);
                    line = Arc::from(next);
                    pos = 0;
                }
            }
        };

        self.emit(
            TokenKind::MyExpr,
            text,
            start,
            self.at(close_at),
            Arc::from(source),
        );
        if matches!(close, ')' | ']' | '}') {
            self.parenlev = self.parenlev.saturating_sub(1);
        }
        let closing = close.to_string();
        let kind = TokenKind::from_operator(&closing).unwrap_or(TokenKind::Op);
        self.emit(
            kind,
            closing,
            self.at(close_at),
            self.at(close_at + close.len_utf8()),
            line.clone(),
        );
        self.line = line;
        self.pos = close_at + close.len_utf8();
        trace!("captured nested expression closed at {}", self.at(close_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mython::config::{LexerConfig, ParseEnv};
    use crate::mython::lexing::stream::LexerCommand;
    use crate::mython::lexing::tokens::{Position, Token};

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(source, &ParseEnv::default(), &LexerConfig::default())
    }

    fn take(stream: &mut TokenStream, count: usize) -> Vec<Token> {
        (0..count).map(|_| stream.next_token().unwrap()).collect()
    }

    #[test]
    fn test_raw_suite_block_is_dedented() {
        let mut stream = stream("my q:\n    SELECT *\n      FROM t\n\nx\n");
        let head = take(&mut stream, 2);
        assert_eq!(head[1].text, "q");
        stream.command(LexerCommand::StartRawSuite);
        assert_eq!(stream.next_token().unwrap().text, ":");
        assert_eq!(stream.next_token().unwrap().kind, TokenKind::Newline);
        let suite = stream.next_token().unwrap();
        assert_eq!(suite.kind, TokenKind::MySuite);
        assert_eq!(suite.text, "SELECT *\n  FROM t\n\n");
        assert_eq!(suite.start, Position::new(2, 4));
        assert_eq!(suite.end, Position::new(5, 0));
        assert_eq!(stream.mode(), LexerMode::Normal);
        assert_eq!(stream.next_token().unwrap().text, "x");
    }

    #[test]
    fn test_inline_suite() {
        let mut stream = stream("my q: some text  \ny\n");
        take(&mut stream, 2);
        stream.command(LexerCommand::StartRawSuite);
        assert_eq!(stream.next_token().unwrap().text, ":");
        let suite = stream.next_token().unwrap();
        assert_eq!(suite.kind, TokenKind::MySuite);
        assert_eq!(suite.text, "some text");
        assert_eq!(suite.start, Position::new(1, 6));
        assert_eq!(stream.next_token().unwrap().kind, TokenKind::Newline);
        assert_eq!(stream.next_token().unwrap().text, "y");
    }

    #[test]
    fn test_raw_suite_must_be_indented() {
        let mut stream = stream("my q:\nx\n");
        take(&mut stream, 2);
        stream.command(LexerCommand::StartRawSuite);
        take(&mut stream, 2);
        assert_eq!(
            stream.next_token().unwrap_err(),
            LexError::RawSuiteIndentation {
                line: 2,
                expected: 0,
                found: 0
            }
        );
    }

    #[test]
    fn test_raw_suite_at_eof() {
        let mut stream = stream("my q:\n\n");
        take(&mut stream, 2);
        stream.command(LexerCommand::StartRawSuite);
        take(&mut stream, 2);
        assert_eq!(
            stream.next_token().unwrap_err(),
            LexError::EmptyRawSuite { line: 2 }
        );
    }

    #[test]
    fn test_nested_expression_counts_its_own_delimiters() {
        let mut stream = stream("x = !<a < b > c> + 1\n");
        let head = take(&mut stream, 4);
        assert_eq!(head[3].text, "<");
        stream.command(LexerCommand::StartNestedExpr('<'));
        let expr = stream.next_token().unwrap();
        assert_eq!(expr.kind, TokenKind::MyExpr);
        assert_eq!(expr.text, "a < b > c");
        let close = stream.next_token().unwrap();
        assert_eq!(close.kind, TokenKind::Greater);
        assert_eq!(close.start, Position::new(1, 15));
        assert_eq!(stream.next_token().unwrap().text, "+");
    }

    #[test]
    fn test_nested_expression_spans_lines() {
        let mut stream = stream("x = !{a,\n  b}\ny\n");
        take(&mut stream, 4);
        stream.command(LexerCommand::StartNestedExpr('{'));
        let expr = stream.next_token().unwrap();
        assert_eq!(expr.text, "a,\n  b");
        assert_eq!(expr.end, Position::new(2, 3));
        assert_eq!(stream.next_token().unwrap().kind, TokenKind::RBrace);
        assert_eq!(stream.paren_depth(), 0);
        assert_eq!(stream.next_token().unwrap().kind, TokenKind::Newline);
        assert_eq!(stream.next_token().unwrap().text, "y");
    }

    #[test]
    fn test_unterminated_nested_expression() {
        let mut stream = stream("x = !(a\n");
        take(&mut stream, 4);
        stream.command(LexerCommand::StartNestedExpr('('));
        assert_eq!(
            stream.next_token().unwrap_err(),
            LexError::UnterminatedNestedExpr {
                delimiter: '(',
                start: Position::new(1, 6)
            }
        );
    }

    #[test]
    fn test_strip_indent() {
        assert_eq!(strip_indent("    abc\n", 4), "abc\n");
        assert_eq!(strip_indent("  \n", 4), "\n");
        assert_eq!(strip_indent("\r\n", 4), "\r\n");
        assert_eq!(closer('<'), Some('>'));
        assert_eq!(closer('x'), None);
    }
}
