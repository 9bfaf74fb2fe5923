//! Lexing
//!
//!     Mython source is tokenized by a Python 2 style scanner with three additions: the `!`
//!     prefix operator (BANG), and two verbatim tokens the parser asks for explicitly.
//!
//!     - MYSUITE: the raw text of the indented block (or the rest of the line) after the colon
//!       of a `my` statement.
//!     - MYEXPR: the raw text between the delimiters of a `!<...>`, `!(...)`, `!{...}` or
//!       `![...]` expression.
//!
//!     Neither can be recognized by looking at characters alone: a MYSUITE block looks like
//!     ordinary indented code and a MYEXPR body may contain anything. They are produced only
//!     while the stream is in a capture mode, which the parser sets with
//!     [LexerCommand](stream::LexerCommand) just before it needs the token.
//!
//!     Layout:
//!
//!     - [tokens]: kinds, positions and the token record.
//!     - [pseudo]: the logos scanner for a single token inside one line.
//!     - [stream]: the line-oriented state machine with indentation and capture modes.
//!
//!     [tokenize] and [scan_tokens] are standalone helpers for tools and tests. The parser
//!     drives a [TokenStream] directly.

pub mod pseudo;
pub mod stream;
pub mod tokens;

pub use stream::{closer, Expected, LexerCommand, LexerMode, TokenStream};
pub use tokens::{Position, Token, TokenKind};

use crate::mython::config::{LexerConfig, ParseEnv};
use crate::mython::error::LexError;

/// Every token up to and including ENDMARKER, NL and COMMENT included. No capture mode is
/// ever entered, so `my` blocks come out as ordinary tokens.
pub fn tokenize(
    source: &str,
    env: &ParseEnv,
    config: &LexerConfig,
) -> Result<Vec<Token>, LexError> {
    let mut stream = TokenStream::new(source, env, config);
    let mut tokens = Vec::new();
    loop {
        let token = stream.next_raw_token()?;
        let done = token.is(TokenKind::EndMarker);
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// Significant tokens of a Mython file. Every `my` switches the stream to raw-suite capture,
/// which takes effect at the colon that ends the statement header.
pub fn scan_tokens(source: &str) -> Result<Vec<Token>, LexError> {
    let source = ensure_source_ends_with_newline(source);
    let mut stream = TokenStream::new(&source, &ParseEnv::default(), &LexerConfig::default());
    let mut tokens: Vec<Token> = Vec::new();
    loop {
        let token = stream.next_token()?;
        let done = token.is(TokenKind::EndMarker);
        let opens_suite = token.is(TokenKind::Name) && token.text == "my";
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
        if opens_suite {
            stream.command(LexerCommand::StartRawSuite);
        }
    }
}

/// The scanner needs every logical line terminated, the last one included.
pub fn ensure_source_ends_with_newline(source: &str) -> String {
    if source.is_empty() || source.ends_with('\n') {
        source.to_string()
    } else {
        format!("{}\n", source)
    }
}
