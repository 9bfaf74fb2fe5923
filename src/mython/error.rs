//! Error types
//!
//!     Grammar errors are raised while a grammar is composed and its tables are built; once a
//!     [ComposedGrammar](crate::mython::grammar::ComposedGrammar) exists they can no longer
//!     happen. Lexical and syntax errors are raised while one text is parsed and abort that
//!     parse: there is no recovery and no partial tree.
//!
//!     Everything funnels into [Error] so callers handle a single type. Parse failures carry
//!     the file name they were raised for, rendered the way tracebacks render them:
//!
//!         File '<string>', line 3, column 4, unexpected 'else'.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::mython::lexing::Position;

/// Raised while parsing grammar text or building tables from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("line {line}: malformed production for '{rule}': {message}")]
    Syntax {
        rule: String,
        line: usize,
        message: String,
    },

    #[error("line {line}: rule '{rule}' is defined more than once")]
    DuplicateRule { rule: String, line: usize },

    #[error("rule '{rule}' references unknown token '{name}'")]
    UnknownToken { rule: String, name: String },

    #[error("rule '{rule}' references unknown operator {literal}")]
    UnknownOperator { rule: String, literal: String },

    #[error("extension rule '{rule}' references '{name}', which no grammar defines")]
    MissingHook { rule: String, name: String },

    #[error("'{0}' is not a nonterminal of the grammar")]
    UnknownNonterminal(String),

    #[error("recursion for rule '{0}'")]
    LeftRecursion(String),

    #[error("rule {rule} is ambiguous; {label} is in the first sets of {first} as well as {second}")]
    Ambiguous {
        rule: String,
        label: String,
        first: String,
        second: String,
    },

    #[error("rule {rule} is ambiguous in state {state}; {label} selects more than one arc")]
    AcceleratorConflict {
        rule: String,
        state: usize,
        label: String,
    },

    #[error("rule {0} is too large to encode in an accelerator table")]
    TableOverflow(String),
}

/// Raised by the token stream. Every variant knows where in the source it happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("EOF in multi-line string, starting at line {}, column {}", .start.line, .start.column)]
    UnterminatedString { start: Position },

    #[error("EOF in multi-line statement, at line {line}")]
    UnterminatedStatement { line: usize },

    #[error("unindent does not match any outer indentation level at line {line}; expected one of {expected:?}, got {found}")]
    Dedent {
        line: usize,
        expected: Vec<usize>,
        found: usize,
    },

    #[error("Empty mysuite block, starting on line {line}, runs to end of file.")]
    EmptyRawSuite { line: usize },

    #[error("Improper indentation level at line {line}; expected {expected}, got {found}.")]
    RawSuiteIndentation {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("EOF in nested expression opened by '{delimiter}' at line {}, column {}", .start.line, .start.column)]
    UnterminatedNestedExpr { delimiter: char, start: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedString { start } => *start,
            LexError::UnterminatedNestedExpr { start, .. } => *start,
            LexError::UnterminatedStatement { line }
            | LexError::Dedent { line, .. }
            | LexError::EmptyRawSuite { line }
            | LexError::RawSuiteIndentation { line, .. } => Position::new(*line, 0),
        }
    }
}

/// A token the parser could not accept, plus what it would have accepted instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Line {}, column {}, unexpected '{}'.{}", .position.line, .position.column, .text, ExpectedList(.expected))]
pub struct SyntaxError {
    pub position: Position,
    pub text: String,
    pub expected: Vec<String>,
}

struct ExpectedList<'a>(&'a [String]);

impl fmt::Display for ExpectedList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, " Expected one of: {}.", self.0.join(", "))
    }
}

/// Anything that can abort a single parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ParseFailure {
    pub fn position(&self) -> Position {
        match self {
            ParseFailure::Lex(err) => err.position(),
            ParseFailure::Syntax(err) => err.position,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("File '{filename}', {}", Lowercased(.failure))]
    Parse {
        filename: String,
        failure: ParseFailure,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    pub fn parse(filename: impl Into<String>, failure: impl Into<ParseFailure>) -> Self {
        Error::Parse {
            filename: filename.into(),
            failure: failure.into(),
        }
    }

    /// Source position of a parse failure; composition and I/O errors have none.
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Parse { failure, .. } => Some(failure.position()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ParseFailure> {
        match self {
            Error::Parse { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Renders a message with its first letter lowercased, so "Line 3" reads "line 3"
/// after a file name prefix.
struct Lowercased<'a, T: fmt::Display>(&'a T);

impl<T: fmt::Display> fmt::Display for Lowercased<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.0.to_string();
        let mut chars = message.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_lowercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
