//! Token kinds and the token record
//!
//!     Token kinds follow the classic Python numbering (ENDMARKER = 0 up to AT = 50, then OP,
//!     ERRORTOKEN, COMMENT and NL). The three Mython kinds are appended after that space so
//!     a grammar can only reach them when they are handed to composition explicitly.
//!
//!     Operators are never reported as a generic OP: the scanner resolves each spelling to its
//!     own kind through [TokenKind::from_operator], which is also what grammar literals such
//!     as `'('` resolve through.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// A (line, column) pair. Lines count from 1, columns from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.line)?;
        tuple.serialize_element(&self.column)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum TokenKind {
    EndMarker = 0,
    Name,
    Number,
    String,
    Newline,
    Indent,
    Dedent,
    LPar,
    RPar,
    LSqb,
    RSqb,
    Colon,
    Comma,
    Semi,
    Plus,
    Minus,
    Star,
    Slash,
    VBar,
    Amper,
    Less,
    Greater,
    Equal,
    Dot,
    Percent,
    BackQuote,
    LBrace,
    RBrace,
    EqEqual,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Tilde,
    Circumflex,
    LeftShift,
    RightShift,
    DoubleStar,
    PlusEqual,
    MinEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmperEqual,
    VBarEqual,
    CircumflexEqual,
    LeftShiftEqual,
    RightShiftEqual,
    DoubleStarEqual,
    DoubleSlash,
    DoubleSlashEqual,
    At,
    Op,
    ErrorToken,
    Comment,
    Nl,
    Bang,
    MyExpr,
    MySuite,
}

use TokenKind as K;

const KINDS: [(TokenKind, &str); 58] = [
    (K::EndMarker, "ENDMARKER"),
    (K::Name, "NAME"),
    (K::Number, "NUMBER"),
    (K::String, "STRING"),
    (K::Newline, "NEWLINE"),
    (K::Indent, "INDENT"),
    (K::Dedent, "DEDENT"),
    (K::LPar, "LPAR"),
    (K::RPar, "RPAR"),
    (K::LSqb, "LSQB"),
    (K::RSqb, "RSQB"),
    (K::Colon, "COLON"),
    (K::Comma, "COMMA"),
    (K::Semi, "SEMI"),
    (K::Plus, "PLUS"),
    (K::Minus, "MINUS"),
    (K::Star, "STAR"),
    (K::Slash, "SLASH"),
    (K::VBar, "VBAR"),
    (K::Amper, "AMPER"),
    (K::Less, "LESS"),
    (K::Greater, "GREATER"),
    (K::Equal, "EQUAL"),
    (K::Dot, "DOT"),
    (K::Percent, "PERCENT"),
    (K::BackQuote, "BACKQUOTE"),
    (K::LBrace, "LBRACE"),
    (K::RBrace, "RBRACE"),
    (K::EqEqual, "EQEQUAL"),
    (K::NotEqual, "NOTEQUAL"),
    (K::LessEqual, "LESSEQUAL"),
    (K::GreaterEqual, "GREATEREQUAL"),
    (K::Tilde, "TILDE"),
    (K::Circumflex, "CIRCUMFLEX"),
    (K::LeftShift, "LEFTSHIFT"),
    (K::RightShift, "RIGHTSHIFT"),
    (K::DoubleStar, "DOUBLESTAR"),
    (K::PlusEqual, "PLUSEQUAL"),
    (K::MinEqual, "MINEQUAL"),
    (K::StarEqual, "STAREQUAL"),
    (K::SlashEqual, "SLASHEQUAL"),
    (K::PercentEqual, "PERCENTEQUAL"),
    (K::AmperEqual, "AMPEREQUAL"),
    (K::VBarEqual, "VBAREQUAL"),
    (K::CircumflexEqual, "CIRCUMFLEXEQUAL"),
    (K::LeftShiftEqual, "LEFTSHIFTEQUAL"),
    (K::RightShiftEqual, "RIGHTSHIFTEQUAL"),
    (K::DoubleStarEqual, "DOUBLESTAREQUAL"),
    (K::DoubleSlash, "DOUBLESLASH"),
    (K::DoubleSlashEqual, "DOUBLESLASHEQUAL"),
    (K::At, "AT"),
    (K::Op, "OP"),
    (K::ErrorToken, "ERRORTOKEN"),
    (K::Comment, "COMMENT"),
    (K::Nl, "NL"),
    (K::Bang, "BANG"),
    (K::MyExpr, "MYEXPR"),
    (K::MySuite, "MYSUITE"),
];

const OPERATORS: [(&str, TokenKind); 46] = [
    ("(", K::LPar),
    (")", K::RPar),
    ("[", K::LSqb),
    ("]", K::RSqb),
    (":", K::Colon),
    (",", K::Comma),
    (";", K::Semi),
    ("+", K::Plus),
    ("-", K::Minus),
    ("*", K::Star),
    ("/", K::Slash),
    ("|", K::VBar),
    ("&", K::Amper),
    ("<", K::Less),
    (">", K::Greater),
    ("=", K::Equal),
    (".", K::Dot),
    ("%", K::Percent),
    ("`", K::BackQuote),
    ("{", K::LBrace),
    ("}", K::RBrace),
    ("@", K::At),
    ("==", K::EqEqual),
    ("!=", K::NotEqual),
    ("<>", K::NotEqual),
    ("<=", K::LessEqual),
    (">=", K::GreaterEqual),
    ("~", K::Tilde),
    ("^", K::Circumflex),
    ("<<", K::LeftShift),
    (">>", K::RightShift),
    ("**", K::DoubleStar),
    ("+=", K::PlusEqual),
    ("-=", K::MinEqual),
    ("*=", K::StarEqual),
    ("/=", K::SlashEqual),
    ("%=", K::PercentEqual),
    ("&=", K::AmperEqual),
    ("|=", K::VBarEqual),
    ("^=", K::CircumflexEqual),
    ("<<=", K::LeftShiftEqual),
    (">>=", K::RightShiftEqual),
    ("**=", K::DoubleStarEqual),
    ("//", K::DoubleSlash),
    ("//=", K::DoubleSlashEqual),
    ("!", K::Bang),
];

impl TokenKind {
    /// First id past the kinds a base grammar can name on its own.
    pub const BASE_TOKEN_SPACE: u16 = K::Bang as u16;

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        KINDS[self as usize].1
    }

    /// Resolves a token name from the base token space. The Mython kinds are
    /// not found here; they only become nameable through composition.
    pub fn from_name(name: &str) -> Option<TokenKind> {
        KINDS
            .iter()
            .find(|(kind, kind_name)| kind.id() < Self::BASE_TOKEN_SPACE && *kind_name == name)
            .map(|(kind, _)| *kind)
    }

    /// Resolves an operator spelling. `!` is left out: BANG is an extension token and has to
    /// be named, not quoted.
    pub fn from_operator(spelling: &str) -> Option<TokenKind> {
        OPERATORS
            .iter()
            .find(|(op, _)| *op == spelling)
            .map(|(_, kind)| *kind)
            .filter(|kind| *kind != K::Bang)
    }

    /// The canonical spelling of an operator kind.
    pub fn spelling(self) -> Option<&'static str> {
        OPERATORS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(op, _)| *op)
    }

    pub fn is_operator(self) -> bool {
        (K::LPar as u16..=K::At as u16).contains(&self.id())
    }

    /// NL and COMMENT never reach the parser.
    pub fn is_trivia(self) -> bool {
        matches!(self, K::Nl | K::Comment)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TokenKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One scanned token. The source line is shared between every token cut from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: Position,
    pub end: Position,
    pub line: Arc<str>,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        start: Position,
        end: Position,
        line: Arc<str>,
    ) -> Self {
        Token {
            kind,
            text: text.into(),
            start,
            end,
            line,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {}-{}",
            self.kind, self.text, self.start, self.end
        )
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&self.kind)?;
        tuple.serialize_element(&self.text)?;
        tuple.serialize_element(&self.start)?;
        tuple.serialize_element(&self.end)?;
        tuple.serialize_element(&*self.line)?;
        tuple.end()
    }
}
