//! Parsing
//!
//!     The parser is table driven: [trampoline] runs the DFAs of a
//!     [ComposedGrammar](crate::mython::grammar::ComposedGrammar) over a token stream using an
//!     explicit stack, [overrides] supplies the hand-written matchers for the nonterminals
//!     whose tokens only a capture mode of the lexer can produce, and [parser] ties both to the
//!     public entry points.
//!
//!     A parse either returns the whole tree or fails with the first error. There is no error
//!     recovery.

pub mod overrides;
pub mod parser;
pub mod trampoline;

pub use overrides::default_overrides;
pub use parser::{MythonParser, STRING_FILENAME};
pub use trampoline::{Override, Overrides, Trampoline, TreeBuilder};
