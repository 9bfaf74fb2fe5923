//! Main module for mython library functionality

pub mod config;
pub mod cst;
pub mod error;
pub mod grammar;
pub mod lexing;
pub mod parsing;
pub mod testing;

pub use cst::{Branch, Node, Symbol};
pub use grammar::ComposedGrammar;
pub use parsing::MythonParser;
