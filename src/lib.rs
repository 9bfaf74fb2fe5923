//! # mython
//!
//! A composable LL(1) grammar engine for the Mython language.
//!
//! A base grammar and an extension grammar are composed into one set of
//! deterministic automata; the trampoline parser walks those tables while
//! steering a cooperative lexer through Mython's quotation syntax.
//!
//! ## Testing
//!
//! Shared sample sources and helpers live in the [testing module](mython::testing).

pub mod mython;

pub use mython::error::{Error, Result};
