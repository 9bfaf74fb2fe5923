//! Configuration
//!
//!     Three small structs cover everything that can be tuned:
//!
//!     - [LexerConfig]: how the token stream measures indentation.
//!     - [ParserConfig]: which grammar files to compose and which nonterminal to start from.
//!     - [ParseEnv]: per-call placement of the text inside a larger file (first line number,
//!       column offset, file name used in error messages).
//!
//!     All of them default sensibly and deserialize from YAML with missing fields falling back
//!     to those defaults, so a config file only has to name what it changes:
//!
//!         parser:
//!           start_symbol: eval_input
//!         lexer:
//!           tab_size: 4

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::mython::error::{Error, Result};

pub const DEFAULT_TAB_SIZE: usize = 8;
pub const DEFAULT_START_SYMBOL: &str = "file_input";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerConfig {
    pub tab_size: usize,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            tab_size: DEFAULT_TAB_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub start_symbol: String,
    /// Replaces the embedded Python 2.7 base grammar.
    pub base_grammar: Option<PathBuf>,
    /// Replaces the embedded Mython extension grammar.
    pub extension_grammar: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            start_symbol: DEFAULT_START_SYMBOL.to_string(),
            base_grammar: None,
            extension_grammar: None,
        }
    }
}

/// Where a piece of text sits in its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseEnv {
    /// Falls back to `<string>` for strings and to the path for files.
    pub filename: Option<String>,
    pub lineno: usize,
    pub column_offset: usize,
}

impl Default for ParseEnv {
    fn default() -> Self {
        ParseEnv {
            filename: None,
            lineno: 1,
            column_offset: 0,
        }
    }
}

impl ParseEnv {
    pub fn named(filename: impl Into<String>) -> Self {
        ParseEnv {
            filename: Some(filename.into()),
            ..ParseEnv::default()
        }
    }

    pub fn at(mut self, lineno: usize, column_offset: usize) -> Self {
        self.lineno = lineno;
        self.column_offset = column_offset;
        self
    }

    /// Value the line counter holds before the first line is read.
    pub fn line_offset(&self) -> usize {
        self.lineno.saturating_sub(1)
    }

    pub fn filename_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.filename.as_deref().unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MythonConfig {
    pub lexer: LexerConfig,
    pub parser: ParserConfig,
}

impl MythonConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}
