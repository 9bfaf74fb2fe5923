//! The parser entry points
//!
//!     A [MythonParser] owns a shared [ComposedGrammar] and the override table that goes with
//!     it. Building one is the expensive part; every parse after that only creates a token
//!     stream and a matcher stack, so a parser is meant to be built once and reused. It holds
//!     no per-parse state and can be shared between threads.
//!
//!     Every entry point takes the start symbol explicitly, which is how one grammar serves
//!     whole files (`file_input`), single expressions (`eval_input`) and interactive
//!     statements (`single_input`).

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::debug;

use super::overrides::default_overrides;
use super::trampoline::{Overrides, Trampoline};
use crate::mython::config::{LexerConfig, MythonConfig, ParseEnv, DEFAULT_START_SYMBOL};
use crate::mython::cst::Branch;
use crate::mython::error::{Error, GrammarError, Result};
use crate::mython::grammar::{
    ComposedGrammar, NonterminalId, MYTHON_EXTENSION, MYTHON_TOKENS, PYTHON27_GRAMMAR,
};
use crate::mython::lexing::{ensure_source_ends_with_newline, TokenStream};

/// File name reported for text that did not come from a file.
pub const STRING_FILENAME: &str = "<string>";

#[derive(Debug, Clone)]
pub struct MythonParser {
    grammar: Arc<ComposedGrammar>,
    overrides: Overrides,
    start: String,
    lexer: LexerConfig,
}

impl MythonParser {
    /// Python 2.7 plus the Mython extension, with default settings.
    pub fn new() -> Result<Self> {
        Ok(Self::from_grammar(Arc::new(ComposedGrammar::mython()?)))
    }

    /// Builds the grammar the configuration names. Paths that are not given fall back to the
    /// embedded grammar texts.
    pub fn with_config(config: &MythonConfig) -> Result<Self> {
        let base = match &config.parser.base_grammar {
            Some(path) => read(path)?,
            None => PYTHON27_GRAMMAR.to_string(),
        };
        let extension = match &config.parser.extension_grammar {
            Some(path) => read(path)?,
            None => MYTHON_EXTENSION.to_string(),
        };
        let start = config.parser.start_symbol.as_str();
        let grammar =
            ComposedGrammar::compose_and_generate_str(&base, &extension, start, &MYTHON_TOKENS)?;
        let mut parser = Self::from_grammar(Arc::new(grammar));
        parser.start = start.to_string();
        parser.lexer = config.lexer.clone();
        Ok(parser)
    }

    /// Wraps an existing grammar, registering the capture overrides it has nonterminals for.
    pub fn from_grammar(grammar: Arc<ComposedGrammar>) -> Self {
        let overrides = default_overrides(&grammar);
        let start = grammar
            .symbol(grammar.start())
            .map_or_else(|| DEFAULT_START_SYMBOL.to_string(), |name| name.to_string());
        MythonParser {
            grammar,
            overrides,
            start,
            lexer: LexerConfig::default(),
        }
    }

    pub fn grammar(&self) -> &Arc<ComposedGrammar> {
        &self.grammar
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    pub fn overrides_mut(&mut self) -> &mut Overrides {
        &mut self.overrides
    }

    /// Parses `source` from the parser's own start symbol.
    pub fn parse(&self, source: &str) -> Result<Branch> {
        self.parse_string_with(source, &self.start, &ParseEnv::default())
    }

    pub fn parse_string(&self, source: &str, start: &str) -> Result<Branch> {
        self.parse_string_with(source, start, &ParseEnv::default())
    }

    pub fn parse_string_with(&self, source: &str, start: &str, env: &ParseEnv) -> Result<Branch> {
        let source = ensure_source_ends_with_newline(source);
        self.parse_lines(source.split_inclusive('\n').map(String::from), start, env)
    }

    /// Parses a file. Its path is the file name in error messages unless `ParseEnv` says
    /// otherwise.
    pub fn parse_file(&self, path: impl AsRef<Path>, start: &str) -> Result<Branch> {
        let path = path.as_ref();
        let source = read(path)?;
        let env = ParseEnv::named(path.display().to_string());
        self.parse_string_with(&source, start, &env)
    }

    /// Parses text that is already split into physical lines, each with its line ending.
    pub fn parse_lines<I>(&self, lines: I, start: &str, env: &ParseEnv) -> Result<Branch>
    where
        I: IntoIterator<Item = String>,
    {
        let start_id = self.resolve_start(start)?;
        let filename = env.filename_or(STRING_FILENAME);
        debug!("parsing {} from {}", filename, start);
        let mut stream = TokenStream::from_lines(lines, env, &self.lexer);
        Trampoline::new(&self.grammar, &self.overrides)
            .run(&mut stream, start_id)
            .map_err(|failure| Error::parse(filename, failure))
    }

    fn resolve_start(&self, start: &str) -> Result<NonterminalId> {
        self.grammar
            .nonterminal(start)
            .ok_or_else(|| GrammarError::UnknownNonterminal(start.to_string()).into())
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
