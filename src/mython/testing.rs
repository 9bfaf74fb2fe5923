//! Test harness over the sample files
//!
//!     Tests should exercise real Mython text, and the same few texts over and over, rather
//!     than strings typed inline at every call site. The samples live in `samples/` at the crate
//!     root and are numbered: `010-mysuite.my` is sample 10. A test names a sample by number
//!     and asks for it in the form it needs:
//!
//!     ```rust,ignore
//!     use mython::mython::testing::Samples;
//!
//!     let source = Samples::get(10).source();
//!     let tokens = Samples::get(10).tokens();
//!     let tree = Samples::get(10).parse();
//!     let expr = Samples::get(20).parse_from("eval_input");
//!     ```
//!
//!     Every loader method panics with the sample's path when loading or parsing fails, so a
//!     test reads as the happy path. Use [SampleLoader::try_parse] to test failures.
//!
//!     All parses share one [MythonParser], built the first time it is needed.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::mython::cst::Branch;
use crate::mython::error::Result;
use crate::mython::lexing::{scan_tokens, Token};
use crate::mython::parsing::MythonParser;

static PARSER: OnceCell<MythonParser> = OnceCell::new();

/// The parser every test helper uses.
pub fn default_parser() -> &'static MythonParser {
    match PARSER.get_or_try_init(MythonParser::new) {
        Ok(parser) => parser,
        Err(err) => panic!("the default grammar does not build: {}", err),
    }
}

/// One token per line, in `Token`'s display form.
pub fn render_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| token.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Samples;

impl Samples {
    pub fn dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("samples")
    }

    /// Path of sample `number`, found by its three digit prefix.
    pub fn find(number: usize) -> Option<PathBuf> {
        let prefix = format!("{:03}-", number);
        let mut found: Vec<PathBuf> = fs::read_dir(Self::dir())
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| name.starts_with(&prefix))
            })
            .collect();
        found.sort();
        found.into_iter().next()
    }

    pub fn get(number: usize) -> SampleLoader {
        match Self::find(number) {
            Some(path) => SampleLoader { path },
            None => panic!("no sample numbered {} in {}", number, Self::dir().display()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> SampleLoader {
        SampleLoader { path: path.into() }
    }

    /// Every sample, in number order.
    pub fn all() -> Vec<SampleLoader> {
        let mut paths: Vec<PathBuf> = fs::read_dir(Self::dir())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().map_or(false, |ext| ext == "my"))
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths.into_iter().map(|path| SampleLoader { path }).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SampleLoader {
    path: PathBuf,
}

impl SampleLoader {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> String {
        match fs::read_to_string(&self.path) {
            Ok(source) => source,
            Err(err) => panic!("cannot read {}: {}", self.path.display(), err),
        }
    }

    /// Significant tokens, with raw-suite capture after `my NAME`.
    pub fn tokens(&self) -> Vec<Token> {
        match scan_tokens(&self.source()) {
            Ok(tokens) => tokens,
            Err(err) => panic!("cannot tokenize {}: {}", self.path.display(), err),
        }
    }

    pub fn parse(&self) -> Branch {
        self.parse_from(default_parser().start_symbol())
    }

    pub fn parse_from(&self, start: &str) -> Branch {
        match self.try_parse_from(start) {
            Ok(tree) => tree,
            Err(err) => panic!("cannot parse {}: {}", self.path.display(), err),
        }
    }

    pub fn try_parse(&self) -> Result<Branch> {
        self.try_parse_from(default_parser().start_symbol())
    }

    pub fn try_parse_from(&self, start: &str) -> Result<Branch> {
        default_parser().parse_file(&self.path, start)
    }
}
