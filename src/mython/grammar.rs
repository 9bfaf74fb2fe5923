//! Grammar composition and table generation
//!
//!     A [ComposedGrammar] is the immutable product of this module: one DFA per nonterminal,
//!     the dense label table, and an accelerator per DFA state. It is built once and shared
//!     by reference (usually behind an `Arc`) with every parse.
//!
//!     The pipeline, one child module per stage:
//!
//!         grammar text --source--> rules --nfa--> NFA --compose--> merged NFA
//!             --dfa--> DFAs --labels--> labelled DFAs --accelerators--> ComposedGrammar
//!
//!     The default grammar is Python 2.7's composed with the Mython extension. Both texts are
//!     embedded in the crate, so [ComposedGrammar::mython] needs no file access.
//!
//! Extension tokens
//!
//!     The base grammar can only name token kinds from the base token space. Kinds an
//!     extension introduces (BANG, MYEXPR, MYSUITE for Mython) are handed to generation as
//!     `(name, kind)` pairs; see [MYTHON_TOKENS].

pub mod accelerators;
pub mod dfa;
pub mod labels;
pub mod nfa;
pub mod source;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

pub use accelerators::{Accelerator, Action, PackedAction};
pub use labels::{Label, LabelId, LabelTable, NonterminalId, NT_OFFSET};
pub use nfa::{compose, NfaGrammar, Term};

use crate::mython::error::{Error, GrammarError, Result};
use crate::mython::lexing::{Token, TokenKind};

pub const PYTHON27_GRAMMAR: &str = include_str!("../../grammars/python27/Grammar");
pub const MYTHON_EXTENSION: &str = include_str!("../../grammars/mython/Extension");
pub const MYTHON_TOKENS: [(&str, TokenKind); 3] = [
    ("BANG", TokenKind::Bang),
    ("MYEXPR", TokenKind::MyExpr),
    ("MYSUITE", TokenKind::MySuite),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    pub arcs: Vec<(LabelId, usize)>,
    pub accept: bool,
    pub accelerator: Accelerator,
}

impl State {
    /// Accepting with nowhere left to go: the matcher can finish without looking ahead.
    pub fn is_terminal(&self) -> bool {
        self.accept && self.arcs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dfa {
    pub id: NonterminalId,
    pub name: Arc<str>,
    pub initial: usize,
    pub states: Vec<State>,
    pub first: BTreeSet<LabelId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposedGrammar {
    dfas: Vec<Dfa>,
    labels: LabelTable,
    start: NonterminalId,
    #[serde(skip)]
    by_name: HashMap<Arc<str>, NonterminalId>,
}

impl ComposedGrammar {
    /// Builds the tables for every rule of `nfa`. `start` becomes the default entry point.
    pub fn generate(
        nfa: &NfaGrammar,
        start: &str,
        extra: &[(&str, TokenKind)],
    ) -> std::result::Result<Self, GrammarError> {
        if nfa.rules.len() >= usize::from(u16::MAX - NT_OFFSET) {
            return Err(GrammarError::TableOverflow(start.to_string()));
        }
        let nonterminals: HashMap<String, NonterminalId> = nfa
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (rule.name.clone(), NonterminalId::from_index(index)))
            .collect();
        let start_id = nonterminals
            .get(start)
            .copied()
            .ok_or_else(|| GrammarError::UnknownNonterminal(start.to_string()))?;

        let mut labels = LabelTable::default();
        let mut dfas = Vec::with_capacity(nfa.rules.len());
        for (index, rule) in nfa.rules.iter().enumerate() {
            let mut raw = dfa::make_dfa(nfa, rule);
            dfa::simplify(&mut raw);
            let mut states = Vec::with_capacity(raw.len());
            for raw_state in &raw {
                let mut arcs: Vec<(LabelId, usize)> = Vec::with_capacity(raw_state.arcs.len());
                for (term, target) in &raw_state.arcs {
                    let label = labels.resolve(term, &rule.name, &nonterminals, extra)?;
                    if !arcs.contains(&(label, *target)) {
                        arcs.push((label, *target));
                    }
                }
                states.push(State {
                    arcs,
                    accept: raw_state.is_final,
                    accelerator: Accelerator::default(),
                });
            }
            dfas.push(Dfa {
                id: NonterminalId::from_index(index),
                name: Arc::from(rule.name.as_str()),
                initial: 0,
                states,
                first: BTreeSet::new(),
            });
        }

        let firsts = accelerators::first_sets(&dfas, &labels)?;
        for (dfa, first) in dfas.iter_mut().zip(firsts) {
            dfa.first = first;
        }
        accelerators::build_accelerators(&mut dfas, &labels)?;

        let by_name = dfas
            .iter()
            .map(|dfa| (Arc::clone(&dfa.name), dfa.id))
            .collect();
        debug!(
            "generated grammar: {} nonterminals, {} labels, {} states",
            dfas.len(),
            labels.len(),
            dfas.iter().map(|dfa| dfa.states.len()).sum::<usize>()
        );
        Ok(ComposedGrammar {
            dfas,
            labels,
            start: start_id,
            by_name,
        })
    }

    pub fn compose_and_generate_str(
        base: &str,
        extension: &str,
        start: &str,
        extra: &[(&str, TokenKind)],
    ) -> std::result::Result<Self, GrammarError> {
        let base = NfaGrammar::parse(base)?;
        let extension = NfaGrammar::parse(extension)?;
        let merged = compose(&base, &extension, start)?;
        Self::generate(&merged, start, extra)
    }

    /// Reads the base grammar from disk and composes the extension text into it.
    pub fn compose_and_generate(
        base_path: impl AsRef<Path>,
        extension: &str,
        start: &str,
        extra: &[(&str, TokenKind)],
    ) -> Result<Self> {
        let path = base_path.as_ref();
        let base = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::compose_and_generate_str(&base, extension, start, extra)?)
    }

    /// Python 2.7 with the Mython extension, entered at `file_input` by default.
    pub fn mython() -> std::result::Result<Self, GrammarError> {
        Self::compose_and_generate_str(
            PYTHON27_GRAMMAR,
            MYTHON_EXTENSION,
            "file_input",
            &MYTHON_TOKENS,
        )
    }

    pub fn start(&self) -> NonterminalId {
        self.start
    }

    pub fn dfas(&self) -> &[Dfa] {
        &self.dfas
    }

    pub fn dfa(&self, id: NonterminalId) -> Option<&Dfa> {
        self.dfas.get(id.0.checked_sub(NT_OFFSET)? as usize)
    }

    pub fn nonterminal(&self, name: &str) -> Option<NonterminalId> {
        self.by_name.get(name).copied()
    }

    pub fn symbol(&self, id: NonterminalId) -> Option<&Arc<str>> {
        self.dfa(id).map(|dfa| &dfa.name)
    }

    pub fn nonterminal_count(&self) -> usize {
        self.dfas.len()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn classify(&self, token: &Token) -> Option<LabelId> {
        self.labels.classify(token)
    }

    /// Spellings of every lookahead the given state has an action for.
    pub fn expected(&self, id: NonterminalId, state: usize) -> Vec<String> {
        let Some(state) = self.dfa(id).and_then(|dfa| dfa.states.get(state)) else {
            return Vec::new();
        };
        let mut spelled: Vec<String> = Vec::new();
        for (label, _) in state.accelerator.entries() {
            let spelling = self.labels.spell(label);
            if !spelled.contains(&spelling) {
                spelled.push(spelling);
            }
        }
        spelled
    }
}
