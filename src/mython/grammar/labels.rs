//! Dense label ids
//!
//!     A label is anything a DFA arc can be taken on: a token kind, a keyword, or a
//!     nonterminal. Labels are numbered in the order they are first met while walking the
//!     DFAs, with id 0 reserved for the empty label, so the numbering is fixed by the grammar
//!     text alone.
//!
//!     Keywords get their own labels even though they arrive as NAME tokens: classifying a
//!     NAME whose text is a keyword yields the keyword label, any other NAME yields the NAME
//!     label.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::mython::error::GrammarError;
use crate::mython::grammar::nfa::Term;
use crate::mython::lexing::{Token, TokenKind};

/// Nonterminal numbers start where pgen starts them, above any token id.
pub const NT_OFFSET: u16 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NonterminalId(pub u16);

impl NonterminalId {
    pub fn from_index(index: usize) -> Self {
        NonterminalId(NT_OFFSET + index as u16)
    }

    /// Position of the nonterminal in the grammar's dense tables.
    pub fn index(self) -> usize {
        usize::from(self.0.wrapping_sub(NT_OFFSET))
    }
}

impl fmt::Display for NonterminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type LabelId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    Empty,
    Token(TokenKind),
    Keyword(String),
    Nonterminal(NonterminalId),
}

impl Label {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Label::Token(_) | Label::Keyword(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelTable {
    labels: Vec<Label>,
    #[serde(skip)]
    keywords: HashMap<String, LabelId>,
    #[serde(skip)]
    tokens: HashMap<TokenKind, LabelId>,
    #[serde(skip)]
    nonterminals: HashMap<NonterminalId, LabelId>,
}

impl Default for LabelTable {
    fn default() -> Self {
        LabelTable {
            labels: vec![Label::Empty],
            keywords: HashMap::new(),
            tokens: HashMap::new(),
            nonterminals: HashMap::new(),
        }
    }
}

impl LabelTable {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.len() <= 1
    }

    pub fn get(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &Label)> {
        self.labels.iter().enumerate()
    }

    pub fn keyword(&self, text: &str) -> Option<LabelId> {
        self.keywords.get(text).copied()
    }

    pub fn token(&self, kind: TokenKind) -> Option<LabelId> {
        self.tokens.get(&kind).copied()
    }

    pub fn nonterminal(&self, id: NonterminalId) -> Option<LabelId> {
        self.nonterminals.get(&id).copied()
    }

    fn intern(&mut self, label: Label) -> LabelId {
        let existing = match &label {
            Label::Empty => Some(0),
            Label::Token(kind) => self.token(*kind),
            Label::Keyword(text) => self.keyword(text),
            Label::Nonterminal(id) => self.nonterminal(*id),
        };
        if let Some(id) = existing {
            return id;
        }
        let id = self.labels.len();
        match &label {
            Label::Token(kind) => {
                self.tokens.insert(*kind, id);
            }
            Label::Keyword(text) => {
                self.keywords.insert(text.clone(), id);
            }
            Label::Nonterminal(nonterminal) => {
                self.nonterminals.insert(*nonterminal, id);
            }
            Label::Empty => {}
        }
        self.labels.push(label);
        id
    }

    /// Resolves a grammar symbol found in `rule` to its label id, creating the label on
    /// first use. Names are nonterminals when `nonterminals` knows them, otherwise base
    /// token kinds or one of the `extra` tokens handed in by the caller.
    pub fn resolve(
        &mut self,
        term: &Term,
        rule: &str,
        nonterminals: &HashMap<String, NonterminalId>,
        extra: &[(&str, TokenKind)],
    ) -> Result<LabelId, GrammarError> {
        let label = match term {
            Term::Name(name) => {
                if let Some(id) = nonterminals.get(name) {
                    Label::Nonterminal(*id)
                } else if let Some(kind) = TokenKind::from_name(name).or_else(|| {
                    extra
                        .iter()
                        .find(|(extra_name, _)| *extra_name == name.as_str())
                        .map(|(_, kind)| *kind)
                }) {
                    Label::Token(kind)
                } else {
                    return Err(GrammarError::UnknownToken {
                        rule: rule.to_string(),
                        name: name.clone(),
                    });
                }
            }
            Term::Literal(quoted) => {
                let text = quoted.trim_matches('\'');
                let keyword_like = text
                    .chars()
                    .next()
                    .map_or(false, |first| first.is_alphabetic() || first == '_');
                if keyword_like {
                    Label::Keyword(text.to_string())
                } else if let Some(kind) = TokenKind::from_operator(text) {
                    Label::Token(kind)
                } else {
                    return Err(GrammarError::UnknownOperator {
                        rule: rule.to_string(),
                        literal: quoted.clone(),
                    });
                }
            }
        };
        Ok(self.intern(label))
    }

    /// The label a token is matched by, if the grammar has one for it.
    pub fn classify(&self, token: &Token) -> Option<LabelId> {
        if token.kind == TokenKind::Name {
            if let Some(id) = self.keyword(&token.text) {
                return Some(id);
            }
        }
        self.token(token.kind)
    }

    /// How a terminal label reads in an error message: `'if'`, `':'`, `NAME`.
    pub fn spell(&self, id: LabelId) -> String {
        match self.get(id) {
            Some(Label::Keyword(text)) => format!("'{}'", text),
            Some(Label::Token(kind)) => match kind.spelling() {
                Some(op) => format!("'{}'", op),
                None => kind.name().to_string(),
            },
            Some(Label::Nonterminal(nonterminal)) => nonterminal.to_string(),
            Some(Label::Empty) => "EMPTY".to_string(),
            None => format!("<label {}>", id),
        }
    }
}
