//! NFA construction and grammar composition
//!
//!     Every rule is lowered into a fragment of one shared state arena: a start state, a
//!     finish state, and arcs labelled either with a grammar symbol or with nothing (an
//!     epsilon arc). The lowering is the classic pgen one, so `x*` loops back to its own start
//!     and `[x]` gets an epsilon arc straight to its finish.
//!
//!     Composition works on two such arenas. The extension's states are appended after the
//!     base's. A rule the extension defines that the base also defines is a hook: the two
//!     fragments are joined under a fresh start and a fresh finish, which accepts exactly the
//!     union of both languages. Rules only the extension defines are appended as new
//!     nonterminals, after every base rule, so base nonterminal ids never move.

use std::collections::BTreeSet;

use log::debug;

use crate::mython::error::GrammarError;
use crate::mython::grammar::source::{self, Repeat, Rhs, Rule};

/// A grammar symbol as written: a rule or token name, or a quoted literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Name(String),
    Literal(String),
}

impl Term {
    pub fn text(&self) -> &str {
        match self {
            Term::Name(text) | Term::Literal(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfaArc {
    /// `None` is an epsilon arc.
    pub label: Option<Term>,
    pub target: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NfaState {
    pub arcs: Vec<NfaArc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfaRule {
    pub name: String,
    pub line: usize,
    pub start: usize,
    pub finish: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NfaGrammar {
    pub states: Vec<NfaState>,
    pub rules: Vec<NfaRule>,
}

impl NfaGrammar {
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        Ok(Self::from_rules(&source::parse_grammar(text)?))
    }

    pub fn from_rules(rules: &[Rule]) -> Self {
        let mut grammar = NfaGrammar::default();
        for rule in rules {
            let (start, finish) = grammar.lower(&rule.rhs);
            grammar.rules.push(NfaRule {
                name: rule.name.clone(),
                line: rule.line,
                start,
                finish,
            });
        }
        grammar
    }

    pub fn rule(&self, name: &str) -> Option<&NfaRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.name == name)
    }

    fn new_state(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    fn add_arc(&mut self, from: usize, target: usize, label: Option<Term>) {
        self.states[from].arcs.push(NfaArc { label, target });
    }

    fn lower(&mut self, rhs: &Rhs) -> (usize, usize) {
        match rhs {
            Rhs::Alternatives(alternatives) => {
                let start = self.new_state();
                let finish = self.new_state();
                for alternative in alternatives {
                    let (a, z) = self.lower(alternative);
                    self.add_arc(start, a, None);
                    self.add_arc(z, finish, None);
                }
                (start, finish)
            }
            Rhs::Sequence(items) => {
                let mut items = items.iter();
                let Some(first) = items.next() else {
                    let state = self.new_state();
                    return (state, state);
                };
                let (start, mut finish) = self.lower(first);
                for item in items {
                    let (a, z) = self.lower(item);
                    self.add_arc(finish, a, None);
                    finish = z;
                }
                (start, finish)
            }
            Rhs::Optional(inner) => {
                let (start, finish) = self.lower(inner);
                self.add_arc(start, finish, None);
                (start, finish)
            }
            Rhs::Repeat(inner, Repeat::OneOrMore) => {
                let (start, finish) = self.lower(inner);
                self.add_arc(finish, start, None);
                (start, finish)
            }
            Rhs::Repeat(inner, Repeat::ZeroOrMore) => {
                let (start, finish) = self.lower(inner);
                self.add_arc(finish, start, None);
                (start, start)
            }
            Rhs::Name(name) => self.lower_term(Term::Name(name.clone())),
            Rhs::Literal(literal) => self.lower_term(Term::Literal(literal.clone())),
        }
    }

    fn lower_term(&mut self, term: Term) -> (usize, usize) {
        let start = self.new_state();
        let finish = self.new_state();
        self.add_arc(start, finish, Some(term));
        (start, finish)
    }

    /// States reachable from `seeds` through epsilon arcs, seeds included.
    pub fn closure(&self, seeds: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut closed = BTreeSet::new();
        let mut todo: Vec<usize> = seeds.into_iter().collect();
        while let Some(state) = todo.pop() {
            if !closed.insert(state) {
                continue;
            }
            for arc in &self.states[state].arcs {
                if arc.label.is_none() {
                    todo.push(arc.target);
                }
            }
        }
        closed
    }

    /// Names on labelled arcs reachable from a rule's start state.
    fn referenced_names(&self, rule: &NfaRule) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut todo = vec![rule.start];
        let mut names = Vec::new();
        while let Some(state) = todo.pop() {
            if !seen.insert(state) {
                continue;
            }
            for arc in &self.states[state].arcs {
                if let Some(Term::Name(name)) = &arc.label {
                    names.push(name.as_str());
                }
                todo.push(arc.target);
            }
        }
        names
    }
}

/// Whether a name follows the nonterminal convention (token kinds are upper case).
pub fn is_nonterminal_name(name: &str) -> bool {
    name.chars()
        .next()
        .map_or(false, |first| first.is_ascii_lowercase())
}

/// Merges an extension into a base grammar. `start` must name a nonterminal of the result.
pub fn compose(
    base: &NfaGrammar,
    extension: &NfaGrammar,
    start: &str,
) -> Result<NfaGrammar, GrammarError> {
    let mut merged = base.clone();
    let offset = merged.states.len();
    merged
        .states
        .extend(extension.states.iter().map(|state| NfaState {
            arcs: state
                .arcs
                .iter()
                .map(|arc| NfaArc {
                    label: arc.label.clone(),
                    target: arc.target + offset,
                })
                .collect(),
        }));

    let mut hooks = 0;
    for rule in &extension.rules {
        let (ext_start, ext_finish) = (rule.start + offset, rule.finish + offset);
        match merged.rule_index(&rule.name) {
            Some(index) => {
                let (base_start, base_finish) = (merged.rules[index].start, merged.rules[index].finish);
                let start = merged.new_state();
                let finish = merged.new_state();
                merged.add_arc(start, base_start, None);
                merged.add_arc(start, ext_start, None);
                merged.add_arc(base_finish, finish, None);
                merged.add_arc(ext_finish, finish, None);
                merged.rules[index].start = start;
                merged.rules[index].finish = finish;
                hooks += 1;
            }
            None => merged.rules.push(NfaRule {
                name: rule.name.clone(),
                line: rule.line,
                start: ext_start,
                finish: ext_finish,
            }),
        }
    }

    for rule in &extension.rules {
        for name in extension.referenced_names(rule) {
            if is_nonterminal_name(name) && merged.rule(name).is_none() {
                return Err(GrammarError::MissingHook {
                    rule: rule.name.clone(),
                    name: name.to_string(),
                });
            }
        }
    }

    if merged.rule(start).is_none() {
        return Err(GrammarError::UnknownNonterminal(start.to_string()));
    }

    debug!(
        "composed grammar: {} base rules, {} hooks, {} new rules",
        base.rules.len(),
        hooks,
        extension.rules.len() - hooks
    );
    Ok(merged)
}
