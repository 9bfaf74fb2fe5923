//! Subset construction
//!
//!     Each rule's NFA fragment becomes its own DFA. A DFA state stands for the epsilon
//!     closure of a set of NFA states; two states are the same state exactly when those sets
//!     are equal. Arcs are kept in a `BTreeMap` keyed by symbol so that state numbering, and
//!     with it every table built later, does not depend on hash order.
//!
//!     After construction, states that are indistinguishable (same finality, same arcs) are
//!     merged, repeatedly, until nothing changes.

use std::collections::{BTreeMap, BTreeSet};

use crate::mython::grammar::nfa::{NfaGrammar, NfaRule, Term};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfaState {
    pub nfa_states: BTreeSet<usize>,
    pub is_final: bool,
    pub arcs: BTreeMap<Term, usize>,
}

/// Builds the DFA for one rule. State 0 is the initial state.
pub fn make_dfa(nfa: &NfaGrammar, rule: &NfaRule) -> Vec<DfaState> {
    let initial = nfa.closure([rule.start]);
    let mut states = vec![DfaState {
        is_final: initial.contains(&rule.finish),
        nfa_states: initial,
        arcs: BTreeMap::new(),
    }];

    let mut index = 0;
    while index < states.len() {
        let mut moves: BTreeMap<Term, BTreeSet<usize>> = BTreeMap::new();
        for &state in &states[index].nfa_states {
            for arc in &nfa.states[state].arcs {
                if let Some(label) = &arc.label {
                    moves
                        .entry(label.clone())
                        .or_default()
                        .extend(nfa.closure([arc.target]));
                }
            }
        }
        for (label, targets) in moves {
            let target = match states.iter().position(|state| state.nfa_states == targets) {
                Some(existing) => existing,
                None => {
                    states.push(DfaState {
                        is_final: targets.contains(&rule.finish),
                        nfa_states: targets,
                        arcs: BTreeMap::new(),
                    });
                    states.len() - 1
                }
            };
            states[index].arcs.insert(label, target);
        }
        index += 1;
    }
    states
}

/// Merges equivalent states in place.
pub fn simplify(states: &mut Vec<DfaState>) {
    loop {
        let Some((keep, drop)) = find_duplicate(states) else {
            return;
        };
        states.remove(drop);
        for state in states.iter_mut() {
            for target in state.arcs.values_mut() {
                if *target == drop {
                    *target = keep;
                } else if *target > drop {
                    *target -= 1;
                }
            }
        }
    }
}

fn find_duplicate(states: &[DfaState]) -> Option<(usize, usize)> {
    for (i, first) in states.iter().enumerate() {
        for (j, second) in states.iter().enumerate().skip(i + 1) {
            if first.is_final == second.is_final && first.arcs == second.arcs {
                return Some((i, j));
            }
        }
    }
    None
}
