//! First sets and accelerator tables
//!
//!     An accelerator answers, for one DFA state, "what do I do with this lookahead label?"
//!     in a single array lookup. Terminal arcs become SHIFT actions. Nonterminal arcs are
//!     folded in through the nonterminal's first set: every terminal that can begin the
//!     nonterminal maps to a PUSH of that nonterminal, remembering the state to resume in.
//!
//!     Only the span `[lower, upper)` of labels that have an action is stored. Each entry is
//!     packed into a `u32`:
//!
//!         ABSENT                         u32::MAX
//!         SHIFT to state s               s                          (s < 2^31)
//!         PUSH nonterminal n, resume r   1 << 31 | n << 16 | r      (n < 2^15, r < 2^16)
//!
//!     where `n` is the nonterminal's dense index. A grammar that does not fit is rejected
//!     at construction time.
//!
//!     Two ways a grammar can fail to be LL(1) are caught here: two arcs out of an initial
//!     state whose first sets overlap, and, more generally, any state in which one lookahead
//!     label would select two different actions.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use serde::Serialize;

use crate::mython::error::GrammarError;
use crate::mython::grammar::labels::{Label, LabelId, LabelTable, NonterminalId};
use crate::mython::grammar::Dfa;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(usize),
    Push {
        nonterminal: NonterminalId,
        resume: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackedAction(u32);

impl PackedAction {
    pub const ABSENT: PackedAction = PackedAction(u32::MAX);
    const PUSH: u32 = 1 << 31;

    pub fn pack(action: Action) -> Option<Self> {
        match action {
            Action::Shift(state) => u32::try_from(state)
                .ok()
                .filter(|state| *state < Self::PUSH)
                .map(PackedAction),
            Action::Push {
                nonterminal,
                resume,
            } => {
                let index = u32::try_from(nonterminal.index()).ok().filter(|i| *i < 1 << 15)?;
                let resume = u32::try_from(resume).ok().filter(|r| *r < 1 << 16)?;
                Some(PackedAction(Self::PUSH | index << 16 | resume))
            }
        }
    }

    pub fn unpack(self) -> Option<Action> {
        if self == Self::ABSENT {
            None
        } else if self.0 & Self::PUSH != 0 {
            Some(Action::Push {
                nonterminal: NonterminalId::from_index(((self.0 >> 16) & 0x7fff) as usize),
                resume: (self.0 & 0xffff) as usize,
            })
        } else {
            Some(Action::Shift(self.0 as usize))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Accelerator {
    lower: LabelId,
    upper: LabelId,
    actions: Vec<PackedAction>,
}

impl Accelerator {
    pub fn lookup(&self, label: LabelId) -> Option<Action> {
        if !self.range().contains(&label) {
            return None;
        }
        self.actions.get(label - self.lower)?.unpack()
    }

    pub fn range(&self) -> Range<LabelId> {
        self.lower..self.upper
    }

    /// Every label with an action, in label order.
    pub fn entries(&self) -> impl Iterator<Item = (LabelId, Action)> + '_ {
        self.actions
            .iter()
            .enumerate()
            .filter_map(move |(offset, packed)| packed.unpack().map(|a| (self.lower + offset, a)))
    }

    pub fn is_empty(&self) -> bool {
        self.lower == self.upper
    }
}

enum First {
    Pending,
    InProgress,
    Done(BTreeSet<LabelId>),
}

fn spell(dfas: &[Dfa], labels: &LabelTable, id: LabelId) -> String {
    match labels.get(id) {
        Some(Label::Nonterminal(nonterminal)) => dfas
            .get(nonterminal.index())
            .map_or_else(|| nonterminal.to_string(), |dfa| dfa.name.to_string()),
        _ => labels.spell(id),
    }
}

/// Terminal labels each nonterminal can start with, indexed like `dfas`.
pub fn first_sets(dfas: &[Dfa], labels: &LabelTable) -> Result<Vec<BTreeSet<LabelId>>, GrammarError> {
    let mut memo: Vec<First> = dfas.iter().map(|_| First::Pending).collect();
    for index in 0..dfas.len() {
        first_of(index, dfas, labels, &mut memo)?;
    }
    Ok(memo
        .into_iter()
        .map(|first| match first {
            First::Done(set) => set,
            _ => BTreeSet::new(),
        })
        .collect())
}

fn first_of(
    index: usize,
    dfas: &[Dfa],
    labels: &LabelTable,
    memo: &mut Vec<First>,
) -> Result<BTreeSet<LabelId>, GrammarError> {
    match &memo[index] {
        First::Done(set) => return Ok(set.clone()),
        First::InProgress => return Err(GrammarError::LeftRecursion(dfas[index].name.to_string())),
        First::Pending => {}
    }
    memo[index] = First::InProgress;

    let dfa = &dfas[index];
    let mut total = BTreeSet::new();
    let mut owners: BTreeMap<LabelId, LabelId> = BTreeMap::new();
    for &(label, _) in &dfa.states[dfa.initial].arcs {
        let set = match labels.get(label) {
            Some(Label::Nonterminal(nonterminal)) => {
                first_of(nonterminal.index(), dfas, labels, memo)?
            }
            _ => BTreeSet::from([label]),
        };
        for &symbol in &set {
            match owners.get(&symbol) {
                Some(&owner) if owner != label => {
                    return Err(GrammarError::Ambiguous {
                        rule: dfa.name.to_string(),
                        label: spell(dfas, labels, symbol),
                        first: spell(dfas, labels, owner),
                        second: spell(dfas, labels, label),
                    });
                }
                _ => {
                    owners.insert(symbol, label);
                }
            }
        }
        total.extend(set);
    }

    memo[index] = First::Done(total.clone());
    Ok(total)
}

/// Fills in the accelerator of every state. First sets must already be stored.
pub fn build_accelerators(dfas: &mut [Dfa], labels: &LabelTable) -> Result<(), GrammarError> {
    let mut built = Vec::with_capacity(dfas.len());
    for dfa in dfas.iter() {
        let mut accelerators = Vec::with_capacity(dfa.states.len());
        for state in 0..dfa.states.len() {
            accelerators.push(accelerate(dfas, dfa, state, labels)?);
        }
        built.push(accelerators);
    }
    for (dfa, accelerators) in dfas.iter_mut().zip(built) {
        for (state, accelerator) in dfa.states.iter_mut().zip(accelerators) {
            state.accelerator = accelerator;
        }
    }
    Ok(())
}

fn accelerate(
    dfas: &[Dfa],
    dfa: &Dfa,
    state: usize,
    labels: &LabelTable,
) -> Result<Accelerator, GrammarError> {
    let mut actions: BTreeMap<LabelId, Action> = BTreeMap::new();
    let mut add = |label: LabelId, action: Action| match actions.get(&label) {
        Some(existing) if *existing != action => Err(GrammarError::AcceleratorConflict {
            rule: dfa.name.to_string(),
            state,
            label: spell(dfas, labels, label),
        }),
        _ => {
            actions.insert(label, action);
            Ok(())
        }
    };

    for &(label, target) in &dfa.states[state].arcs {
        match labels.get(label) {
            Some(Label::Nonterminal(nonterminal)) => {
                let first = dfas
                    .get(nonterminal.index())
                    .map(|callee| &callee.first)
                    .ok_or_else(|| GrammarError::UnknownNonterminal(nonterminal.to_string()))?;
                for &terminal in first {
                    add(
                        terminal,
                        Action::Push {
                            nonterminal: *nonterminal,
                            resume: target,
                        },
                    )?;
                }
            }
            Some(other) if other.is_terminal() => add(label, Action::Shift(target))?,
            _ => {}
        }
    }

    let (Some(&lower), Some(&last)) = (actions.keys().next(), actions.keys().next_back()) else {
        return Ok(Accelerator::default());
    };
    let upper = last + 1;
    let mut packed = vec![PackedAction::ABSENT; upper - lower];
    for (label, action) in actions {
        packed[label - lower] = PackedAction::pack(action)
            .ok_or_else(|| GrammarError::TableOverflow(dfa.name.to_string()))?;
    }
    Ok(Accelerator {
        lower,
        upper,
        actions: packed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing() {
        let push = Action::Push {
            nonterminal: NonterminalId::from_index(12),
            resume: 3,
        };
        assert_eq!(PackedAction::pack(push).unwrap().unpack(), Some(push));
        assert_eq!(
            PackedAction::pack(Action::Shift(7)).unwrap().unpack(),
            Some(Action::Shift(7))
        );
        assert_eq!(PackedAction::ABSENT.unpack(), None);
        assert_eq!(
            PackedAction::pack(Action::Push {
                nonterminal: NonterminalId::from_index(0),
                resume: 1 << 16
            }),
            None
        );
    }

    #[test]
    fn test_lookup_outside_range() {
        let accelerator = Accelerator {
            lower: 4,
            upper: 6,
            actions: vec![PackedAction::pack(Action::Shift(1)).unwrap(), PackedAction::ABSENT],
        };
        assert_eq!(accelerator.lookup(3), None);
        assert_eq!(accelerator.lookup(4), Some(Action::Shift(1)));
        assert_eq!(accelerator.lookup(5), None);
        assert_eq!(accelerator.lookup(6), None);
        assert_eq!(accelerator.entries().count(), 1);
    }
}
