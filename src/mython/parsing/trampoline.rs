//! The matcher stack
//!
//!     A matcher is one nonterminal's DFA plus the state it is in. Matching a nested
//!     nonterminal does not recurse: the current matcher records the state to resume in and a
//!     new matcher is pushed on an explicit stack. Program nesting depth therefore costs heap,
//!     not native stack.
//!
//!     Each turn looks at the top matcher, classifies the lookahead and asks the state's
//!     accelerator what to do:
//!
//!     - SHIFT: the token becomes a leaf of the current node and the matcher moves on. If the
//!       new state accepts and has no arcs the matcher is done at once, without looking at
//!       another token.
//!     - PUSH: the matcher is parked at the resume state and the callee is started, either a
//!       fresh matcher or, when one is registered, an override that consumes the callee's
//!       tokens itself.
//!     - nothing: an accepting state finishes its matcher, any other state is a syntax error.
//!
//!     The bottom of the stack is the `start` matcher, which only calls the chosen start
//!     symbol. Parsing ends when it is popped; tokens after the start symbol completes are
//!     never read.

use std::fmt;

use log::{debug, trace};

use crate::mython::cst::{Branch, Node, Symbol};
use crate::mython::error::{GrammarError, ParseFailure, SyntaxError};
use crate::mython::grammar::{Action, ComposedGrammar, NonterminalId};
use crate::mython::lexing::{Token, TokenStream};

/// Collects the tree while the matchers run. The root is always `start`.
#[derive(Debug)]
pub struct TreeBuilder {
    open: Vec<Branch>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        TreeBuilder {
            open: vec![Branch::new(Symbol::start())],
        }
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: Symbol) {
        self.open.push(Branch::new(symbol));
    }

    /// Closes the innermost node. The root is never closed here.
    pub fn pop(&mut self) {
        if self.open.len() > 1 {
            if let Some(branch) = self.open.pop() {
                self.current().children.push(Node::Branch(branch));
            }
        }
    }

    pub fn leaf(&mut self, token: Token) {
        self.current().children.push(Node::Leaf(token));
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn current(&mut self) -> &mut Branch {
        if self.open.is_empty() {
            self.open.push(Branch::new(Symbol::start()));
        }
        let last = self.open.len() - 1;
        &mut self.open[last]
    }

    /// Closes whatever is still open and returns the root.
    pub fn finish(mut self) -> Branch {
        while self.open.len() > 1 {
            self.pop();
        }
        self.open
            .pop()
            .unwrap_or_else(|| Branch::new(Symbol::start()))
    }
}

/// A hand-written matcher. It is entered with the callee's first token as lookahead and must
/// open and close the callee's node itself.
pub type Override =
    fn(&mut TokenStream, &mut TreeBuilder, Symbol) -> Result<(), ParseFailure>;

/// Overrides indexed by dense nonterminal index.
#[derive(Clone)]
pub struct Overrides {
    table: Vec<Option<Override>>,
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<usize> = self
            .table
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|_| index))
            .collect();
        f.debug_struct("Overrides")
            .field("registered", &registered)
            .finish()
    }
}

impl Overrides {
    pub fn new(grammar: &ComposedGrammar) -> Self {
        Overrides {
            table: vec![None; grammar.nonterminal_count()],
        }
    }

    pub fn register(
        &mut self,
        grammar: &ComposedGrammar,
        name: &str,
        matcher: Override,
    ) -> Result<(), GrammarError> {
        let id = grammar
            .nonterminal(name)
            .ok_or_else(|| GrammarError::UnknownNonterminal(name.to_string()))?;
        self.register_id(id, matcher);
        Ok(())
    }

    pub fn register_id(&mut self, id: NonterminalId, matcher: Override) {
        if let Some(slot) = self.table.get_mut(id.index()) {
            *slot = Some(matcher);
        }
    }

    pub fn get(&self, id: NonterminalId) -> Option<Override> {
        self.table.get(id.index()).copied().flatten()
    }

    pub fn get_by_name(&self, grammar: &ComposedGrammar, name: &str) -> Option<Override> {
        self.get(grammar.nonterminal(name)?)
    }

    pub fn len(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matcher {
    Start { start: NonterminalId, entered: bool },
    Dfa { dfa: NonterminalId, state: usize },
}

pub struct Trampoline<'g> {
    grammar: &'g ComposedGrammar,
    overrides: &'g Overrides,
}

impl<'g> Trampoline<'g> {
    pub fn new(grammar: &'g ComposedGrammar, overrides: &'g Overrides) -> Self {
        Trampoline { grammar, overrides }
    }

    pub fn run(&self, stream: &mut TokenStream, start: NonterminalId) -> Result<Branch, ParseFailure> {
        let mut tree = TreeBuilder::new();
        let mut stack = vec![Matcher::Start {
            start,
            entered: false,
        }];
        while let Some(top) = stack.last().copied() {
            match top {
                Matcher::Start {
                    start,
                    entered: false,
                } => {
                    set_top(&mut stack, Matcher::Start {
                        start,
                        entered: true,
                    });
                    self.enter(start, stream, &mut tree, &mut stack)?;
                }
                Matcher::Start { entered: true, .. } => {
                    stack.pop();
                }
                Matcher::Dfa { dfa, state } => {
                    self.resume(dfa, state, stream, &mut tree, &mut stack)?;
                }
            }
        }
        Ok(tree.finish())
    }

    fn symbol(&self, id: NonterminalId) -> Symbol {
        let name = self
            .grammar
            .symbol(id)
            .cloned()
            .unwrap_or_else(|| id.to_string().into());
        Symbol::nonterminal(id, name)
    }

    fn enter(
        &self,
        id: NonterminalId,
        stream: &mut TokenStream,
        tree: &mut TreeBuilder,
        stack: &mut Vec<Matcher>,
    ) -> Result<(), ParseFailure> {
        let symbol = self.symbol(id);
        if let Some(matcher) = self.overrides.get(id) {
            debug!("override for {}", symbol.name);
            return matcher(stream, tree, symbol);
        }
        let initial = self.grammar.dfa(id).map_or(0, |dfa| dfa.initial);
        trace!("push {}", symbol.name);
        tree.push(symbol);
        stack.push(Matcher::Dfa {
            dfa: id,
            state: initial,
        });
        Ok(())
    }

    fn resume(
        &self,
        id: NonterminalId,
        state: usize,
        stream: &mut TokenStream,
        tree: &mut TreeBuilder,
        stack: &mut Vec<Matcher>,
    ) -> Result<(), ParseFailure> {
        let Some(dfa) = self.grammar.dfa(id) else {
            finish(stack, tree, "?");
            return Ok(());
        };
        let Some(current) = dfa.states.get(state) else {
            finish(stack, tree, &dfa.name);
            return Ok(());
        };
        let label = {
            let token = stream.lookahead()?;
            self.grammar.classify(token)
        };

        match label.and_then(|label| current.accelerator.lookup(label)) {
            Some(Action::Shift(next)) => {
                let token = stream.next_token()?;
                trace!("shift {} in {}, state {} -> {}", token, dfa.name, state, next);
                tree.leaf(token);
                set_top(stack, Matcher::Dfa { dfa: id, state: next });
                if dfa.states.get(next).map_or(false, |s| s.is_terminal()) {
                    finish(stack, tree, &dfa.name);
                }
            }
            Some(Action::Push {
                nonterminal,
                resume,
            }) => {
                set_top(stack, Matcher::Dfa {
                    dfa: id,
                    state: resume,
                });
                let depth = stack.len();
                self.enter(nonterminal, stream, tree, stack)?;
                let overridden = stack.len() == depth;
                if overridden && dfa.states.get(resume).map_or(false, |s| s.is_terminal()) {
                    finish(stack, tree, &dfa.name);
                }
            }
            None if current.accept => finish(stack, tree, &dfa.name),
            None => {
                let token = stream.lookahead()?;
                return Err(SyntaxError {
                    position: token.start,
                    text: token.text.clone(),
                    expected: self.grammar.expected(id, state),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn set_top(stack: &mut [Matcher], matcher: Matcher) {
    if let Some(top) = stack.last_mut() {
        *top = matcher;
    }
}

fn finish(stack: &mut Vec<Matcher>, tree: &mut TreeBuilder, name: &str) {
    trace!("pop {}", name);
    stack.pop();
    tree.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mython::config::{LexerConfig, ParseEnv};

    fn grammar(base: &str, extension: &str, start: &str) -> ComposedGrammar {
        ComposedGrammar::compose_and_generate_str(base, extension, start, &[]).unwrap()
    }

    fn run(grammar: &ComposedGrammar, source: &str) -> Result<Branch, ParseFailure> {
        let overrides = Overrides::new(grammar);
        let mut stream = TokenStream::new(source, &ParseEnv::default(), &LexerConfig::default());
        Trampoline::new(grammar, &overrides).run(&mut stream, grammar.start())
    }

    fn shape(branch: &Branch) -> String {
        let children: Vec<String> = branch
            .children
            .iter()
            .map(|child| match child {
                Node::Branch(inner) => shape(inner),
                Node::Leaf(token) => token.text.clone(),
            })
            .collect();
        format!("{}[{}]", branch.name(), children.join(" "))
    }

    #[test]
    fn test_nested_nonterminals() {
        let g = grammar("s: 'a' t 'c'\nt: 'b'+\n", "", "s");
        let tree = run(&g, "a b b c\n").unwrap();
        assert_eq!(shape(&tree), "start[s[a t[b b] c]]");
    }

    #[test]
    fn test_stops_once_start_symbol_completes() {
        let g = grammar("s: 'a' 'b'\n", "", "s");
        let tree = run(&g, "a b zzz\n").unwrap();
        assert_eq!(shape(&tree), "start[s[a b]]");
    }

    #[test]
    fn test_syntax_error_position_and_candidates() {
        let g = grammar("s: 'a' ('b' | 'c')\n", "", "s");
        let err = run(&g, "a d\n").unwrap_err();
        assert_eq!(err.position().line, 1);
        assert_eq!(err.position().column, 2);
        assert_eq!(
            err.to_string(),
            "Line 1, column 2, unexpected 'd'. Expected one of: 'b', 'c'."
        );
    }

    fn fake_t(
        stream: &mut TokenStream,
        tree: &mut TreeBuilder,
        symbol: Symbol,
    ) -> Result<(), ParseFailure> {
        tree.push(symbol);
        let token = stream.next_token()?;
        tree.leaf(Token {
            text: token.text.to_uppercase(),
            ..token
        });
        tree.pop();
        Ok(())
    }

    #[test]
    fn test_override_replaces_matcher() {
        let g = grammar("s: 'a' t\nt: 'b' 'b'\n", "", "s");
        let mut overrides = Overrides::new(&g);
        overrides.register(&g, "t", fake_t).unwrap();
        assert!(overrides.get_by_name(&g, "t").is_some());
        let t = g.nonterminal("t").unwrap();
        assert!(overrides.get(t).is_some());

        let mut stream = TokenStream::new("a b\n", &ParseEnv::default(), &LexerConfig::default());
        let tree = Trampoline::new(&g, &overrides)
            .run(&mut stream, g.start())
            .unwrap();
        assert_eq!(shape(&tree), "start[s[a t[B]]]");
    }

    #[test]
    fn test_unknown_override_target() {
        let g = grammar("s: 'a'\n", "", "s");
        let mut overrides = Overrides::new(&g);
        assert!(overrides.register(&g, "nope", fake_t).is_err());
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_tree_builder_closes_open_nodes() {
        let mut tree = TreeBuilder::new();
        tree.push(Symbol::nonterminal(NonterminalId(256), "s".into()));
        tree.pop();
        tree.pop();
        tree.push(Symbol::nonterminal(NonterminalId(257), "t".into()));
        assert_eq!(tree.depth(), 2);
        let root = tree.finish();
        assert_eq!(shape(&root), "start[s[] t[]]");
    }
}
