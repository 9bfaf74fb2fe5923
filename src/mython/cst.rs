//! Concrete syntax trees
//!
//!     The parser keeps every production it goes through: a [Branch] per nonterminal, a leaf
//!     per consumed token. Nothing is folded away, so the tree for `x = 1` is a chain of single
//!     child branches from `expr_stmt` down to `atom`. Consumers that want an AST build one
//!     from this.
//!
//!     Serialized (serde) a branch is `[name, [children...]]` and a leaf is the token tuple
//!     `[kind, text, [line, column], [line, column], source_line]`.
//!
//! Walking
//!
//!     Trees of real programs are deep, so none of the walkers below recurse. Three ways in:
//!
//!     - [Visitor] with [walk]: one callback for every branch and leaf.
//!     - [Dispatch]: a table of handlers indexed by the dense nonterminal id, for consumers
//!       that only care about a few nonterminals.
//!     - [Transformer] with [transform]: bottom-up rebuild into any output type.

use std::sync::Arc;

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

use crate::mython::error::GrammarError;
use crate::mython::grammar::{ComposedGrammar, NonterminalId};
use crate::mython::lexing::{Token, TokenKind};

/// Name of the root node every parse returns.
pub const START: &str = "start";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// `None` only for the `start` root.
    pub id: Option<NonterminalId>,
    pub name: Arc<str>,
}

impl Symbol {
    pub fn start() -> Self {
        Symbol {
            id: None,
            name: Arc::from(START),
        }
    }

    pub fn nonterminal(id: NonterminalId, name: Arc<str>) -> Self {
        Symbol { id: Some(id), name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch(Branch),
    Leaf(Token),
}

impl Node {
    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Node::Branch(branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Token> {
        match self {
            Node::Leaf(token) => Some(token),
            Node::Branch(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct Branch {
    pub symbol: Symbol,
    pub children: Vec<Node>,
}

// Clone, equality and drop work on an explicit stack, like the walkers.

impl Clone for Branch {
    fn clone(&self) -> Self {
        match transform(self, &mut Duplicate) {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => Branch::new(self.symbol.clone()),
        }
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((left, right)) = pairs.pop() {
            if left.symbol != right.symbol || left.children.len() != right.children.len() {
                return false;
            }
            for pair in left.children.iter().zip(&right.children) {
                match pair {
                    (Node::Leaf(a), Node::Leaf(b)) if a == b => {}
                    (Node::Branch(a), Node::Branch(b)) => pairs.push((a, b)),
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for Branch {}

impl Drop for Branch {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            if let Node::Branch(mut branch) = node {
                pending.append(&mut branch.children);
            }
        }
    }
}

/// Rebuilds a tree node for node; backs `Clone for Branch`.
struct Duplicate;

impl Transformer for Duplicate {
    type Output = Node;

    fn branch(&mut self, branch: &Branch, children: Vec<Node>) -> Node {
        Node::Branch(Branch {
            symbol: branch.symbol.clone(),
            children,
        })
    }

    fn leaf(&mut self, token: &Token) -> Node {
        Node::Leaf(token.clone())
    }
}

impl Branch {
    pub fn new(symbol: Symbol) -> Self {
        Branch {
            symbol,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.symbol.name
    }

    /// First branch named `name` in document order, this one included.
    pub fn find(&self, name: &str) -> Option<&Branch> {
        self.branches().find(|branch| branch.name() == name)
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Branch> + 'a {
        self.branches().filter(move |branch| branch.name() == name)
    }

    /// Every branch below and including this one, in document order.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let branch = stack.pop()?;
            stack.extend(branch.children.iter().rev().filter_map(Node::as_branch));
            Some(branch)
        })
    }

    /// Every leaf token, in source order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        std::iter::from_fn(move || loop {
            match stack.pop()? {
                Node::Leaf(token) => return Some(token),
                Node::Branch(branch) => stack.extend(branch.children.iter().rev()),
            }
        })
    }

    /// First token of the given kind anywhere below.
    pub fn token(&self, kind: TokenKind) -> Option<&Token> {
        self.tokens().find(|token| token.is(kind))
    }
}

impl Serialize for Branch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&*self.symbol.name)?;
        tuple.serialize_element(&self.children)?;
        tuple.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Branch(branch) => branch.serialize(serializer),
            Node::Leaf(token) => token.serialize(serializer),
        }
    }
}

/// What a walker does after a branch callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
}

pub trait Visitor {
    fn enter_branch(&mut self, _branch: &Branch) -> Walk {
        Walk::Descend
    }

    fn leave_branch(&mut self, _branch: &Branch) {}

    fn visit_leaf(&mut self, _token: &Token) {}
}

enum Step<'a> {
    Enter(&'a Node),
    Leave(&'a Branch),
}

/// Depth-first walk. `leave_branch` runs only for branches that were descended into.
pub fn walk<V: Visitor + ?Sized>(root: &Branch, visitor: &mut V) {
    if visitor.enter_branch(root) == Walk::Skip {
        return;
    }
    let mut steps: Vec<Step<'_>> = vec![Step::Leave(root)];
    steps.extend(root.children.iter().rev().map(Step::Enter));
    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(Node::Leaf(token)) => visitor.visit_leaf(token),
            Step::Enter(Node::Branch(branch)) => {
                if visitor.enter_branch(branch) == Walk::Descend {
                    steps.push(Step::Leave(branch));
                    steps.extend(branch.children.iter().rev().map(Step::Enter));
                }
            }
            Step::Leave(branch) => visitor.leave_branch(branch),
        }
    }
}

pub type Handler<V> = fn(&mut V, &Branch) -> Walk;

/// Handlers keyed by dense nonterminal index. Branches without a handler are descended.
pub struct Dispatch<V> {
    handlers: Vec<Option<Handler<V>>>,
    on_start: Option<Handler<V>>,
}

impl<V> Dispatch<V> {
    pub fn new(grammar: &ComposedGrammar) -> Self {
        Dispatch {
            handlers: vec![None; grammar.nonterminal_count()],
            on_start: None,
        }
    }

    pub fn on(
        mut self,
        grammar: &ComposedGrammar,
        name: &str,
        handler: Handler<V>,
    ) -> Result<Self, GrammarError> {
        if name == START {
            self.on_start = Some(handler);
            return Ok(self);
        }
        let id = grammar
            .nonterminal(name)
            .ok_or_else(|| GrammarError::UnknownNonterminal(name.to_string()))?;
        Ok(self.on_id(id, handler))
    }

    pub fn on_id(mut self, id: NonterminalId, handler: Handler<V>) -> Self {
        if let Some(slot) = self.handlers.get_mut(id.index()) {
            *slot = Some(handler);
        }
        self
    }

    fn handler(&self, symbol: &Symbol) -> Option<Handler<V>> {
        match symbol.id {
            Some(id) => self.handlers.get(id.index()).copied().flatten(),
            None => self.on_start,
        }
    }

    pub fn run(&self, state: &mut V, root: &Branch) {
        let mut stack = vec![root];
        while let Some(branch) = stack.pop() {
            let walk = match self.handler(&branch.symbol) {
                Some(handler) => handler(state, branch),
                None => Walk::Descend,
            };
            if walk == Walk::Descend {
                stack.extend(branch.children.iter().rev().filter_map(Node::as_branch));
            }
        }
    }
}

/// Bottom-up rebuild: each branch receives its children already transformed.
pub trait Transformer {
    type Output;

    fn branch(&mut self, branch: &Branch, children: Vec<Self::Output>) -> Self::Output;

    fn leaf(&mut self, token: &Token) -> Self::Output;
}

pub fn transform<T: Transformer + ?Sized>(root: &Branch, transformer: &mut T) -> T::Output {
    let mut steps: Vec<Step<'_>> = vec![Step::Leave(root)];
    steps.extend(root.children.iter().rev().map(Step::Enter));
    let mut results: Vec<T::Output> = Vec::new();
    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(Node::Leaf(token)) => results.push(transformer.leaf(token)),
            Step::Enter(Node::Branch(branch)) => {
                steps.push(Step::Leave(branch));
                steps.extend(branch.children.iter().rev().map(Step::Enter));
            }
            Step::Leave(branch) => {
                let children = results.split_off(results.len() - branch.children.len());
                let output = transformer.branch(branch, children);
                results.push(output);
            }
        }
    }
    match results.pop() {
        Some(output) => output,
        None => transformer.branch(root, Vec::new()),
    }
}
