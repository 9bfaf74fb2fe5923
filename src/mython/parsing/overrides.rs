//! Hand-written matchers for the capture nonterminals
//!
//!     `mysuite`, `myexpr0` and `myexpr1` cannot be matched by their DFAs alone: the tokens
//!     they end in only exist once the token stream has been switched into a capture mode, and
//!     that has to happen after the token that opens the capture and before anything behind
//!     it is scanned. Each override is entered with that opening token as the lookahead, so
//!     nothing past it has been read yet.
//!
//!     Every override opens and closes its own node, so the tree has the same shape the DFA
//!     would have produced.

use log::debug;

use super::trampoline::{Overrides, TreeBuilder};
use crate::mython::cst::Symbol;
use crate::mython::error::ParseFailure;
use crate::mython::grammar::ComposedGrammar;
use crate::mython::lexing::{closer, Expected, LexerCommand, TokenKind, TokenStream};

const MYEXPR0_OPENERS: [Expected<'static>; 3] =
    [Expected::Text("("), Expected::Text("{"), Expected::Text("<")];

const MYEXPR1_OPENERS: [Expected<'static>; 4] = [
    Expected::Text("("),
    Expected::Text("["),
    Expected::Text("{"),
    Expected::Text("<"),
];

/// `mysuite: ':' (MYSUITE NEWLINE | NEWLINE MYSUITE)`
pub fn mysuite(
    stream: &mut TokenStream,
    tree: &mut TreeBuilder,
    symbol: Symbol,
) -> Result<(), ParseFailure> {
    stream.command(LexerCommand::StartRawSuite);
    tree.push(symbol);
    let colon = stream.expect(&[Expected::Text(":")])?;
    debug!("raw suite after line {}", colon.start.line);
    tree.leaf(colon);

    let first = stream.expect(&[
        Expected::Kind(TokenKind::MySuite),
        Expected::Kind(TokenKind::Newline),
    ])?;
    let second = if first.is(TokenKind::MySuite) {
        stream.expect(&[Expected::Kind(TokenKind::Newline)])?
    } else {
        stream.expect(&[Expected::Kind(TokenKind::MySuite)])?
    };
    tree.leaf(first);
    tree.leaf(second);
    tree.pop();
    Ok(())
}

/// `myexpr0: '(' MYEXPR ')' | '{' MYEXPR '}' | '<' MYEXPR '>'`
pub fn myexpr0(
    stream: &mut TokenStream,
    tree: &mut TreeBuilder,
    symbol: Symbol,
) -> Result<(), ParseFailure> {
    nested_expr(stream, tree, symbol, &MYEXPR0_OPENERS)
}

/// Same as [myexpr0] with `[` allowed, for expressions that follow a `![...]` argument.
pub fn myexpr1(
    stream: &mut TokenStream,
    tree: &mut TreeBuilder,
    symbol: Symbol,
) -> Result<(), ParseFailure> {
    nested_expr(stream, tree, symbol, &MYEXPR1_OPENERS)
}

fn nested_expr(
    stream: &mut TokenStream,
    tree: &mut TreeBuilder,
    symbol: Symbol,
    openers: &[Expected<'_>],
) -> Result<(), ParseFailure> {
    let open = stream.expect(openers)?;
    let delimiter = open.text.chars().next().unwrap_or_default();
    stream.command(LexerCommand::StartNestedExpr(delimiter));
    tree.push(symbol);
    tree.leaf(open);

    let body = stream.expect(&[Expected::Kind(TokenKind::MyExpr)])?;
    let close_text = closer(delimiter).map(String::from).unwrap_or_default();
    tree.leaf(body);
    let close = stream.expect(&[Expected::Text(&close_text)])?;
    tree.leaf(close);
    tree.pop();
    Ok(())
}

/// Registers every override whose nonterminal the grammar defines.
pub fn default_overrides(grammar: &ComposedGrammar) -> Overrides {
    let mut overrides = Overrides::new(grammar);
    let builtin: [(&str, super::trampoline::Override); 3] =
        [("mysuite", mysuite), ("myexpr0", myexpr0), ("myexpr1", myexpr1)];
    for (name, matcher) in builtin {
        if let Some(id) = grammar.nonterminal(name) {
            overrides.register_id(id, matcher);
        }
    }
    debug!("{} parser overrides registered", overrides.len());
    overrides
}
