//! Grammar source parsing
//!
//!     Grammars are written in the pgen notation Python's own `Grammar` file uses:
//!
//!         rule: alternative ('|' alternative)*
//!         alternative: item+
//!         item: '[' rhs ']' | atom ['+' | '*']
//!         atom: '(' rhs ')' | NAME | 'literal'
//!
//!     One rule per logical line; a rule may continue over several physical lines while a
//!     bracket is open. `#` starts a comment. Names that are defined by some rule are
//!     nonterminals, any other name must be a token kind. Quoted literals starting with a
//!     letter are keywords, the others are operator spellings.
//!
//!     Tokenizing is done with logos and the rule structure is parsed with chumsky, one rule
//!     at a time so that an error can name the rule it happened in.

use std::fmt;
use std::ops::Range;

use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use chumsky::Stream;
use logos::Logos;

use crate::mython::error::GrammarError;

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\x0c\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum GrammarToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r"'[^'\n]*'", |lex| lex.slice().to_string())]
    Literal(String),

    #[token(":")]
    Colon,

    #[token("|")]
    Bar,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,

    #[token("\n")]
    Newline,
}

impl fmt::Display for GrammarToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarToken::Name(name) => write!(f, "name '{}'", name),
            GrammarToken::Literal(literal) => write!(f, "literal {}", literal),
            GrammarToken::Colon => f.write_str("':'"),
            GrammarToken::Bar => f.write_str("'|'"),
            GrammarToken::LParen => f.write_str("'('"),
            GrammarToken::RParen => f.write_str("')'"),
            GrammarToken::LBracket => f.write_str("'['"),
            GrammarToken::RBracket => f.write_str("']'"),
            GrammarToken::Star => f.write_str("'*'"),
            GrammarToken::Plus => f.write_str("'+'"),
            GrammarToken::Newline => f.write_str("end of line"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    ZeroOrMore,
    OneOrMore,
}

/// Right-hand side of a production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rhs {
    Alternatives(Vec<Rhs>),
    Sequence(Vec<Rhs>),
    Optional(Box<Rhs>),
    Repeat(Box<Rhs>, Repeat),
    Name(String),
    /// Kept with its quotes, as written.
    Literal(String),
}

impl Rhs {
    /// Every name the production mentions, in order of appearance.
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Rhs::Alternatives(items) | Rhs::Sequence(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            Rhs::Optional(inner) | Rhs::Repeat(inner, _) => inner.collect_names(names),
            Rhs::Name(name) => names.push(name),
            Rhs::Literal(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    /// Line the rule starts on.
    pub line: usize,
    pub rhs: Rhs,
}

type TokenLocation = (GrammarToken, Range<usize>);

type ParserError = Simple<TokenLocation>;

fn token(t: GrammarToken) -> impl Parser<TokenLocation, (), Error = ParserError> + Clone {
    filter(move |(tok, _): &TokenLocation| tok == &t).ignored()
}

fn symbol() -> impl Parser<TokenLocation, Rhs, Error = ParserError> + Clone {
    filter_map(|span, (tok, _): TokenLocation| match tok {
        GrammarToken::Name(name) => Ok(Rhs::Name(name)),
        GrammarToken::Literal(literal) => Ok(Rhs::Literal(literal)),
        other => Err(Simple::custom(span, format!("unexpected {}", other))),
    })
}

fn rhs() -> impl Parser<TokenLocation, Rhs, Error = ParserError> + Clone {
    recursive(|rhs| {
        let atom = choice((
            rhs.clone()
                .delimited_by(token(GrammarToken::LParen), token(GrammarToken::RParen)),
            symbol(),
        ));

        let repeated = atom
            .then(
                choice((
                    token(GrammarToken::Star).to(Repeat::ZeroOrMore),
                    token(GrammarToken::Plus).to(Repeat::OneOrMore),
                ))
                .or_not(),
            )
            .map(|(atom, repeat)| match repeat {
                Some(repeat) => Rhs::Repeat(Box::new(atom), repeat),
                None => atom,
            });

        let item = choice((
            rhs.delimited_by(token(GrammarToken::LBracket), token(GrammarToken::RBracket))
                .map(|inner| Rhs::Optional(Box::new(inner))),
            repeated,
        ));

        let sequence = item.repeated().at_least(1).map(|mut items: Vec<Rhs>| {
            if items.len() == 1 {
                items.remove(0)
            } else {
                Rhs::Sequence(items)
            }
        });

        sequence
            .separated_by(token(GrammarToken::Bar))
            .at_least(1)
            .map(|mut alternatives: Vec<Rhs>| {
                if alternatives.len() == 1 {
                    alternatives.remove(0)
                } else {
                    Rhs::Alternatives(alternatives)
                }
            })
    })
}

fn rule() -> impl Parser<TokenLocation, (String, Rhs), Error = ParserError> {
    let name = filter_map(|span, (tok, _): TokenLocation| match tok {
        GrammarToken::Name(name) => Ok(name),
        other => Err(Simple::custom(
            span,
            format!("expected a rule name, found {}", other),
        )),
    });
    name.then_ignore(token(GrammarToken::Colon))
        .then(rhs())
        .then_ignore(end())
}

fn line_of(text: &str, offset: usize) -> usize {
    text.get(..offset)
        .map_or(0, |before| before.matches('\n').count())
        + 1
}

fn describe(error: &ParserError) -> String {
    match error.reason() {
        SimpleReason::Custom(message) => message.clone(),
        _ => match error.found() {
            Some((tok, _)) => format!("unexpected {}", tok),
            None => "unexpected end of rule".to_string(),
        },
    }
}

fn rule_name(tokens: &[TokenLocation]) -> String {
    match tokens.first() {
        Some((GrammarToken::Name(name), _)) => name.clone(),
        _ => "?".to_string(),
    }
}

fn parse_rule(text: &str, tokens: Vec<TokenLocation>) -> Result<Rule, GrammarError> {
    let name = rule_name(&tokens);
    let start = tokens.first().map(|(_, span)| span.start).unwrap_or(0);
    let end = tokens.last().map(|(_, span)| span.end).unwrap_or(start);
    let line = line_of(text, start);
    let stream = Stream::from_iter(
        end..end,
        tokens
            .into_iter()
            .map(|(tok, span)| ((tok, span.clone()), span)),
    );
    match rule().parse(stream) {
        Ok((name, rhs)) => Ok(Rule { name, line, rhs }),
        Err(errors) => {
            let (message, line) = errors
                .first()
                .map(|error| (describe(error), line_of(text, error.span().start)))
                .unwrap_or_else(|| ("malformed rule".to_string(), line));
            Err(GrammarError::Syntax {
                rule: name,
                line,
                message,
            })
        }
    }
}

/// Parses grammar text into its rules, in source order.
pub fn parse_grammar(text: &str) -> Result<Vec<Rule>, GrammarError> {
    let mut rules: Vec<Rule> = Vec::new();
    let mut pending: Vec<TokenLocation> = Vec::new();
    let mut depth = 0usize;
    let mut lexer = GrammarToken::lexer(text);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let Ok(tok) = result else {
            return Err(GrammarError::Syntax {
                rule: rule_name(&pending),
                line: line_of(text, span.start),
                message: format!("unexpected character {:?}", lexer.slice()),
            });
        };
        match tok {
            GrammarToken::Newline => {
                if depth == 0 && !pending.is_empty() {
                    rules.push(parse_rule(text, std::mem::take(&mut pending))?);
                }
                continue;
            }
            GrammarToken::LParen | GrammarToken::LBracket => depth += 1,
            GrammarToken::RParen | GrammarToken::RBracket => depth = depth.saturating_sub(1),
            _ => {}
        }
        pending.push((tok, span));
    }
    if !pending.is_empty() {
        rules.push(parse_rule(text, pending)?);
    }

    for (index, rule) in rules.iter().enumerate() {
        if rules[..index].iter().any(|earlier| earlier.name == rule.name) {
            return Err(GrammarError::DuplicateRule {
                rule: rule.name.clone(),
                line: rule.line,
            });
        }
    }
    Ok(rules)
}
