//! End to end scenarios for grammar composition and the cooperative lexer
//!
//! Each test drives the public entry points only: compose a grammar, build a parser, parse
//! text, inspect the tree or the error.

use std::sync::Arc;

use mython::mython::cst::Branch;
use mython::mython::error::{LexError, ParseFailure};
use mython::mython::grammar::ComposedGrammar;
use mython::mython::lexing::TokenKind;
use mython::mython::testing::{default_parser, Samples};
use mython::mython::MythonParser;
use mython::Error;
use rstest::rstest;

fn toy_parser() -> MythonParser {
    let grammar = ComposedGrammar::compose_and_generate_str("s: 'a' 'b'\n", "s: 'a' 'c'\n", "s", &[])
        .expect("toy grammar composes");
    MythonParser::from_grammar(Arc::new(grammar))
}

fn leaf_texts(tree: &Branch) -> Vec<String> {
    tree.tokens().map(|token| token.text.clone()).collect()
}

#[rstest]
#[case("a b", &["a", "b"])]
#[case("a c", &["a", "c"])]
fn test_hook_union_accepts_both_alternatives(#[case] source: &str, #[case] leaves: &[&str]) {
    let tree = toy_parser().parse_string(source, "s").unwrap();
    assert_eq!(tree.name(), "start");
    let s = tree.find("s").unwrap();
    assert_eq!(leaf_texts(s), leaves);
}

#[test]
fn test_hook_union_rejects_other_tokens() {
    let err = toy_parser().parse_string("a d", "s").unwrap_err();
    insta::assert_snapshot!(err, @"File '<string>', line 1, column 2, unexpected 'd'. Expected one of: 'b', 'c'.");
}

#[test]
fn test_raw_suite_keeps_blank_lines_and_strips_indentation() {
    let tree = Samples::get(10).parse();
    let suite = tree.find("mysuite").unwrap();
    let text = suite.token(TokenKind::MySuite).map(|token| token.text.as_str());
    assert_eq!(text, Some("biz\n\nboz\n"));

    let statement = tree.find("compound_stmt").unwrap();
    let header: Vec<String> = statement
        .children
        .iter()
        .filter_map(|child| child.as_leaf())
        .map(|token| token.text.clone())
        .collect();
    assert_eq!(header, vec!["my", "[", "]", "bar"]);
}

#[test]
fn test_nested_expression_keeps_inner_whitespace() {
    let tree = Samples::get(20).parse();
    let expr = tree.find("myexpr0").unwrap();
    let kinds: Vec<TokenKind> = expr.tokens().map(|token| token.kind).collect();
    assert_eq!(kinds, vec![TokenKind::LPar, TokenKind::MyExpr, TokenKind::RPar]);
    assert_eq!(
        expr.token(TokenKind::MyExpr).map(|token| token.text.as_str()),
        Some("  bingo ")
    );
}

#[rstest]
#[case::empty("x = !<>\n", "")]
#[case::shift("x = !<<b>>\n", "<b>")]
#[case::comparison("x = !<=y>\n", "=y")]
#[case::after_argument("x = ![lang]<<b> c>\n", "<b> c")]
fn test_angle_quotation_opens_with_one_character(#[case] source: &str, #[case] body: &str) {
    let tree = default_parser().parse_string(source, "file_input").unwrap();
    let captured = tree.token(TokenKind::MyExpr).map(|token| token.text.as_str());
    assert_eq!(captured, Some(body));
    assert_eq!(tree.token(TokenKind::Greater).map(|token| token.text.as_str()), Some(">"));
}

#[test]
fn test_deeply_nested_expression_parses_and_drops() {
    let depth = 2_000;
    let source = format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
    let tree = default_parser().parse_string(&source, "file_input").unwrap();
    assert!(tree.branches().count() > depth * 10);
    let copy = tree.clone();
    assert_eq!(copy, tree);
    drop(copy);
    drop(tree);
}

#[test]
fn test_inconsistent_dedent_names_the_line() {
    let err = default_parser()
        .parse_string("if x:\n    y = 1\n  z = 2\n", "file_input")
        .unwrap_err();
    match err.failure() {
        Some(ParseFailure::Lex(LexError::Dedent { line, found, .. })) => {
            assert_eq!(*line, 3);
            assert_eq!(*found, 2);
        }
        other => panic!("expected a dedent error, got {:?}", other),
    }
    assert!(err.to_string().contains("line 3"), "{}", err);
}

#[test]
fn test_syntax_error_reports_token_and_candidates() {
    let err = default_parser()
        .parse_string("def f(x) pass\n", "file_input")
        .unwrap_err();
    let Error::Parse { failure: ParseFailure::Syntax(syntax), .. } = &err else {
        panic!("expected a syntax error, got {:?}", err);
    };
    assert_eq!((syntax.position.line, syntax.position.column), (1, 9));
    assert_eq!(syntax.text, "pass");
    assert!(!syntax.expected.is_empty());
    insta::assert_snapshot!(err, @"File '<string>', line 1, column 9, unexpected 'pass'. Expected one of: ':'.");
}

#[test]
fn test_missing_operand_lists_expression_starts() {
    let err = default_parser().parse_string("x = \n", "file_input").unwrap_err();
    let Some(ParseFailure::Syntax(syntax)) = err.failure() else {
        panic!("expected a syntax error, got {:?}", err);
    };
    assert_eq!((syntax.position.line, syntax.position.column), (1, 4));
    for candidate in ["NAME", "NUMBER", "'('", "'not'", "'lambda'", "'!'"] {
        assert!(
            syntax.expected.iter().any(|spelled| spelled == candidate),
            "{} missing from {:?}",
            candidate,
            syntax.expected
        );
    }
}
