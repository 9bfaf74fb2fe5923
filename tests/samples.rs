//! Integration tests over the sample files
//!
//! Every sample has to parse, token streams are pinned with inline snapshots, and the
//! samples double as inputs for the re-entry and composition checks.

use std::sync::Arc;

use mython::mython::cst::{walk, Branch, Visitor, Walk};
use mython::mython::grammar::{ComposedGrammar, PYTHON27_GRAMMAR};
use mython::mython::lexing::{Token, TokenKind};
use mython::mython::testing::{default_parser, render_tokens, Samples};
use mython::mython::MythonParser;
use rstest::rstest;

#[test]
fn test_every_sample_parses() {
    let samples = Samples::all();
    assert!(!samples.is_empty());
    for sample in samples {
        let tree = sample
            .try_parse()
            .unwrap_or_else(|err| panic!("{}: {}", sample.path().display(), err));
        assert_eq!(tree.children.len(), 1);
    }
}

#[test]
fn test_000_funcdef_tokens() {
    let tokens = Samples::get(0).tokens();
    insta::assert_snapshot!(render_tokens(&tokens), @r###"
    NAME "def" 2:0-2:3
    NAME "foo" 2:4-2:7
    LPAR "(" 2:7-2:8
    RPAR ")" 2:8-2:9
    COLON ":" 2:9-2:10
    NEWLINE "\n" 2:10-2:11
    INDENT "    " 3:0-3:4
    NAME "x" 3:4-3:5
    EQUAL "=" 3:6-3:7
    NUMBER "44" 3:8-3:10
    NEWLINE "\n" 3:10-3:11
    NAME "if" 4:4-4:6
    NAME "x" 4:7-4:8
    GREATER ">" 4:9-4:10
    NUMBER "4" 4:11-4:12
    COLON ":" 4:12-4:13
    NEWLINE "\n" 4:13-4:14
    INDENT "       " 5:0-5:7
    NAME "pass" 5:7-5:11
    NEWLINE "\n" 5:11-5:12
    DEDENT "" 6:0-6:0
    DEDENT "" 6:0-6:0
    ENDMARKER "" 6:0-6:0
    "###);
}

#[test]
fn test_010_mysuite_tokens() {
    let tokens = Samples::get(10).tokens();
    insta::assert_snapshot!(render_tokens(&tokens), @r###"
    NAME "my" 1:0-1:2
    LSQB "[" 1:2-1:3
    NAME "foo" 1:3-1:6
    RSQB "]" 1:6-1:7
    NAME "bar" 1:8-1:11
    LPAR "(" 1:11-1:12
    NAME "baz" 1:12-1:15
    RPAR ")" 1:15-1:16
    COLON ":" 1:16-1:17
    NEWLINE "\n" 1:17-1:18
    MYSUITE "biz\n\nboz\n" 2:4-5:0
    ENDMARKER "" 5:0-5:0
    "###);
}

#[test]
fn test_030_inline_suite() {
    let tree = Samples::get(30).parse();
    let suite = tree.find("mysuite").unwrap();
    let kinds: Vec<TokenKind> = suite.tokens().map(|token| token.kind).collect();
    assert_eq!(kinds, vec![TokenKind::Colon, TokenKind::MySuite, TokenKind::Newline]);
    assert_eq!(
        suite.token(TokenKind::MySuite).map(|token| token.text.as_str()),
        Some("<p>hello</p>")
    );
    assert!(tree.find("print_stmt").is_some());
}

#[test]
fn test_040_suite_inside_method() {
    let tree = Samples::get(40).parse();
    let suite = tree.find("mysuite").unwrap();
    let captured = suite.token(TokenKind::MySuite).unwrap();
    assert_eq!(captured.text, "{{ name }}\n\n  indented {{ value }}\n");
    assert_eq!((captured.start.line, captured.start.column), (4, 12));
    assert!(tree.find("return_stmt").is_some());
}

#[test]
fn test_050_expression_quotations() {
    let tree = Samples::get(50).parse();
    let captured: Vec<String> = tree
        .tokens()
        .filter(|token| token.is(TokenKind::MyExpr))
        .map(|token| token.text.clone())
        .collect();
    assert_eq!(
        captured,
        vec!["(+ 1 (* 2 3))", r#" {"a": [1, 2]} "#, "f(a, (b))"]
    );
    assert_eq!(tree.find_all("myexpr1").count(), 1);
    assert_eq!(tree.find_all("myexpr0").count(), 2);
}

#[rstest]
#[case("1 + 2")]
#[case("f(x)[0].y")]
#[case("a if b else c")]
#[case("[x * 2 for x in xs if x]")]
#[case("lambda a, b=1: a")]
#[case("!(  bingo )")]
#[case("![sql] { select * from t }")]
fn test_expression_parses_the_same_from_either_start(#[case] source: &str) {
    let parser = default_parser();
    let program = parser.parse_string(source, "file_input").unwrap();
    let expression = parser.parse_string(source, "eval_input").unwrap();
    assert_eq!(
        expression.children[0].as_branch().map(Branch::name),
        Some("eval_input")
    );
    assert_eq!(program.find("testlist"), expression.find("testlist"));
}

fn base_only_parser() -> MythonParser {
    let grammar = ComposedGrammar::compose_and_generate_str(PYTHON27_GRAMMAR, "", "file_input", &[])
        .expect("the base grammar builds on its own");
    MythonParser::from_grammar(Arc::new(grammar))
}

#[rstest]
#[case::sample(Samples::get(0).source())]
#[case::comparisons("print a < b, c <> d, e != f\n".to_string())]
#[case::classes("class A(object):\n    x = [i for i in range(3)]\n    def f(self, *args, **kw):\n        return not x\n".to_string())]
#[case::try_blocks("try:\n    pass\nexcept (A, B), e:\n    raise\nfinally:\n    del x\n".to_string())]
fn test_composition_keeps_base_language(#[case] source: String) {
    let base = base_only_parser().parse_string(&source, "file_input").unwrap();
    let composed = default_parser().parse_string(&source, "file_input").unwrap();
    assert_eq!(base, composed);
}

#[rstest]
#[case("x = !(a)\n")]
#[case("my foo:\n    bar\n")]
fn test_base_grammar_rejects_extension_syntax(#[case] source: &str) {
    assert!(base_only_parser().parse_string(source, "file_input").is_err());
    assert!(default_parser().parse_string(source, "file_input").is_ok());
}

#[derive(Default)]
struct Census {
    depth: usize,
    deepest: usize,
    names: usize,
}

impl Visitor for Census {
    fn enter_branch(&mut self, _branch: &Branch) -> Walk {
        self.depth += 1;
        self.deepest = self.deepest.max(self.depth);
        Walk::Descend
    }

    fn leave_branch(&mut self, _branch: &Branch) {
        self.depth -= 1;
    }

    fn visit_leaf(&mut self, token: &Token) {
        if token.is(TokenKind::Name) {
            self.names += 1;
        }
    }
}

#[test]
fn test_visitor_over_parsed_sample() {
    let tree = Samples::get(0).parse();
    let mut census = Census::default();
    walk(&tree, &mut census);
    assert_eq!(census.depth, 0);
    assert_eq!(census.names, 6);
    assert!(census.deepest > 15);
}
