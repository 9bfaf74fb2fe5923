//! The token stream
//!
//!     [TokenStream] turns source lines into tokens on demand. Nothing is scanned ahead of
//!     what the parser asks for, which is what lets the parser switch the scanner into a
//!     capture mode between two tokens: the next token is only produced after the command has
//!     been applied.
//!
//! Normal scanning
//!
//!     Lines are read one at a time. At the start of each logical line the leading blanks are
//!     measured (tabs advance to the next multiple of the tab size, a form feed resets the
//!     column) and compared with the indentation stack, producing INDENT or DEDENT tokens.
//!     Blank and comment-only lines produce NL and COMMENT tokens instead and never touch the
//!     stack. Inside brackets, or after a backslash continuation, a line is a continuation of
//!     the previous one and indentation is not measured at all.
//!
//!     NL and COMMENT are generated like any other token and dropped only when the parser
//!     pulls ([TokenStream::next_token], [TokenStream::lookahead]). Raw consumers use
//!     [TokenStream::next_raw_token] and see them.
//!
//! Capture modes
//!
//!     [LexerCommand::StartRawSuite] arms raw-suite capture. If the colon that opens the suite
//!     has text after it on the same line, that text is the suite. Otherwise, once the line
//!     ends, the following indented block is read verbatim into a single MYSUITE token (see
//!     `capture.rs`).
//!
//!     [LexerCommand::StartNestedExpr] is issued right after the opening delimiter has been
//!     handed out. The next request reads up to the balancing closing delimiter, counting only
//!     that delimiter pair, and yields a MYEXPR token followed by the closing delimiter.
//!
//!     The opener after `!`, or after the `]` ending a `![...]` argument, is always a single
//!     character: `!<<b>>` opens with `<`, not `<<`.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{trace, warn};

use crate::mython::config::{LexerConfig, ParseEnv};
use crate::mython::error::{LexError, ParseFailure, SyntaxError};
use crate::mython::lexing::pseudo::{self, Pseudo, Quote};
use crate::mython::lexing::tokens::{Position, Token, TokenKind};

mod capture;

pub use capture::closer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    Normal,
    RawSuiteCapture,
    NestedExprCapture(char),
}

/// Mode changes the parser may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerCommand {
    StartRawSuite,
    /// Carries the opening delimiter that was just consumed.
    StartNestedExpr(char),
}

/// A token pattern for [TokenStream::expect] and [TokenStream::test_lookahead].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected<'a> {
    Kind(TokenKind),
    Text(&'a str),
}

impl Expected<'_> {
    pub fn matches(&self, token: &Token) -> bool {
        match self {
            Expected::Kind(kind) => token.kind == *kind,
            Expected::Text(text) => {
                (token.kind.is_operator() || token.kind == TokenKind::Name) && token.text == *text
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Expected::Kind(kind) => kind.name().to_string(),
            Expected::Text(text) => format!("'{}'", text),
        }
    }
}

/// How far a `!` quotation has got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BangState {
    Idle,
    AfterBang,
    AfterArgument,
}

/// A string literal still waiting for its closing quotes.
#[derive(Debug)]
struct OpenString {
    text: String,
    source: String,
    start: Position,
    quote: Quote,
    /// Single-quoted strings may only go on while each line ends in a backslash.
    needs_continuation: bool,
}

pub struct TokenStream {
    lines: std::vec::IntoIter<String>,
    tab_size: usize,
    column_offset: usize,
    lnum: usize,
    line: Arc<str>,
    pos: usize,
    parenlev: usize,
    continued: bool,
    indents: Vec<usize>,
    open_string: Option<OpenString>,
    mode: LexerMode,
    after_colon: bool,
    bang: BangState,
    /// Bracket depths at which `![` arguments were opened.
    bang_arguments: Vec<usize>,
    pending: VecDeque<Token>,
    lookahead: Option<Token>,
    end: Option<Token>,
}

impl TokenStream {
    pub fn new(source: &str, env: &ParseEnv, config: &LexerConfig) -> Self {
        Self::from_lines(source.split_inclusive('\n').map(String::from), env, config)
    }

    /// Builds a stream over physical lines, each carrying its own line ending.
    pub fn from_lines<I>(lines: I, env: &ParseEnv, config: &LexerConfig) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        TokenStream {
            lines: lines.into_iter().collect::<Vec<_>>().into_iter(),
            tab_size: config.tab_size.max(1),
            column_offset: env.column_offset,
            lnum: env.line_offset(),
            line: Arc::from(""),
            pos: 0,
            parenlev: 0,
            continued: false,
            indents: vec![0],
            open_string: None,
            mode: LexerMode::Normal,
            after_colon: false,
            bang: BangState::Idle,
            bang_arguments: Vec::new(),
            pending: VecDeque::new(),
            lookahead: None,
            end: None,
        }
    }

    pub fn command(&mut self, command: LexerCommand) {
        match command {
            LexerCommand::StartRawSuite => self.mode = LexerMode::RawSuiteCapture,
            LexerCommand::StartNestedExpr(open) if closer(open).is_some() => {
                self.mode = LexerMode::NestedExprCapture(open)
            }
            LexerCommand::StartNestedExpr(open) => {
                warn!("ignoring nested expression capture for non-delimiter {:?}", open);
                return;
            }
        }
        trace!("lexer mode {:?} at line {}", self.mode, self.lnum);
    }

    pub fn mode(&self) -> LexerMode {
        self.mode
    }

    pub fn indentation(&self) -> &[usize] {
        &self.indents
    }

    pub fn paren_depth(&self) -> usize {
        self.parenlev
    }

    /// Next significant token, consuming the lookahead if one is buffered.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.fetch(),
        }
    }

    pub fn lookahead(&mut self) -> Result<&Token, LexError> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.fetch()?,
        };
        let token: &Token = self.lookahead.insert(token);
        Ok(token)
    }

    pub fn test_lookahead(&mut self, expected: &[Expected<'_>]) -> Result<bool, LexError> {
        let token = self.lookahead()?;
        Ok(expected.iter().any(|pattern| pattern.matches(token)))
    }

    pub fn expect(&mut self, expected: &[Expected<'_>]) -> Result<Token, ParseFailure> {
        let token = self.next_token()?;
        if expected.iter().any(|pattern| pattern.matches(&token)) {
            return Ok(token);
        }
        Err(SyntaxError {
            position: token.start,
            text: token.text,
            expected: expected.iter().map(Expected::describe).collect(),
        }
        .into())
    }

    /// Next token of any kind, NL and COMMENT included. Once the end marker has been produced
    /// it is produced again on every call.
    pub fn next_raw_token(&mut self) -> Result<Token, LexError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            if let Some(end) = &self.end {
                return Ok(end.clone());
            }
            self.advance()?;
        }
    }

    fn fetch(&mut self) -> Result<Token, LexError> {
        loop {
            let token = self.next_raw_token()?;
            if !token.kind.is_trivia() {
                return Ok(token);
            }
        }
    }

    fn at(&self, column: usize) -> Position {
        self.position(self.lnum, column)
    }

    fn position(&self, line: usize, column: usize) -> Position {
        Position::new(line, column + self.column_offset)
    }

    fn emit(
        &mut self,
        kind: TokenKind,
        text: impl Into<String>,
        start: Position,
        end: Position,
        line: Arc<str>,
    ) {
        self.pending.push_back(Token::new(kind, text, start, end, line));
    }

    fn readline(&mut self) -> String {
        self.lnum += 1;
        self.lines.next().unwrap_or_default()
    }

    fn advance(&mut self) -> Result<(), LexError> {
        if std::mem::take(&mut self.after_colon)
            && self.mode == LexerMode::RawSuiteCapture
            && self.parenlev == 0
            && self.capture_inline_suite()
        {
            return Ok(());
        }
        if let LexerMode::NestedExprCapture(open) = self.mode {
            return self.capture_nested_expr(open);
        }
        if self.pos >= self.line.len() {
            return self.start_line();
        }
        self.scan_token();
        Ok(())
    }

    fn start_line(&mut self) -> Result<(), LexError> {
        let mut line = self.readline();
        if self.mode == LexerMode::RawSuiteCapture && self.parenlev == 0 {
            line = self.capture_raw_suite(line)?;
        }
        self.line = Arc::from(line);
        self.pos = 0;

        if let Some(open) = self.open_string.take() {
            return self.continue_string(open);
        }

        if self.parenlev == 0 && !self.continued {
            if self.line.is_empty() {
                self.finish();
                return Ok(());
            }
            let (column, pos) = measure_indent(&self.line, self.tab_size);
            self.pos = pos;
            if pos == self.line.len() {
                self.finish();
                return Ok(());
            }
            let line = Arc::clone(&self.line);
            match line.as_bytes()[pos] {
                b'#' => {
                    let comment = line[pos..].trim_end_matches(&['\r', '\n'][..]);
                    let nl_pos = pos + comment.len();
                    self.emit(
                        TokenKind::Comment,
                        comment,
                        self.at(pos),
                        self.at(nl_pos),
                        line.clone(),
                    );
                    self.emit(
                        TokenKind::Nl,
                        &line[nl_pos..],
                        self.at(nl_pos),
                        self.at(line.len()),
                        line.clone(),
                    );
                    self.pos = line.len();
                }
                b'\r' | b'\n' => {
                    self.emit(
                        TokenKind::Nl,
                        &line[pos..],
                        self.at(pos),
                        self.at(line.len()),
                        line.clone(),
                    );
                    self.pos = line.len();
                }
                _ => self.indent_to(column, pos, line)?,
            }
        } else {
            if self.line.is_empty() {
                return Err(LexError::UnterminatedStatement { line: self.lnum });
            }
            self.continued = false;
        }
        Ok(())
    }

    fn indent_to(&mut self, column: usize, pos: usize, line: Arc<str>) -> Result<(), LexError> {
        let top = self.indents.last().copied().unwrap_or(0);
        if column > top {
            self.indents.push(column);
            self.emit(
                TokenKind::Indent,
                &line[..pos],
                self.at(0),
                self.at(pos),
                line.clone(),
            );
        }
        while column < self.indents.last().copied().unwrap_or(0) {
            if !self.indents.contains(&column) {
                return Err(LexError::Dedent {
                    line: self.lnum,
                    expected: self.indents.clone(),
                    found: column,
                });
            }
            self.indents.pop();
            self.emit(
                TokenKind::Dedent,
                "",
                self.at(pos),
                self.at(pos),
                line.clone(),
            );
        }
        Ok(())
    }

    fn continue_string(&mut self, mut open: OpenString) -> Result<(), LexError> {
        let line = Arc::clone(&self.line);
        if line.is_empty() {
            return Err(LexError::UnterminatedString { start: open.start });
        }
        if let Some(end) = pseudo::string_end(&line, 0, open.quote) {
            open.text.push_str(&line[..end]);
            open.source.push_str(&line);
            self.emit(
                TokenKind::String,
                open.text,
                open.start,
                self.at(end),
                Arc::from(open.source),
            );
            self.pos = end;
        } else if open.needs_continuation
            && !line.ends_with("\\\n")
            && !line.ends_with("\\\r\n")
        {
            open.text.push_str(&line);
            open.source.push_str(&line);
            self.emit(
                TokenKind::ErrorToken,
                open.text,
                open.start,
                self.at(line.len()),
                Arc::from(open.source),
            );
            self.pos = line.len();
        } else {
            open.text.push_str(&line);
            open.source.push_str(&line);
            self.open_string = Some(open);
            self.pos = line.len();
        }
        Ok(())
    }

    fn scan_token(&mut self) {
        let line = Arc::clone(&self.line);
        let bytes = line.as_bytes();
        let mut pos = self.pos;
        while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\x0c') {
            pos += 1;
        }
        self.pos = pos;
        if pos >= bytes.len() {
            return;
        }

        let Some((pseudo, range)) = pseudo::scan(&line, pos) else {
            let width = line[pos..].chars().next().map_or(1, char::len_utf8);
            self.emit(
                TokenKind::ErrorToken,
                &line[pos..pos + width],
                self.at(pos),
                self.at(pos + width),
                line.clone(),
            );
            self.pos = pos + width;
            return;
        };

        let (start, mut end) = (range.start, range.end);
        let bang = std::mem::replace(&mut self.bang, BangState::Idle);
        if bang != BangState::Idle {
            match pseudo {
                Pseudo::Operator if line[start..end].starts_with('<') => end = start + 1,
                Pseudo::Continuation | Pseudo::Comment | Pseudo::Newline => self.bang = bang,
                _ => {}
            }
        }
        let text = &line[start..end];
        self.pos = end;
        match pseudo {
            Pseudo::Number => {
                self.emit(TokenKind::Number, text, self.at(start), self.at(end), line.clone())
            }
            Pseudo::Name => {
                self.emit(TokenKind::Name, text, self.at(start), self.at(end), line.clone())
            }
            Pseudo::Comment => {
                self.emit(TokenKind::Comment, text, self.at(start), self.at(end), line.clone())
            }
            Pseudo::Bang => {
                self.bang = BangState::AfterBang;
                self.emit(TokenKind::Bang, text, self.at(start), self.at(end), line.clone())
            }
            Pseudo::Newline => {
                let kind = if self.parenlev > 0 {
                    TokenKind::Nl
                } else {
                    TokenKind::Newline
                };
                self.emit(kind, text, self.at(start), self.at(end), line.clone());
            }
            Pseudo::Continuation => self.continued = true,
            Pseudo::TripleQuote => {
                let quote = Quote::of(text).unwrap_or(Quote::TripleDouble);
                match pseudo::string_end(&line, end, quote) {
                    Some(close) => {
                        self.emit(
                            TokenKind::String,
                            &line[start..close],
                            self.at(start),
                            self.at(close),
                            line.clone(),
                        );
                        self.pos = close;
                    }
                    None => self.open_string_at(start, quote, false),
                }
            }
            Pseudo::String => {
                if text.ends_with('\n') {
                    let quote = Quote::of(text).unwrap_or(Quote::Single);
                    self.open_string_at(start, quote, true);
                } else {
                    self.emit(TokenKind::String, text, self.at(start), self.at(end), line.clone());
                }
            }
            Pseudo::Operator | Pseudo::Bracket | Pseudo::Special => {
                match text {
                    "[" if bang == BangState::AfterBang => {
                        self.bang_arguments.push(self.parenlev);
                        self.parenlev += 1;
                    }
                    "(" | "[" | "{" => self.parenlev += 1,
                    ")" | "]" | "}" => {
                        self.parenlev = self.parenlev.saturating_sub(1);
                        if text == "]" && self.bang_arguments.last() == Some(&self.parenlev) {
                            self.bang_arguments.pop();
                            self.bang = BangState::AfterArgument;
                        }
                    }
                    _ => {}
                }
                let kind = TokenKind::from_operator(text).unwrap_or(TokenKind::Op);
                self.after_colon = text == ":";
                self.emit(kind, text, self.at(start), self.at(end), line.clone());
            }
        }
    }

    fn open_string_at(&mut self, start: usize, quote: Quote, needs_continuation: bool) {
        self.open_string = Some(OpenString {
            text: self.line[start..].to_string(),
            source: self.line.to_string(),
            start: self.at(start),
            quote,
            needs_continuation,
        });
        self.pos = self.line.len();
    }

    fn finish(&mut self) {
        for _ in 1..self.indents.len() {
            self.emit(
                TokenKind::Dedent,
                "",
                self.at(0),
                self.at(0),
                Arc::from(""),
            );
        }
        self.indents.truncate(1);
        self.end = Some(Token::new(
            TokenKind::EndMarker,
            "",
            self.at(0),
            self.at(0),
            Arc::from(""),
        ));
    }
}

/// Measures the leading blanks of a line: (column, byte offset of the first other char).
pub fn measure_indent(line: &str, tab_size: usize) -> (usize, usize) {
    let tab_size = tab_size.max(1);
    let mut column = 0;
    let mut pos = 0;
    for byte in line.bytes() {
        match byte {
            b' ' => column += 1,
            b'\t' => column = (column / tab_size + 1) * tab_size,
            b'\x0c' => column = 0,
            _ => break,
        }
        pos += 1;
    }
    (column, pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(source, &ParseEnv::default(), &LexerConfig::default())
    }

    fn raw(source: &str) -> Vec<(TokenKind, std::string::String)> {
        let mut stream = stream(source);
        let mut found = Vec::new();
        loop {
            let token = stream.next_raw_token().unwrap();
            let done = token.kind == EndMarker;
            found.push((token.kind, token.text));
            if done {
                return found;
            }
        }
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        raw(source).into_iter().map(|(kind, _)| kind).collect()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            raw("x = 1\n"),
            vec![
                (Name, "x".to_string()),
                (Equal, "=".to_string()),
                (Number, "1".to_string()),
                (Newline, "\n".to_string()),
                (EndMarker, "".to_string()),
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        assert_eq!(
            kinds("if x:\n    y\nz\n"),
            vec![Name, Name, Colon, Newline, Indent, Name, Newline, Dedent, Name, Newline, EndMarker]
        );
    }

    #[test]
    fn test_remaining_indents_close_at_eof() {
        assert_eq!(
            kinds("if x:\n  if y:\n    z\n"),
            vec![
                Name, Name, Colon, Newline, Indent, Name, Name, Colon, Newline, Indent, Name,
                Newline, Dedent, Dedent, EndMarker
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_trivia() {
        assert_eq!(
            kinds("\n# note\nx\n"),
            vec![Nl, Comment, Nl, Name, Newline, EndMarker]
        );
        let mut stream = stream("\n# note\nx\n");
        assert_eq!(stream.next_token().unwrap().kind, Name);
    }

    #[test]
    fn test_newlines_inside_brackets_are_nl() {
        assert_eq!(
            kinds("f(a,\n  b)\n"),
            vec![Name, LPar, Name, Comma, Nl, Name, RPar, Newline, EndMarker]
        );
    }

    #[test]
    fn test_backslash_continuation_skips_indentation() {
        assert_eq!(
            kinds("x = 1 + \\\n      2\n"),
            vec![Name, Equal, Number, Plus, Number, Newline, EndMarker]
        );
    }

    #[test]
    fn test_tabs_advance_to_tab_stops() {
        assert_eq!(measure_indent("\tx", 8), (8, 1));
        assert_eq!(measure_indent("  \tx", 8), (8, 3));
        assert_eq!(measure_indent("    \x0c  x", 8), (2, 7));
        assert_eq!(measure_indent("\tx", 4), (4, 1));
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let tokens = raw("s = '''a\nb''' + c\n");
        assert_eq!(tokens[2], (String, "'''a\nb'''".to_string()));
        assert_eq!(tokens[3], (Plus, "+".to_string()));
    }

    #[test]
    fn test_continued_single_quoted_string() {
        let tokens = raw("s = 'a\\\nb'\n");
        assert_eq!(tokens[2], (String, "'a\\\nb'".to_string()));
    }

    #[test]
    fn test_unterminated_triple_quote_reports_start() {
        let mut stream = stream("x = 1\ns = \"\"\"never\nclosed\n");
        let err = loop {
            match stream.next_raw_token() {
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert_eq!(
            err,
            LexError::UnterminatedString {
                start: Position::new(2, 4)
            }
        );
    }

    #[test]
    fn test_eof_inside_brackets() {
        let mut stream = stream("f(a,\n");
        let err = loop {
            match stream.next_raw_token() {
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert_eq!(err, LexError::UnterminatedStatement { line: 2 });
    }

    #[test]
    fn test_inconsistent_dedent() {
        let mut stream = stream("if x:\n    y\n  z\n");
        let err = loop {
            match stream.next_raw_token() {
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert_eq!(
            err,
            LexError::Dedent {
                line: 3,
                expected: vec![0, 4],
                found: 2
            }
        );
    }

    #[test]
    fn test_bang_versus_not_equal() {
        assert_eq!(
            kinds("a != !b\n"),
            vec![Name, NotEqual, Bang, Name, Newline, EndMarker]
        );
    }

    #[test]
    fn test_opener_after_bang_is_one_character() {
        assert_eq!(
            raw("!<<<b\n")[..3],
            [
                (Bang, "!".to_string()),
                (Less, "<".to_string()),
                (LeftShift, "<<".to_string()),
            ]
        );
        assert_eq!(kinds("! <=\n")[..3], [Bang, Less, Equal]);
        assert_eq!(kinds("a <= b <> c\n")[..4], [Name, LessEqual, Name, NotEqual]);
    }

    #[test]
    fn test_opener_after_bang_argument_is_one_character() {
        assert_eq!(
            kinds("![a[0]] <>\n")[..7],
            [Bang, LSqb, Name, LSqb, Number, RSqb, RSqb]
        );
        assert_eq!(kinds("![a[0]] <>\n")[7..9], [Less, Greater]);
        assert_eq!(kinds("[a] <>\n")[3], NotEqual);
    }

    #[test]
    fn test_unknown_character_is_an_error_token() {
        let tokens = raw("a $ b\n");
        assert_eq!(tokens[1], (ErrorToken, "$".to_string()));
        assert_eq!(tokens[2], (Name, "b".to_string()));
        let mut stream = stream("\u{e9}x\n");
        let token = stream.next_raw_token().unwrap();
        assert_eq!(token.text, "\u{e9}");
        assert_eq!((token.start.column, token.end.column), (0, 2));
    }

    #[test]
    fn test_offsets_apply_to_positions() {
        let env = ParseEnv::default().at(10, 4);
        let mut stream = TokenStream::new("x\n", &env, &LexerConfig::default());
        let token = stream.next_token().unwrap();
        assert_eq!(token.start, Position::new(10, 4));
        assert_eq!(token.end, Position::new(10, 5));
    }

    #[test]
    fn test_lookahead_is_not_consumed() {
        let mut stream = stream("a b\n");
        assert_eq!(stream.lookahead().unwrap().text, "a");
        assert!(stream.test_lookahead(&[Expected::Kind(Name)]).unwrap());
        assert_eq!(stream.next_token().unwrap().text, "a");
        assert_eq!(stream.next_token().unwrap().text, "b");
    }

    #[test]
    fn test_expect_reports_what_was_wanted() {
        let mut stream = stream("a\n");
        let err = stream.expect(&[Expected::Text(":")]).unwrap_err();
        match err {
            ParseFailure::Syntax(err) => {
                assert_eq!(err.text, "a");
                assert_eq!(err.expected, vec!["':'".to_string()]);
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[test]
    fn test_end_marker_repeats() {
        let mut stream = stream("");
        assert_eq!(stream.next_token().unwrap().kind, EndMarker);
        assert_eq!(stream.next_token().unwrap().kind, EndMarker);
    }
}
