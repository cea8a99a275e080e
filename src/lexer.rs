use std::fmt;
use std::sync::mpsc::sync_channel;
use std::thread;

use crate::cursor::Cursor;
use crate::error::InternalError;
use crate::stream::{Closed, DEFAULT_TOKEN_CAPACITY, TokenSink, TokenStream};
use crate::text::{is_identifier_break, is_pattern_break, is_valid_flag, trim_text};
use crate::token::{Span, Token, TokenKind};
use crate::trace;

const H_SPACE: &str = " \t";
const V_SPACE: &str = "\r\n";
const TRIMMED: &[char] = &[' ', '\t', '\r', '\n'];

/// Which operand of `ifeq` was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Left,
    Right,
}

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// Newline or end of input before the closing quote.
    UnterminatedString { literal: String },
    /// `$(` or `@(` not followed by an identifier.
    ExpectedVariableName,
    /// Variable reference without its closing `)`.
    ExpectedCloseParen { found: Option<char> },
    /// `!` not followed by an identifier.
    ExpectedMacroName,
    /// `%` followed by a letter outside `foObBedg%`.
    InvalidFlag { found: Option<char> },
    /// Macro name not followed by `=`.
    ExpectedAssign { found: Option<char> },
    /// Rule inputs followed by something other than `|>` or a newline.
    ExpectedPipe { found: Option<char> },
    /// Command section not closed by `|>` on the same line.
    UnterminatedCommand,
    /// Wrong punctuation inside `ifeq (a, b)`.
    IfeqExpected { expected: char, found: Option<char> },
    /// `ifeq` operand is not a variable, quoted string or identifier.
    IfeqEmptyOperand(Operand),
    /// `include` without a path.
    ExpectedIncludePath,
    /// Label dependency list not terminated by a newline.
    ExpectedNewline { found: Option<char> },
    /// A single space after a label where a code block needs two.
    ExpectedCodeBlockIndent { found: Option<char> },
    /// Neither a rule nor a code block after a label.
    UnexpectedAfterLabel { found: Option<char> },
    /// Top-level input no matcher accepts.
    Unparsed { snippet: String },
    /// A matcher misused the cursor.
    Internal(InternalError),
}

struct Found(Option<char>);

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(r) => write!(f, "{r:?}"),
            None => f.write_str("end of input"),
        }
    }
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString { literal } => {
                write!(f, "unterminated string literal {literal}")
            }
            Self::ExpectedVariableName => {
                write!(f, "expected identifier for variable reference")
            }
            Self::ExpectedCloseParen { found } => {
                write!(
                    f,
                    "invalid variable reference, expected ')', got {}",
                    Found(*found)
                )
            }
            Self::ExpectedMacroName => {
                write!(f, "expected identifier after '!'")
            }
            Self::InvalidFlag { found } => {
                write!(f, "invalid percent flag {}", Found(*found))
            }
            Self::ExpectedAssign { found } => {
                write!(f, "expected '=' after macro name, got {}", Found(*found))
            }
            Self::ExpectedPipe { found } => {
                write!(f, "rule definition: expected '|>', got {}", Found(*found))
            }
            Self::UnterminatedCommand => {
                write!(f, "expected '|>' to close the command")
            }
            Self::IfeqExpected { expected, found } => {
                write!(f, "ifeq: expected '{expected}', got {}", Found(*found))
            }
            Self::IfeqEmptyOperand(side) => {
                let side = match side {
                    Operand::Left => "left",
                    Operand::Right => "right",
                };
                write!(
                    f,
                    "ifeq: empty {side} expression, \
                     put variable, quoted string or identifier"
                )
            }
            Self::ExpectedIncludePath => {
                write!(f, "include: expected a path")
            }
            Self::ExpectedNewline { found } => {
                write!(
                    f,
                    "label declaration: expected new line, got {}",
                    Found(*found)
                )
            }
            Self::ExpectedCodeBlockIndent { found } => {
                write!(
                    f,
                    "expected at least two spaces for code blocks, got {}",
                    Found(*found)
                )
            }
            Self::UnexpectedAfterLabel { found } => {
                write!(
                    f,
                    "unexpected symbol {} after label declaration, \
                     expected code block or :-rule",
                    Found(*found)
                )
            }
            Self::Unparsed { snippet } => {
                write!(f, "unparsed statements {snippet}")
            }
            Self::Internal(err) => write!(f, "internal error: {err}"),
        }
    }
}

/// Error produced during lexing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}, column {}", span.line, span.column)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Tokenize a source string on the calling thread.
///
/// The trailing `Eof` token is not included.
///
/// # Errors
///
/// Returns the first `LexError`; scanning never resumes after one.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    Scanner::new("", input, &mut tokens).run();
    match tokens.pop() {
        Some(Token {
            kind: TokenKind::Error(kind),
            span,
            ..
        }) => Err(LexError { kind, span }),
        Some(token) if token.is_eof() => Ok(tokens),
        Some(token) => {
            tokens.push(token);
            Ok(tokens)
        }
        None => Ok(tokens),
    }
}

/// Start scanning `input` on its own thread.
///
/// `name` is used only in diagnostics.
#[must_use]
pub fn lex(name: &str, input: &str) -> TokenStream {
    lex_with_capacity(name, input, DEFAULT_TOKEN_CAPACITY)
}

/// Like [`lex`], with an explicit bound on tokens in flight.
#[must_use]
pub fn lex_with_capacity(name: &str, input: &str, capacity: usize) -> TokenStream {
    let (mut tx, rx) = sync_channel(capacity);
    let name = name.to_string();
    let input = input.to_string();
    let handle = thread::spawn(move || Scanner::new(&name, &input, &mut tx).run());
    TokenStream::new(rx, handle)
}

/// Outcome of a single matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexed {
    /// Nothing consumed, or a speculative read was rewound.
    Pass,
    Matched,
    /// A label line ended; leave the loop for the label-body state.
    BreakLabelBody,
}

/// Why scanning stopped early.
#[derive(Debug)]
enum Halt {
    Lex(LexError),
    Internal(InternalError),
    Closed,
}

impl From<InternalError> for Halt {
    fn from(err: InternalError) -> Self {
        Self::Internal(err)
    }
}

impl From<Closed> for Halt {
    fn from(_: Closed) -> Self {
        Self::Closed
    }
}

type Step = Result<Lexed, Halt>;

/// A sub-lexer tried at the current position.
type Matcher = fn(&mut Scanner<'_, '_>) -> Step;

/// A top-level scanner state; `None` ends the scan.
struct StateFn(fn(&mut Scanner<'_, '_>) -> Result<Option<StateFn>, Halt>);

struct Scanner<'a, 's> {
    name: &'a str,
    cursor: Cursor<'a>,
    /// Start of the pending free text.
    start: usize,
    sink: &'s mut dyn TokenSink,
    buffering: usize,
    buffer: Vec<Token>,
    last_emitted: Option<TokenKind>,
}

impl<'a, 's> Scanner<'a, 's> {
    fn new(name: &'a str, input: &'a str, sink: &'s mut dyn TokenSink) -> Self {
        Self {
            name,
            cursor: Cursor::new(input),
            start: 0,
            sink,
            buffering: 0,
            buffer: Vec::new(),
            last_emitted: None,
        }
    }

    fn run(mut self) {
        let err = match self.states() {
            Ok(()) | Err(Halt::Closed) => return,
            Err(Halt::Lex(err)) => err,
            Err(Halt::Internal(err)) => {
                trace::internal(self.name, &err);
                LexError {
                    kind: LexErrorKind::Internal(err),
                    span: self.span_at(self.cursor.pos()),
                }
            }
        };
        // Anything a speculative step was holding back is dropped.
        self.buffer.clear();
        let token = Token {
            text: err.kind.to_string(),
            kind: TokenKind::Error(err.kind),
            start: self.cursor.pos(),
            span: err.span,
        };
        // A closed channel here only means nobody wants the error.
        let _ = self.sink.push(token);
    }

    fn states(&mut self) -> Result<(), Halt> {
        lex_shebang(self)?;
        let mut state = Some(StateFn(state_initial));
        while let Some(StateFn(f)) = state {
            state = f(self)?;
        }
        Ok(())
    }

    // ---- cursor

    const fn pos(&self) -> usize {
        self.cursor.pos()
    }

    fn next(&mut self) -> Option<char> {
        self.cursor.next()
    }

    fn peek(&mut self) -> Result<Option<char>, Halt> {
        Ok(self.cursor.peek()?)
    }

    /// Undo the last rune and report that nothing matched.
    fn backup(&mut self) -> Step {
        self.cursor.backup()?;
        Ok(Lexed::Pass)
    }

    fn undo(&mut self) -> Result<(), Halt> {
        Ok(self.cursor.backup()?)
    }

    /// Skip the runes read so far.
    const fn discard(&mut self) {
        self.start = self.cursor.pos();
    }

    fn eat_identifier(&mut self) -> Result<&'a str, Halt> {
        let start = self.pos();
        while self.next().is_some_and(|r| !is_identifier_break(r)) {}
        self.undo()?;
        Ok(&self.cursor.input()[start..self.pos()])
    }

    fn eat_any_of(&mut self, chars: &str) -> Result<&'a str, Halt> {
        let start = self.pos();
        while self.next().is_some_and(|r| chars.contains(r)) {}
        self.undo()?;
        Ok(&self.cursor.input()[start..self.pos()])
    }

    fn eat_line(&mut self) -> Result<(), Halt> {
        while self.next().is_some_and(|r| r != '\n') {}
        self.undo()
    }

    /// Read `$(` or `@(`, returning the sigil, or rewind.
    fn eat_var_prefix(&mut self) -> Option<char> {
        let state = self.cursor.read_state();
        if let Some(sigil @ ('$' | '@')) = self.next() {
            if self.next() == Some('(') {
                return Some(sigil);
            }
        }
        self.cursor.set_read_state(state);
        None
    }

    // ---- output

    fn span_at(&self, offset: usize) -> Span {
        Span::new(self.cursor.line_at(offset), self.cursor.column_at(offset)).in_file(self.name)
    }

    fn halt(&self, kind: LexErrorKind) -> Halt {
        Halt::Lex(LexError {
            kind,
            span: self.span_at(self.pos()),
        })
    }

    fn fail_at(&self, kind: LexErrorKind, offset: usize) -> Step {
        Err(Halt::Lex(LexError {
            kind,
            span: self.span_at(offset),
        }))
    }

    fn fail(&self, kind: LexErrorKind) -> Step {
        Err(self.halt(kind))
    }

    fn emit_text(&mut self, kind: TokenKind, at: usize, text: &str) -> Step {
        let token = Token {
            kind,
            text: text.to_string(),
            start: at,
            span: self.span_at(at),
        };
        if self.buffering == 0 {
            self.last_emitted = Some(token.kind.clone());
            self.sink.push(token)?;
        } else {
            self.buffer.push(token);
        }
        self.discard();
        Ok(Lexed::Matched)
    }

    fn emit_range(&mut self, kind: TokenKind, from: usize, to: usize) -> Step {
        let text = &self.cursor.input()[from..to];
        self.emit_text(kind, from, text)
    }

    /// Emit the pending text without surrounding whitespace.
    fn emit_trimmed(&mut self, kind: TokenKind) -> Step {
        let raw = &self.cursor.input()[self.start..self.pos()];
        let lead = raw.len() - raw.trim_start_matches(TRIMMED).len();
        let at = self.start + lead;
        self.emit_text(kind, at, raw.trim_matches(TRIMMED))
    }

    const fn buffer_emits(&mut self, on: bool) {
        if on {
            self.buffering += 1;
        } else if self.buffering > 0 {
            self.buffering -= 1;
        }
    }

    fn flush(&mut self) -> Result<(), Halt> {
        for token in std::mem::take(&mut self.buffer) {
            self.last_emitted = Some(token.kind.clone());
            self.sink.push(token)?;
        }
        Ok(())
    }

    // ---- driving loops

    fn lex(&mut self, lexers: &[Matcher]) -> Step {
        self.lex_ws(lexers, true)
    }

    /// Apply `lexers` by priority while any of them matches.
    fn lex_ws(&mut self, lexers: &[Matcher], eat_hspace: bool) -> Step {
        let mut overall = Lexed::Pass;
        'next: loop {
            if eat_hspace {
                self.eat_any_of(H_SPACE)?;
                self.discard();
            }
            if self.peek()?.is_none() {
                return Ok(overall);
            }
            for lexer in lexers {
                match lexer(self)? {
                    Lexed::Pass => {}
                    Lexed::Matched => {
                        overall = Lexed::Matched;
                        continue 'next;
                    }
                    brk @ Lexed::BreakLabelBody => return Ok(brk),
                }
            }
            return Ok(overall);
        }
    }

    /// Try `lexers` once, in order, after optional horizontal space.
    fn lex_first(&mut self, lexers: &[Matcher]) -> Step {
        self.eat_any_of(H_SPACE)?;
        self.discard();
        for lexer in lexers {
            let res = lexer(self)?;
            if res != Lexed::Pass {
                return Ok(res);
            }
        }
        Ok(Lexed::Pass)
    }

    /// Apply `lexers` until one of `stop_lexers` matches, emitting the
    /// runes between matches as `rest` tokens.
    ///
    /// Matched tokens are buffered until the text before them has been
    /// emitted. The run also ends at a line break or end of input.
    fn lex_until(&mut self, lexers: &[Matcher], stop_lexers: &[Matcher], rest: &TokenKind) -> Step {
        let mut overall = Lexed::Pass;
        let mut rest_start = self.pos();
        let mut rest_end: Option<usize> = None;
        loop {
            let at = self.pos();
            self.buffer_emits(true);
            if self.lex_ws(lexers, false)? == Lexed::Matched {
                overall = Lexed::Matched;
            }
            let stop = self.lex_ws(stop_lexers, false)?;
            self.buffer_emits(false);

            if self.pos() > at {
                if let Some(end) = rest_end.take() {
                    if end > rest_start {
                        self.emit_range(rest.clone(), rest_start, end)?;
                    }
                }
            } else {
                if rest_end != Some(self.pos()) {
                    rest_start = self.pos();
                }
                match self.next() {
                    None => {}
                    Some('\n' | '\r') => self.undo()?,
                    Some(_) => {
                        self.discard();
                        rest_end = Some(self.pos());
                        self.flush()?;
                        continue;
                    }
                }
                if self.pos() > rest_start {
                    self.emit_range(rest.clone(), rest_start, self.pos())?;
                }
                self.flush()?;
                return Ok(overall);
            }
            self.flush()?;

            if stop == Lexed::Matched {
                return Ok(overall);
            }
        }
    }

    fn last_emitted_is(&self, kind: &TokenKind) -> bool {
        self.last_emitted.as_ref() == Some(kind)
    }
}

// ---- matchers

fn lex_colon(s: &mut Scanner<'_, '_>) -> Step {
    let at = s.pos();
    if s.next() != Some(':') {
        return s.backup();
    }
    s.emit_range(TokenKind::Colon, at, s.pos())
}

fn lex_macro(s: &mut Scanner<'_, '_>) -> Step {
    if s.next() != Some('!') {
        return s.backup();
    }
    let at = s.pos();
    if s.eat_identifier()?.is_empty() {
        return s.fail(LexErrorKind::ExpectedMacroName);
    }
    s.emit_range(TokenKind::Macro, at, s.pos())
}

fn lex_identifier(s: &mut Scanner<'_, '_>) -> Step {
    let at = s.pos();
    if s.eat_identifier()?.is_empty() {
        return Ok(Lexed::Pass);
    }
    s.emit_range(TokenKind::Identifier, at, s.pos())
}

fn lex_quoted_string(s: &mut Scanner<'_, '_>) -> Step {
    let at = s.pos();
    if s.next() != Some('"') {
        return s.backup();
    }
    let mut escaped = false;
    loop {
        match s.next() {
            None | Some('\n') => {
                let literal = trim_text(s.cursor.input()[at..s.pos()].trim_end(), 25);
                return s.fail_at(LexErrorKind::UnterminatedString { literal }, at);
            }
            Some(_) if escaped => escaped = false,
            Some('\\') => escaped = true,
            Some('"') => break,
            Some(_) => {}
        }
    }
    s.emit_range(TokenKind::QuotedString, at, s.pos())
}

fn lex_variable(s: &mut Scanner<'_, '_>) -> Step {
    let Some(sigil) = s.eat_var_prefix() else {
        return Ok(Lexed::Pass);
    };
    let kind = if sigil == '@' {
        TokenKind::AtVariable
    } else {
        TokenKind::Variable
    };
    let at = s.pos();
    if s.eat_identifier()?.is_empty() {
        return s.fail(LexErrorKind::ExpectedVariableName);
    }
    let end = s.pos();
    match s.next() {
        Some(')') => s.emit_range(kind, at, end),
        found => s.fail(LexErrorKind::ExpectedCloseParen { found }),
    }
}

fn lex_path_pattern(s: &mut Scanner<'_, '_>) -> Step {
    let at = s.pos();
    while s.next().is_some_and(|r| !is_pattern_break(r)) {}
    s.undo()?;
    if s.pos() > at {
        return s.emit_range(TokenKind::PathPattern, at, s.pos());
    }
    Ok(Lexed::Pass)
}

fn lex_percent_flag(s: &mut Scanner<'_, '_>) -> Step {
    if s.next() != Some('%') {
        return s.backup();
    }
    let at = s.pos();
    match s.next() {
        Some(r) if is_valid_flag(r) => s.emit_range(TokenKind::PercentFlag, at, s.pos()),
        found => s.fail(LexErrorKind::InvalidFlag { found }),
    }
}

fn lex_pipe(s: &mut Scanner<'_, '_>) -> Step {
    let state = s.cursor.read_state();
    let at = s.pos();
    if s.next() != Some('|') {
        return s.backup();
    }
    if s.next() == Some('>') {
        return s.emit_range(TokenKind::Pipe, at, s.pos());
    }
    s.cursor.set_read_state(state);
    Ok(Lexed::Pass)
}

/// `|>` after optional horizontal space; the space is rewound on a miss.
fn lex_ws_pipe(s: &mut Scanner<'_, '_>) -> Step {
    let state = s.cursor.read_state();
    s.eat_any_of(H_SPACE)?;
    s.discard();
    let res = lex_pipe(s)?;
    if res == Lexed::Pass {
        s.cursor.set_read_state(state);
        s.discard();
    }
    Ok(res)
}

fn lex_foreach(s: &mut Scanner<'_, '_>) -> Step {
    let state = s.cursor.read_state();
    let at = s.pos();
    if s.eat_identifier()? == "foreach" {
        return s.emit_range(TokenKind::KeywordForeach, at, s.pos());
    }
    s.cursor.set_read_state(state);
    Ok(Lexed::Pass)
}

/// `=` or `+=`.
fn lex_operator(s: &mut Scanner<'_, '_>) -> Step {
    let state = s.cursor.read_state();
    let at = s.pos();
    match s.next() {
        Some('=') => return s.emit_range(TokenKind::Assign, at, s.pos()),
        Some('+') if s.next() == Some('=') => {
            return s.emit_range(TokenKind::PlusAssign, at, s.pos());
        }
        _ => {}
    }
    s.cursor.set_read_state(state);
    Ok(Lexed::Pass)
}

fn lex_comments(s: &mut Scanner<'_, '_>) -> Step {
    comments(s, false)?;
    Ok(Lexed::Pass)
}

fn drop_comments(s: &mut Scanner<'_, '_>) -> Result<(), Halt> {
    comments(s, true)
}

fn comments(s: &mut Scanner<'_, '_>, silent: bool) -> Result<(), Halt> {
    s.eat_any_of(H_SPACE)?;
    if s.next() == Some('#') {
        s.discard();
        s.eat_line()?;
        if silent {
            s.discard();
        } else {
            s.emit_trimmed(TokenKind::Comment)?;
        }
        return Ok(());
    }
    s.undo()?;
    s.discard();
    Ok(())
}

/// Blank lines and comments.
fn eat_spaces(s: &mut Scanner<'_, '_>) -> Step {
    loop {
        let at = s.pos();
        s.eat_any_of(V_SPACE)?;
        lex_comments(s)?;
        if s.pos() == at {
            return Ok(Lexed::Pass);
        }
    }
}

fn lex_shebang(s: &mut Scanner<'_, '_>) -> Result<(), Halt> {
    if !s.cursor.input().starts_with("#!") {
        return Ok(());
    }
    s.next();
    s.next();
    s.discard();
    s.eat_line()?;
    s.emit_trimmed(TokenKind::Shebang)?;
    Ok(())
}

// example: "foo/bar" $(foo) src/common/*.css
const INPUT_PATTERN_LEXERS: &[Matcher] = &[lex_quoted_string, lex_variable, lex_path_pattern];

// "asd" $(abc) !macro %f
const COMMAND_LEXERS: &[Matcher] = &[lex_quoted_string, lex_variable, lex_macro, lex_percent_flag];

const COMMAND_STOP_LEXERS: &[Matcher] = &[lex_ws_pipe];

const IF_EXP_LEXERS: &[Matcher] = &[lex_variable, lex_quoted_string, lex_identifier];

const INCLUDE_PATH_LEXERS: &[Matcher] = &[lex_quoted_string, lex_variable, lex_path_pattern];

const DEST_LEXERS: &[Matcher] = &[lex_path_pattern];

const LABEL_DEPS_LEXERS: &[Matcher] = &[lex_identifier];

const TOP_LEVEL_LEXERS: &[Matcher] = &[
    eat_spaces,
    lex_macro_def,
    lex_rule_def,
    lex_top_level_identifier,
];

fn lex_rule_dest(s: &mut Scanner<'_, '_>) -> Step {
    s.lex_first(DEST_LEXERS)
}

fn lex_rule_command(s: &mut Scanner<'_, '_>) -> Step {
    s.eat_any_of(H_SPACE)?;
    s.discard();
    s.lex_until(COMMAND_LEXERS, COMMAND_STOP_LEXERS, &TokenKind::String)?;

    if !s.last_emitted_is(&TokenKind::Pipe) {
        return s.fail(LexErrorKind::UnterminatedCommand);
    }
    lex_rule_dest(s)?;
    Ok(Lexed::Matched)
}

// foreach src/common.css $(foo) |> cat %f | csso -o %o |> dest.css
fn lex_rule_head(s: &mut Scanner<'_, '_>) -> Step {
    lex_foreach(s)?;
    s.lex(INPUT_PATTERN_LEXERS)?;

    let r = s.peek()?;
    if matches!(r, None | Some('\n' | '\r')) {
        return Ok(Lexed::Matched);
    }
    if lex_pipe(s)? != Lexed::Matched {
        return s.fail(LexErrorKind::ExpectedPipe { found: r });
    }
    lex_rule_command(s)
}

// !macro_name = <rule head>
fn lex_macro_def(s: &mut Scanner<'_, '_>) -> Step {
    if lex_macro(s)? != Lexed::Matched {
        return Ok(Lexed::Pass);
    }
    s.eat_any_of(H_SPACE)?;
    let at = s.pos();
    match s.next() {
        Some('=') => s.emit_range(TokenKind::Assign, at, s.pos())?,
        found => return s.fail(LexErrorKind::ExpectedAssign { found }),
    };
    s.eat_any_of(H_SPACE)?;
    s.discard();
    lex_rule_head(s)?;
    Ok(Lexed::Matched)
}

// : <rule head>
fn lex_rule_def(s: &mut Scanner<'_, '_>) -> Step {
    if lex_colon(s)? != Lexed::Matched {
        return Ok(Lexed::Pass);
    }
    s.eat_any_of(H_SPACE)?;
    s.discard();
    lex_rule_head(s)?;
    Ok(Lexed::Matched)
}

// ifeq (a, b)
fn lex_ifeq(s: &mut Scanner<'_, '_>) -> Step {
    s.eat_any_of(H_SPACE)?;
    match s.next() {
        Some('(') => s.discard(),
        found => {
            return s.fail(LexErrorKind::IfeqExpected {
                expected: '(',
                found,
            });
        }
    }
    if s.lex_first(IF_EXP_LEXERS)? == Lexed::Pass {
        return s.fail(LexErrorKind::IfeqEmptyOperand(Operand::Left));
    }

    s.eat_any_of(H_SPACE)?;
    let at = s.pos();
    match s.next() {
        Some(',') => s.emit_range(TokenKind::Comma, at, s.pos())?,
        found => {
            return s.fail(LexErrorKind::IfeqExpected {
                expected: ',',
                found,
            });
        }
    };
    if s.lex_first(IF_EXP_LEXERS)? == Lexed::Pass {
        return s.fail(LexErrorKind::IfeqEmptyOperand(Operand::Right));
    }

    s.eat_any_of(H_SPACE)?;
    match s.next() {
        Some(')') => s.discard(),
        found => {
            return s.fail(LexErrorKind::IfeqExpected {
                expected: ')',
                found,
            });
        }
    }
    drop_comments(s)?;
    Ok(Lexed::Matched)
}

fn lex_include(s: &mut Scanner<'_, '_>) -> Step {
    if s.lex_first(INCLUDE_PATH_LEXERS)? == Lexed::Pass {
        return s.fail(LexErrorKind::ExpectedIncludePath);
    }
    Ok(Lexed::Matched)
}

/// `= value` or `+= value` after a top-level identifier.
fn lex_assignment(s: &mut Scanner<'_, '_>) -> Step {
    let state = s.cursor.read_state();
    s.eat_any_of(H_SPACE)?;
    if lex_operator(s)? == Lexed::Pass {
        s.cursor.set_read_state(state);
        s.discard();
        return Ok(Lexed::Matched);
    }
    s.eat_any_of(H_SPACE)?;
    s.discard();
    s.eat_line()?;
    if s.cursor.input()[s.start..s.pos()].trim_matches(TRIMMED).is_empty() {
        s.discard();
        return Ok(Lexed::Matched);
    }
    s.emit_trimmed(TokenKind::String)
}

fn lex_label_deps(s: &mut Scanner<'_, '_>) -> Step {
    s.lex(LABEL_DEPS_LEXERS)?;
    let mut r = s.next();
    if r == Some('\r') {
        r = s.next();
    }
    if r != Some('\n') {
        return s.fail(LexErrorKind::ExpectedNewline { found: r });
    }
    s.discard();
    Ok(Lexed::BreakLabelBody)
}

fn lex_top_level_identifier(s: &mut Scanner<'_, '_>) -> Step {
    let at = s.pos();
    let id = s.eat_identifier()?;
    if id.is_empty() {
        return Ok(Lexed::Pass);
    }

    if let Some(keyword) = TokenKind::keyword(id) {
        s.emit_range(keyword.clone(), at, s.pos())?;
        return match keyword {
            TokenKind::KeywordIfeq => lex_ifeq(s),
            TokenKind::KeywordInclude => lex_include(s),
            _ => Ok(Lexed::Matched),
        };
    }

    let end = s.pos();
    if s.next() == Some(':') {
        s.emit_range(TokenKind::Label, at, end)?;
        return lex_label_deps(s);
    }
    s.undo()?;

    // otherwise a free identifier, possibly assigned to
    s.emit_range(TokenKind::Identifier, at, end)?;
    lex_assignment(s)
}

// ---- states

fn state_code_block(s: &mut Scanner<'_, '_>) -> Result<Option<StateFn>, Halt> {
    loop {
        s.eat_any_of(H_SPACE)?;
        s.discard();
        while s.next().is_some_and(|r| r != '\n') {}
        if s.cursor.input()[s.start..s.pos()].trim_matches(TRIMMED).is_empty() {
            s.discard();
        } else {
            s.emit_trimmed(TokenKind::String)?;
        }

        let state = s.cursor.read_state();
        if s.next() == Some(' ') && s.next() == Some(' ') {
            continue;
        }
        s.cursor.set_read_state(state);
        s.discard();
        return Ok(Some(StateFn(state_initial)));
    }
}

fn state_label_body(s: &mut Scanner<'_, '_>) -> Result<Option<StateFn>, Halt> {
    match s.next() {
        Some(':') => {
            // a label for the rules that follow
            s.undo()?;
            Ok(Some(StateFn(state_initial)))
        }
        Some(' ') => match s.next() {
            Some(' ') => Ok(Some(StateFn(state_code_block))),
            found => Err(s.halt(LexErrorKind::ExpectedCodeBlockIndent { found })),
        },
        None => Ok(Some(StateFn(state_initial))),
        found => Err(s.halt(LexErrorKind::UnexpectedAfterLabel { found })),
    }
}

fn state_initial(s: &mut Scanner<'_, '_>) -> Result<Option<StateFn>, Halt> {
    if s.lex(TOP_LEVEL_LEXERS)? == Lexed::BreakLabelBody {
        return Ok(Some(StateFn(state_label_body)));
    }
    if s.cursor.at_end() {
        let end = s.pos();
        s.emit_range(TokenKind::Eof, end, end)?;
        return Ok(None);
    }
    let rest = &s.cursor.input()[s.pos()..];
    let line = rest.lines().next().unwrap_or_default();
    Err(s.halt(LexErrorKind::Unparsed {
        snippet: trim_text(line, 25),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_text(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input)
            .expect("should tokenize")
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn tok(kind: TokenKind, text: &str) -> (TokenKind, String) {
        (kind, text.to_string())
    }

    #[test]
    fn buffered_tokens_follow_preceding_text() {
        let got = kinds_and_text(": a.js |> echo $(xv) \"|>\" |> b.js");
        assert_eq!(
            got,
            vec![
                tok(TokenKind::Colon, ":"),
                tok(TokenKind::PathPattern, "a.js"),
                tok(TokenKind::Pipe, "|>"),
                tok(TokenKind::String, "echo "),
                tok(TokenKind::Variable, "xv"),
                tok(TokenKind::String, " "),
                tok(TokenKind::QuotedString, "\"|>\""),
                tok(TokenKind::Pipe, "|>"),
                tok(TokenKind::PathPattern, "b.js"),
            ]
        );
    }

    #[test]
    fn lone_bar_is_command_text() {
        let got = kinds_and_text(": a |> cat | sort |> b");
        assert_eq!(got[3], tok(TokenKind::String, "cat | sort"));
        assert_eq!(got[4].0, TokenKind::Pipe);
    }

    #[test]
    fn error_discards_buffered_tokens() {
        let mut sink: Vec<Token> = Vec::new();
        Scanner::new("", ": a |> echo $(x)!", &mut sink).run();
        let last = sink.last().expect("error token");
        assert!(matches!(
            last.kind,
            TokenKind::Error(LexErrorKind::ExpectedMacroName)
        ));
        assert!(
            !sink
                .iter()
                .any(|t| matches!(t.kind, TokenKind::Variable | TokenKind::String))
        );
        assert_eq!(sink.iter().filter(|t| t.is_error()).count(), 1);
    }

    #[test]
    fn closed_sink_stops_scanner() {
        struct Hangup(usize);
        impl TokenSink for Hangup {
            fn push(&mut self, _: Token) -> Result<(), Closed> {
                self.0 += 1;
                Err(Closed)
            }
        }
        let mut sink = Hangup(0);
        Scanner::new("", "a\nb\nc\n", &mut sink).run();
        assert_eq!(sink.0, 1);
    }

    #[test]
    fn spans_point_at_token_start() {
        let tokens = tokenize("\n: src/a.css |> cat |> out").expect("should tokenize");
        assert_eq!(tokens[0].span, Span::new(2, 1));
        assert_eq!(tokens[1].span, Span::new(2, 3));
        assert_eq!(tokens[1].start, 3);
    }

    #[test]
    fn error_span_is_named() {
        let mut sink: Vec<Token> = Vec::new();
        Scanner::new("Vakefile", "\n\n  !", &mut sink).run();
        let last = sink.last().expect("error token");
        assert_eq!(last.span.file.as_deref(), Some("Vakefile"));
        assert_eq!(last.span.line, 3);
    }
}
