use std::fmt;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};

use crate::ast::{IncludeNode, LabelNode, MacroNode, Node, RuleNode, VariableNode};
use crate::env::ParserEnv;
use crate::error::{Error, InternalError};
use crate::lexer::{LexError, lex_with_capacity};
use crate::lookahead::Lookahead;
use crate::stream::{DEFAULT_TOKEN_CAPACITY, TokenStream};
use crate::token::{Span, Token, TokenKind};
use crate::trace;

/// Default bound of the node channel.
pub const DEFAULT_NODE_CAPACITY: usize = 16;

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A specific token kind was required.
    ExpectedToken { expected: TokenKind, found: String },
    /// A rule with no inputs before its `|>`.
    EmptyInput,
    /// `|> |>` with nothing in between.
    EmptyCommand,
    UndefinedMacro { name: String },
    UndefinedVariable { name: String },
    /// A token that cannot start or continue a statement here.
    UnexpectedToken { found: String },
    /// `else` outside any conditional.
    UnexpectedElse,
    /// A second `else` in the same conditional.
    DuplicateElse,
    /// `endif` outside any conditional.
    UnexpectedEndif,
    /// Input ended inside a conditional.
    UnterminatedConditional { keyword: TokenKind },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedToken { expected, found } => {
                write!(f, "expected {expected}, got {found}")
            }
            Self::EmptyInput => write!(f, "empty input for rule"),
            Self::EmptyCommand => write!(f, "expected non-empty command body"),
            Self::UndefinedMacro { name } => write!(f, "macro {name} is not defined"),
            Self::UndefinedVariable { name } => {
                write!(f, "variable {name} is not defined")
            }
            Self::UnexpectedToken { found } => write!(f, "unexpected token {found}"),
            Self::UnexpectedElse => write!(f, "'else' without a matching conditional"),
            Self::DuplicateElse => write!(f, "conditional already has an 'else' branch"),
            Self::UnexpectedEndif => {
                write!(f, "'endif' without a matching conditional")
            }
            Self::UnterminatedConditional { keyword } => {
                write!(f, "{keyword} is never closed by 'endif'")
            }
        }
    }
}

/// Error produced during parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}, column {}", span.line, span.column)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

/// Settings for one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Shown in diagnostics as `Span::file`.
    pub name: String,
    /// Bound of the scanner to parser channel.
    pub token_capacity: usize,
    /// Bound of the parser to caller channel.
    pub node_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: String::new(),
            token_capacity: DEFAULT_TOKEN_CAPACITY,
            node_capacity: DEFAULT_NODE_CAPACITY,
        }
    }
}

impl Options {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_token_capacity(mut self, capacity: usize) -> Self {
        self.token_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_node_capacity(mut self, capacity: usize) -> Self {
        self.node_capacity = capacity;
        self
    }
}

/// Parse `input` on a background thread.
///
/// Nodes are produced while the scanner is still running. `env` supplies
/// the macros and variables defined earlier; [`Parse::finish`] hands it
/// back with this input's definitions added.
#[must_use]
pub fn parse(name: &str, input: &str, env: ParserEnv) -> Parse {
    parse_with(Options::new(name), input, env)
}

/// Like [`parse`], with explicit [`Options`].
#[must_use]
pub fn parse_with(options: Options, input: &str, env: ParserEnv) -> Parse {
    let (node_tx, nodes) = sync_channel(options.node_capacity);
    let (error_tx, errors) = sync_channel(1);
    let tokens = lex_with_capacity(&options.name, input, options.token_capacity);
    let name = options.name;

    let handle = thread::spawn(move || {
        let mut parser = Parser::new(name, tokens, env, node_tx);
        let result = parser.run();
        let Parser {
            name, tokens, env, ..
        } = parser;
        if let Err(Halt::Error(err)) = result {
            if let Error::Internal(internal) = &err {
                trace::internal(&name, internal);
            }
            tokens.into_inner().drain();
            // The slot is free: at most one error is ever sent.
            let _ = error_tx.send(err);
        }
        env
    });

    Parse {
        nodes,
        errors,
        handle: Some(handle),
        outcome: None,
    }
}

/// A running parse.
///
/// Iterating yields the nodes in source order, then at most one error.
/// Dropping the handle early stops the parser at its next node.
#[derive(Debug)]
pub struct Parse {
    nodes: Receiver<Node>,
    errors: Receiver<Error>,
    handle: Option<JoinHandle<ParserEnv>>,
    outcome: Option<Result<ParserEnv, Error>>,
}

impl Parse {
    /// Wait for the parse to end, discarding nodes not yet received.
    ///
    /// Returns the environment with this input's definitions, or the
    /// error that stopped the parse.
    pub fn finish(mut self) -> Result<ParserEnv, Error> {
        loop {
            if let Some(outcome) = self.outcome.take() {
                return outcome;
            }
            let _ = self.next();
        }
    }

    /// Join the parser thread once the node channel has closed.
    fn settle(&mut self) -> Result<ParserEnv, Error> {
        let joined = self.handle.take().map(JoinHandle::join);
        if let Ok(err) = self.errors.try_recv() {
            return Err(err);
        }
        match joined {
            Some(Ok(env)) => Ok(env),
            _ => Err(Error::Internal(InternalError::WorkerPanicked)),
        }
    }
}

impl Iterator for Parse {
    type Item = Result<Node, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.outcome.is_some() {
            return None;
        }
        if let Ok(node) = self.nodes.recv() {
            return Some(Ok(node));
        }
        let outcome = self.settle();
        let err = outcome.as_ref().err().cloned();
        self.outcome = Some(outcome);
        err.map(Err)
    }
}

impl Drop for Parse {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let (_, rx) = sync_channel(0);
            drop(std::mem::replace(&mut self.nodes, rx));
            let _ = handle.join();
        }
    }
}

/// Why the parser stopped early.
#[derive(Debug)]
enum Halt {
    Error(Error),
    /// The caller dropped the node receiver.
    Closed,
}

impl Halt {
    fn at(kind: ParseErrorKind, token: &Token) -> Self {
        Self::Error(Error::Parse(ParseError {
            kind,
            span: token.span.clone(),
        }))
    }

    fn unexpected(token: &Token) -> Self {
        Self::at(
            ParseErrorKind::UnexpectedToken {
                found: token.to_string(),
            },
            token,
        )
    }
}

impl From<InternalError> for Halt {
    fn from(err: InternalError) -> Self {
        Self::Error(Error::Internal(err))
    }
}

impl From<LexError> for Halt {
    fn from(err: LexError) -> Self {
        Self::Error(err.into())
    }
}

/// Which statement a rule head belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    /// `: ...`, needs inputs, a command and an output.
    Rule,
    /// `!name = ...`, everything optional.
    MacroBody,
}

/// An open `ifeq`/`ifdef`/`ifndef`.
#[derive(Debug)]
struct Conditional {
    keyword: Token,
    else_seen: bool,
}

struct Parser {
    name: String,
    tokens: Lookahead<TokenStream>,
    env: ParserEnv,
    nodes: SyncSender<Node>,
    conditionals: Vec<Conditional>,
}

impl Parser {
    fn new(name: String, tokens: TokenStream, env: ParserEnv, nodes: SyncSender<Node>) -> Self {
        Self {
            name,
            tokens: Lookahead::new(tokens),
            env,
            nodes,
            conditionals: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<(), Halt> {
        loop {
            let token = self.peek()?;
            match token.kind {
                TokenKind::Eof => {
                    self.next()?;
                    return self.close();
                }
                TokenKind::Comment | TokenKind::Shebang => {
                    self.next()?;
                }
                TokenKind::Colon => {
                    let rule = self.parse_rule()?;
                    self.emit(Node::Rule(rule))?;
                }
                TokenKind::Macro => {
                    let node = self.parse_macro_def()?;
                    self.emit(Node::Macro(node))?;
                }
                TokenKind::Identifier => {
                    let Some(node) = self.parse_assignment()? else {
                        let token = self.next()?;
                        return Err(Halt::unexpected(&token));
                    };
                    self.emit(Node::Variable(node))?;
                }
                TokenKind::Label => {
                    let node = self.parse_label()?;
                    self.emit(Node::Label(node))?;
                }
                TokenKind::KeywordInclude => {
                    let node = self.parse_include()?;
                    self.emit(Node::Include(node))?;
                }
                TokenKind::KeywordIncludeRules => {
                    self.next()?;
                    self.emit(Node::IncludeRules)?;
                }
                TokenKind::KeywordIfeq | TokenKind::KeywordIfdef | TokenKind::KeywordIfndef => {
                    self.parse_conditional()?;
                }
                TokenKind::KeywordElse => self.parse_else()?,
                TokenKind::KeywordEndif => self.parse_endif()?,
                _ => {
                    let token = self.next()?;
                    return Err(Halt::unexpected(&token));
                }
            }
        }
    }

    // ---- tokens

    fn next(&mut self) -> Result<Token, Halt> {
        let token = self.tokens.next()?;
        trace::token(&self.name, &token);
        reject_error(token)
    }

    fn peek(&mut self) -> Result<Token, Halt> {
        reject_error(self.tokens.peek()?)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, Halt> {
        let token = self.next()?;
        if token.kind != *kind {
            return Err(Halt::at(
                ParseErrorKind::ExpectedToken {
                    expected: kind.clone(),
                    found: token.to_string(),
                },
                &token,
            ));
        }
        Ok(token)
    }

    /// Texts of the run of `kind` tokens at the cursor.
    fn read_while(&mut self, kind: &TokenKind) -> Result<Vec<String>, Halt> {
        let mut out = Vec::new();
        while self.peek()?.kind == *kind {
            out.push(self.next()?.text);
        }
        Ok(out)
    }

    fn emit(&self, node: Node) -> Result<(), Halt> {
        self.nodes.send(node).map_err(|_| Halt::Closed)
    }

    fn var(&self, token: &Token) -> Result<String, Halt> {
        self.env.var(&token.text).map(str::to_string).ok_or_else(|| {
            Halt::at(
                ParseErrorKind::UndefinedVariable {
                    name: token.text.clone(),
                },
                token,
            )
        })
    }

    // ---- rules

    // :src/*.js |> !bundle_js |> app/bundle.js
    // :foreach src/*.js |> !bundle_js |> app/%b
    fn parse_rule(&mut self) -> Result<RuleNode, Halt> {
        self.expect(&TokenKind::Colon)?;
        self.parse_rule_head(Head::Rule)
    }

    fn parse_rule_head(&mut self, head: Head) -> Result<RuleNode, Halt> {
        let mut rule = RuleNode::default();
        if self.peek()?.kind == TokenKind::KeywordForeach {
            self.next()?;
            rule.foreach = true;
        }
        rule.inputs = self.parse_inputs()?;

        let after = self.peek()?;
        match head {
            Head::Rule if rule.inputs.is_empty() => {
                return Err(Halt::at(ParseErrorKind::EmptyInput, &after));
            }
            Head::MacroBody if after.kind != TokenKind::Pipe => return Ok(rule),
            _ => {}
        }
        self.expect(&TokenKind::Pipe)?;
        self.parse_command(&mut rule)?;

        let output = match head {
            Head::Rule => Some(self.expect(&TokenKind::PathPattern)?),
            Head::MacroBody if self.peek()?.kind == TokenKind::PathPattern => Some(self.next()?),
            Head::MacroBody => None,
        };
        if let Some(output) = output {
            if !rule.output.is_empty() {
                rule.output.push(' ');
            }
            rule.output.push_str(&output.text);
        }
        Ok(rule)
    }

    fn parse_inputs(&mut self) -> Result<Vec<String>, Halt> {
        let mut inputs = Vec::new();
        loop {
            let token = self.peek()?;
            let input = match token.kind {
                TokenKind::PathPattern | TokenKind::QuotedString => token.text,
                TokenKind::Variable => self.var(&token)?,
                TokenKind::AtVariable => format!("@({})", token.text),
                _ => return Ok(inputs),
            };
            self.next()?;
            inputs.push(input);
        }
    }

    /// Everything up to and including the closing `|>`.
    fn parse_command(&mut self, rule: &mut RuleNode) -> Result<(), Halt> {
        let mut eaten = false;
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Macro => {
                    let body = self.env.macro_rule(&token.text).ok_or_else(|| {
                        Halt::at(
                            ParseErrorKind::UndefinedMacro {
                                name: token.text.clone(),
                            },
                            &token,
                        )
                    })?;
                    rule.command.clone_from(&body.command);
                    rule.output.clone_from(&body.output);
                    self.expect(&TokenKind::Pipe)?;
                    return Ok(());
                }
                TokenKind::Variable => {
                    let value = self.var(&token)?;
                    rule.command.push_str(&value);
                }
                TokenKind::String | TokenKind::QuotedString => rule.command.push_str(&token.text),
                TokenKind::PercentFlag => {
                    rule.command.push('%');
                    rule.command.push_str(&token.text);
                }
                TokenKind::Pipe if !eaten => {
                    return Err(Halt::at(ParseErrorKind::EmptyCommand, &token));
                }
                TokenKind::Pipe => return Ok(()),
                _ => return Err(Halt::unexpected(&token)),
            }
            eaten = true;
        }
    }

    // !name = <rule head>
    fn parse_macro_def(&mut self) -> Result<MacroNode, Halt> {
        let name = self.expect(&TokenKind::Macro)?.text;
        self.expect(&TokenKind::Assign)?;
        let body = self.parse_rule_head(Head::MacroBody)?;
        self.env.define_macro(name.clone(), body);
        Ok(MacroNode { name })
    }

    // ---- other statements

    /// `NAME = value` or `NAME += value`; `None` leaves a bare identifier
    /// unread.
    fn parse_assignment(&mut self) -> Result<Option<VariableNode>, Halt> {
        self.tokens.keep();
        let name = self.expect(&TokenKind::Identifier)?.text;
        let append = match self.next()?.kind {
            TokenKind::Assign => false,
            TokenKind::PlusAssign => true,
            _ => {
                self.tokens.restore()?;
                return Ok(None);
            }
        };
        self.tokens.release();

        let value = if self.peek()?.kind == TokenKind::String {
            self.next()?.text
        } else {
            String::new()
        };
        if append {
            self.env.append_var(name.clone(), &value);
        } else {
            self.env.define_var(name.clone(), value);
        }
        Ok(Some(VariableNode { name, append }))
    }

    fn parse_label(&mut self) -> Result<LabelNode, Halt> {
        let name = self.expect(&TokenKind::Label)?.text;
        let deps = self.read_while(&TokenKind::Identifier)?;
        let code = self.read_while(&TokenKind::String)?;
        Ok(LabelNode { name, deps, code })
    }

    fn parse_include(&mut self) -> Result<IncludeNode, Halt> {
        self.expect(&TokenKind::KeywordInclude)?;
        let token = self.next()?;
        let path = match token.kind {
            TokenKind::PathPattern | TokenKind::QuotedString => token.text,
            TokenKind::Variable => self.var(&token)?,
            _ => {
                return Err(Halt::at(
                    ParseErrorKind::ExpectedToken {
                        expected: TokenKind::PathPattern,
                        found: token.to_string(),
                    },
                    &token,
                ));
            }
        };
        Ok(IncludeNode { path })
    }

    // ---- conditionals

    fn parse_conditional(&mut self) -> Result<(), Halt> {
        let keyword = self.next()?;
        let holds = match keyword.kind {
            TokenKind::KeywordIfeq => {
                let left = self.operand()?;
                self.expect(&TokenKind::Comma)?;
                let right = self.operand()?;
                left == right
            }
            TokenKind::KeywordIfdef => self.defined()?,
            _ => !self.defined()?,
        };
        self.conditionals.push(Conditional {
            keyword,
            else_seen: false,
        });
        if holds {
            return Ok(());
        }
        self.skip_branch()
    }

    fn parse_else(&mut self) -> Result<(), Halt> {
        let token = self.expect(&TokenKind::KeywordElse)?;
        match self.conditionals.last_mut() {
            Some(open) if !open.else_seen => open.else_seen = true,
            Some(_) => return Err(Halt::at(ParseErrorKind::DuplicateElse, &token)),
            None => return Err(Halt::at(ParseErrorKind::UnexpectedElse, &token)),
        }
        // the branch before it was taken
        self.skip_branch()
    }

    fn parse_endif(&mut self) -> Result<(), Halt> {
        let token = self.expect(&TokenKind::KeywordEndif)?;
        if self.conditionals.pop().is_none() {
            return Err(Halt::at(ParseErrorKind::UnexpectedEndif, &token));
        }
        Ok(())
    }

    /// Discard the tokens of a branch not taken, nested conditionals
    /// included; stops after its `else` or `endif`, or before `Eof`.
    fn skip_branch(&mut self) -> Result<(), Halt> {
        let mut depth = 0usize;
        loop {
            let token = self.next()?;
            match &token.kind {
                TokenKind::Eof => {
                    self.tokens.back()?;
                    return Ok(());
                }
                kind if kind.opens_conditional() => depth += 1,
                TokenKind::KeywordEndif if depth > 0 => depth -= 1,
                TokenKind::KeywordEndif => {
                    self.conditionals.pop();
                    return Ok(());
                }
                TokenKind::KeywordElse if depth == 0 => {
                    return match self.conditionals.last_mut() {
                        Some(open) if !open.else_seen => {
                            open.else_seen = true;
                            Ok(())
                        }
                        Some(_) => Err(Halt::at(ParseErrorKind::DuplicateElse, &token)),
                        None => Err(Halt::at(ParseErrorKind::UnexpectedElse, &token)),
                    };
                }
                _ => {}
            }
        }
    }

    /// An `ifeq` operand; undefined variables compare as empty.
    fn operand(&mut self) -> Result<String, Halt> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Variable => Ok(self.env.var(&token.text).unwrap_or_default().to_string()),
            TokenKind::QuotedString => Ok(unquote(&token.text).to_string()),
            TokenKind::AtVariable => Ok(format!("@({})", token.text)),
            TokenKind::Identifier => Ok(token.text),
            _ => Err(Halt::at(
                ParseErrorKind::ExpectedToken {
                    expected: TokenKind::Identifier,
                    found: token.to_string(),
                },
                &token,
            )),
        }
    }

    fn defined(&mut self) -> Result<bool, Halt> {
        let name = self.expect(&TokenKind::Identifier)?;
        Ok(self.env.is_defined(&name.text))
    }

    /// End of input: every conditional must be closed.
    fn close(&self) -> Result<(), Halt> {
        self.conditionals.last().map_or(Ok(()), |open| {
            Err(Halt::at(
                ParseErrorKind::UnterminatedConditional {
                    keyword: open.keyword.kind.clone(),
                },
                &open.keyword,
            ))
        })
    }
}

fn reject_error(token: Token) -> Result<Token, Halt> {
    match token.kind {
        TokenKind::Error(kind) => Err(LexError {
            kind,
            span: token.span,
        }
        .into()),
        _ => Ok(token),
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(input: &str, env: ParserEnv) -> Result<Vec<Node>, Error> {
        parse("test", input, env).collect()
    }

    fn rules(input: &str, env: ParserEnv) -> Vec<RuleNode> {
        nodes(input, env)
            .expect("should parse")
            .into_iter()
            .filter_map(|n| match n {
                Node::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect()
    }

    fn parse_error(input: &str) -> ParseErrorKind {
        match nodes(input, ParserEnv::new()) {
            Err(Error::Parse(err)) => err.kind,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn foreach_is_consumed() {
        let got = rules(": foreach src/*.js |> uglify %f |> %B.min.js", ParserEnv::new());
        assert!(got[0].foreach);
        assert_eq!(got[0].inputs, ["src/*.js"]);
        assert_eq!(got[0].command, "uglify %f");
        assert_eq!(got[0].output, "%B.min.js");
    }

    #[test]
    fn bare_identifier_is_rewound() {
        let kind = parse_error("FOO\n");
        assert_eq!(
            kind,
            ParseErrorKind::UnexpectedToken {
                found: "(identifier, 'FOO')".to_string()
            }
        );
    }

    #[test]
    fn macro_reference_needs_closing_pipe() {
        let env = ParserEnv::new().with_macro("m", RuleNode::default());
        let got = nodes(": a |> !m \"x\" |> b", env);
        assert!(matches!(
            got,
            Err(Error::Parse(ParseError {
                kind: ParseErrorKind::ExpectedToken {
                    expected: TokenKind::Pipe,
                    ..
                },
                ..
            }))
        ));
    }

    #[test]
    fn inactive_branch_is_not_resolved() {
        let got = rules(
            "ifdef NOPE\n: a |> $(undefined) |> b\nendif\n: c |> cat |> d",
            ParserEnv::new(),
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].inputs, ["c"]);
    }

    #[test]
    fn else_after_taken_branch_is_skipped() {
        let env = ParserEnv::new().with_var("X", "yes");
        let got = rules(
            "ifeq ($(X), yes)\n: a |> one |> b\nelse\n: a |> two |> b\nendif",
            env,
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].command, "one");
    }

    #[test]
    fn nested_conditionals_in_skipped_branch() {
        let got = rules(
            "ifdef NOPE\nifdef ALSO\n: a |> x |> b\nelse\n: a |> y |> b\nendif\nelse\n: a |> z |> b\nendif",
            ParserEnv::new(),
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].command, "z");
    }

    #[test]
    fn second_else_is_rejected() {
        assert_eq!(
            parse_error("ifdef NOPE\nelse\nelse\nendif"),
            ParseErrorKind::DuplicateElse
        );
        assert_eq!(
            parse_error("ifndef NOPE\nelse\nelse\nendif"),
            ParseErrorKind::DuplicateElse
        );
    }

    #[test]
    fn stray_else_and_endif() {
        assert_eq!(parse_error("else\n"), ParseErrorKind::UnexpectedElse);
        assert_eq!(parse_error("endif\n"), ParseErrorKind::UnexpectedEndif);
    }

    #[test]
    fn unterminated_conditional() {
        assert_eq!(
            parse_error("ifdef NOPE\n: a |> b |> c\n"),
            ParseErrorKind::UnterminatedConditional {
                keyword: TokenKind::KeywordIfdef
            }
        );
        assert_eq!(
            parse_error("ifndef NOPE\n"),
            ParseErrorKind::UnterminatedConditional {
                keyword: TokenKind::KeywordIfndef
            }
        );
    }

    #[test]
    fn finish_returns_definitions() {
        let env = parse("test", "A = 1\nA += 2\n!m = |> cat |>\n", ParserEnv::new())
            .finish()
            .expect("should parse");
        assert_eq!(env.var("A"), Some("1 2"));
        assert_eq!(
            env.macro_rule("m").map(|m| m.command.as_str()),
            Some("cat")
        );
    }

    #[test]
    fn dropping_handle_stops_parser() {
        let input = ": a |> b |> c\n".repeat(200);
        let options = Options::new("test")
            .with_node_capacity(0)
            .with_token_capacity(1);
        let mut parse = parse_with(options, &input, ParserEnv::new());
        assert!(matches!(parse.next(), Some(Ok(Node::Rule(_)))));
        drop(parse);
    }

    #[test]
    fn error_is_last_item() {
        let input = ": a |> b |> c\n: d |> |> e\n: f |> g |> h";
        let items: Vec<_> = parse("test", input, ParserEnv::new()).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(Error::Parse(ParseError {
                kind: ParseErrorKind::EmptyCommand,
                ..
            }))
        ));
    }

    #[test]
    fn lex_error_becomes_lex_variant() {
        let got = nodes("!foo = \"abc", ParserEnv::new());
        assert!(matches!(got, Err(Error::Lex(_))));
    }
}
