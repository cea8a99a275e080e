#![allow(dead_code)]

use vakefile_rs::{
    Error, Node, ParseErrorKind, ParserEnv, RuleNode, Token, TokenKind, parse_str, tokenize,
};

pub fn tok(kind: TokenKind, text: &str) -> (TokenKind, String) {
    (kind, text.to_string())
}

/// Tokenize and keep only `(kind, text)` pairs.
pub fn lexed(input: &str) -> Vec<(TokenKind, String)> {
    tokenize(input)
        .unwrap_or_else(|e| panic!("tokenize failed: {e}\n--- input ---\n{input}"))
        .into_iter()
        .map(|t| (t.kind, t.text))
        .collect()
}

/// Token text with the sigils the scanner strips put back.
pub fn significant(token: &Token) -> String {
    match token.kind {
        TokenKind::Variable => format!("$({})", token.text),
        TokenKind::AtVariable => format!("@({})", token.text),
        TokenKind::Macro => format!("!{}", token.text),
        TokenKind::PercentFlag => format!("%{}", token.text),
        TokenKind::Comment => format!("#{}", token.text),
        _ => token.text.clone(),
    }
}

pub fn without_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn rule(inputs: &[&str], command: &str, output: &str) -> RuleNode {
    RuleNode {
        foreach: false,
        inputs: inputs.iter().map(ToString::to_string).collect(),
        command: command.to_string(),
        output: output.to_string(),
    }
}

pub fn nodes(input: &str, env: ParserEnv) -> Vec<Node> {
    parse_str(input, env)
        .unwrap_or_else(|e| panic!("parse failed: {e}\n--- input ---\n{input}"))
        .nodes
}

pub fn rules(input: &str, env: ParserEnv) -> Vec<RuleNode> {
    nodes(input, env)
        .into_iter()
        .filter_map(|n| match n {
            Node::Rule(rule) => Some(rule),
            _ => None,
        })
        .collect()
}

pub fn parse_error(input: &str, env: ParserEnv) -> ParseErrorKind {
    match parse_str(input, env) {
        Err(Error::Parse(err)) => err.kind,
        other => panic!("expected a parse error, got {other:?}"),
    }
}
