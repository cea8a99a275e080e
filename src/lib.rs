//! Scanner and parser for Vakefiles, a tup-style build description
//! language.
//!
//! The scanner runs on its own thread and streams tokens to the parser,
//! which runs on another and streams syntax nodes to the caller. Macro
//! and variable references are resolved while rules are built, against a
//! [`ParserEnv`] that the caller carries from one parse to the next.
//!
//! # Quick start
//!
//! ## Parse a Vakefile
//!
//! ```
//! use vakefile_rs::{Node, ParserEnv, parse_str};
//!
//! let input = "\
//! !css = |> csso %f -o %o |> dist/
//! : foreach src/*.css |> !css |> %B.min.css
//! ";
//! let vakefile = parse_str(input, ParserEnv::new()).unwrap();
//! let Node::Rule(rule) = &vakefile.nodes[1] else { panic!() };
//! assert!(rule.foreach);
//! assert_eq!(rule.command, "csso %f -o %o");
//! assert_eq!(rule.output, "dist/ %B.min.css");
//! ```
//!
//! ## Stream nodes as they are parsed
//!
//! ```
//! use vakefile_rs::{Node, ParserEnv, parse};
//!
//! let env = ParserEnv::new().with_var("JS", "src/*.js");
//! let mut nodes = parse("Vakefile", "GZ = gzip -9\n: $(JS) |> cat %f |> app.js", env);
//! assert!(matches!(nodes.next(), Some(Ok(Node::Variable(_)))));
//! assert!(matches!(nodes.next(), Some(Ok(Node::Rule(_)))));
//!
//! let env = nodes.finish().unwrap();
//! assert_eq!(env.var("GZ"), Some("gzip -9"));
//! ```
//!
//! ## Tokenize
//!
//! ```
//! use vakefile_rs::{TokenKind, tokenize};
//!
//! let tokens = tokenize("!foo = |> cat %f |>").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Macro);
//! assert_eq!(tokens[0].text, "foo");
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod ast;
pub mod cursor;
pub mod env;
pub mod error;
pub mod lexer;
pub mod lookahead;
pub mod parser;
pub mod stream;
pub mod text;
pub mod token;
mod trace;

pub use ast::{IncludeNode, LabelNode, MacroNode, Node, RuleNode, VariableNode};
pub use env::ParserEnv;
pub use error::{Error, InternalError};
pub use lexer::{LexError, LexErrorKind, lex, tokenize};
pub use lookahead::{LOOKAHEAD, Lookahead};
pub use parser::{Options, Parse, ParseError, ParseErrorKind, parse, parse_with};
pub use stream::TokenStream;
pub use token::{Span, Token, TokenKind};

/// A fully parsed input and the environment it left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vakefile {
    pub nodes: Vec<Node>,
    pub env: ParserEnv,
}

/// Parse a whole source string and collect the result.
pub fn parse_str(input: &str, env: ParserEnv) -> Result<Vakefile, Error> {
    let mut parse = parse("", input, env);
    let nodes = parse.by_ref().collect::<Result<Vec<_>, _>>()?;
    let env = parse.finish()?;
    Ok(Vakefile { nodes, env })
}
