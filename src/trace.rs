//! Human-readable traces on standard error.
//!
//! Every token the parser consumes and every internal error is written
//! out. Tracing is on under `cfg(test)`, so a failing test shows how far
//! the parser got. Outside of tests it is enabled with the
//! `parser-trace-stderr` feature.
//!
//! _These traces are not meant to be machine-readable!_
//! The format may change without notice.

use crate::error::InternalError;
use crate::token::Token;

#[cfg(any(test, feature = "parser-trace-stderr"))]
pub fn token(name: &str, token: &Token) {
    eprintln!(
        "[vakefile {name}] {}:{} {} {token}",
        token.span.line, token.span.column, token.kind
    );
}

#[cfg(not(any(test, feature = "parser-trace-stderr")))]
pub const fn token(_name: &str, _token: &Token) {}

#[cfg(any(test, feature = "parser-trace-stderr"))]
pub fn internal(name: &str, err: &InternalError) {
    eprintln!("[vakefile {name}] internal error: {err}");
}

#[cfg(not(any(test, feature = "parser-trace-stderr")))]
pub const fn internal(_name: &str, _err: &InternalError) {}
