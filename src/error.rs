use crate::lexer::{LexError, LexErrorKind};
use crate::parser::ParseError;

/// A broken invariant inside the scanner or parser.
///
/// These never describe malformed input: they mean a matcher or a parse
/// rule misused the cursor or the lookahead buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    /// `backup` called twice without an intervening `next`.
    #[error("cursor backed up twice in a row")]
    DoubleBackup,
    /// `backup` called with no rune to undo.
    #[error("cursor backed up with no rune read")]
    BackupWithoutRead,
    /// A fresh token would overwrite the slot under the lock mark.
    #[error("lookahead buffer is full, a parse rule needs more lookahead than provisioned")]
    LookaheadExhausted,
    /// `back` tried to move before the lock mark or the oldest slot.
    #[error("lookahead cannot back up any further")]
    BackPastLock,
    /// `restore` with no mark set by `keep`.
    #[error("lookahead restore without a checkpoint")]
    NoCheckpoint,
    /// The scanner or parser thread died without reporting.
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Unified error type covering scanning, parsing and internal faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A lexer error.
    #[error("{0}")]
    Lex(LexError),
    /// A parser error.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// A defect in the parsing rules.
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

impl From<LexError> for Error {
    /// A scanner fault arrives as a lexer error token but is reported as
    /// internal.
    fn from(err: LexError) -> Self {
        match err.kind {
            LexErrorKind::Internal(internal) => Self::Internal(internal),
            _ => Self::Lex(err),
        }
    }
}

impl Error {
    /// Whether this is a defect rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
