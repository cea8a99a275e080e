//! Parser-side ring buffer giving bounded lookahead and a checkpoint.
//!
//! Positions are logical: `read` counts tokens handed to the parser,
//! `written` counts tokens pulled from the source. Token `i` lives in slot
//! `i % N` until token `i + N` is pulled.

use crate::error::InternalError;
use crate::token::{Span, Token, TokenKind};

/// Lookahead depth the parse rules are written against.
pub const LOOKAHEAD: usize = 3;

#[derive(Debug)]
pub struct Lookahead<I, const N: usize = LOOKAHEAD> {
    source: I,
    ring: [Option<Token>; N],
    written: usize,
    read: usize,
    lock: Option<usize>,
    at_end: bool,
}

impl<I, const N: usize> Lookahead<I, N>
where
    I: Iterator<Item = Token>,
{
    pub fn new(source: I) -> Self {
        const { assert!(N >= 1, "lookahead needs at least one slot") };
        Self {
            source,
            ring: std::array::from_fn(|_| None),
            written: 0,
            read: 0,
            lock: None,
            at_end: false,
        }
    }

    /// Number of tokens handed out so far, minus those backed over.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.read
    }

    #[must_use]
    pub const fn lock_mark(&self) -> Option<usize> {
        self.lock
    }

    /// Return the next token, pulling from the source when every buffered
    /// token has been read.
    ///
    /// # Errors
    ///
    /// [`InternalError::LookaheadExhausted`] when the pull would recycle
    /// the slot holding the token under the lock mark.
    pub fn next(&mut self) -> Result<Token, InternalError> {
        if self.read == self.written {
            if let Some(lock) = self.lock {
                if self.written >= N && self.written - N >= lock {
                    return Err(InternalError::LookaheadExhausted);
                }
            }
            let token = self.pull();
            self.ring[self.written % N] = Some(token);
            self.written += 1;
        }
        let slot = self.read % N;
        self.read += 1;
        self.ring[slot]
            .clone()
            .ok_or(InternalError::LookaheadExhausted)
    }

    /// Step the read cursor one token back.
    ///
    /// # Errors
    ///
    /// [`InternalError::BackPastLock`] at the lock mark, before the first
    /// token, or past the oldest slot still held.
    pub const fn back(&mut self) -> Result<(), InternalError> {
        let floor = match self.lock {
            Some(lock) => lock,
            None => self.written.saturating_sub(N),
        };
        if self.read == 0 || self.read <= floor {
            return Err(InternalError::BackPastLock);
        }
        self.read -= 1;
        Ok(())
    }

    /// The next token without consuming it.
    pub fn peek(&mut self) -> Result<Token, InternalError> {
        let token = self.next()?;
        self.back()?;
        Ok(token)
    }

    /// Mark the current position as the checkpoint for [`restore`](Self::restore).
    pub const fn keep(&mut self) {
        self.lock = Some(self.read);
    }

    /// Rewind to the checkpoint and release it.
    ///
    /// # Errors
    ///
    /// [`InternalError::NoCheckpoint`] if `keep` was not called.
    pub const fn restore(&mut self) -> Result<(), InternalError> {
        match self.lock.take() {
            Some(mark) => {
                self.read = mark;
                Ok(())
            }
            None => Err(InternalError::NoCheckpoint),
        }
    }

    /// Drop the checkpoint without rewinding.
    pub const fn release(&mut self) {
        self.lock = None;
    }

    /// Give back the underlying source.
    pub fn into_inner(self) -> I {
        self.source
    }

    fn pull(&mut self) -> Token {
        if !self.at_end {
            if let Some(token) = self.source.next() {
                self.at_end = token.is_eof() || token.is_error();
                return token;
            }
            self.at_end = true;
        }
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            start: 0,
            span: Span::default(),
        }
    }
}
