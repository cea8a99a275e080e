//! Hand-off of tokens from the scanner thread to its single consumer.

use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::JoinHandle;

use crate::error::InternalError;
use crate::lexer::LexErrorKind;
use crate::token::{Span, Token, TokenKind};

/// Default bound of the token channel.
pub const DEFAULT_TOKEN_CAPACITY: usize = 16;

/// The consumer went away; the scanner should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

/// Where the scanner delivers finished tokens.
pub trait TokenSink {
    /// # Errors
    ///
    /// [`Closed`] once nobody is listening any more.
    fn push(&mut self, token: Token) -> Result<(), Closed>;
}

impl TokenSink for Vec<Token> {
    fn push(&mut self, token: Token) -> Result<(), Closed> {
        Vec::push(self, token);
        Ok(())
    }
}

impl TokenSink for SyncSender<Token> {
    fn push(&mut self, token: Token) -> Result<(), Closed> {
        self.send(token).map_err(|_| Closed)
    }
}

/// Receiving end of a running scan.
///
/// Yields tokens in source order, ending with exactly one `Eof` or
/// `Error` token. If the scanner thread dies before sending either, a
/// synthetic internal error token is yielded instead.
#[derive(Debug)]
pub struct TokenStream {
    rx: Receiver<Token>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl TokenStream {
    pub(crate) const fn new(rx: Receiver<Token>, handle: JoinHandle<()>) -> Self {
        Self {
            rx,
            handle: Some(handle),
            finished: false,
        }
    }

    /// Block until the next token is available.
    pub fn next_token(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        if let Ok(token) = self.rx.recv() {
            if token.is_eof() || token.is_error() {
                self.finished = true;
            }
            return Some(token);
        }
        self.finished = true;
        let panicked = self.join();
        panicked.then(|| {
            let kind = LexErrorKind::Internal(InternalError::WorkerPanicked);
            Token {
                text: kind.to_string(),
                kind: TokenKind::Error(kind),
                start: 0,
                span: Span::default(),
            }
        })
    }

    /// Consume whatever the scanner still has to say and wait for it to
    /// exit.
    pub fn drain(&mut self) -> Vec<Token> {
        let mut rest = Vec::new();
        while let Ok(token) = self.rx.recv() {
            rest.push(token);
        }
        self.finished = true;
        self.join();
        rest
    }

    /// Returns whether the scanner thread panicked.
    fn join(&mut self) -> bool {
        self.handle
            .take()
            .is_some_and(|handle| handle.join().is_err())
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        // Dropping the receiver first unblocks a scanner stuck on a full
        // channel; its next send fails and it exits.
        let (_, rx) = std::sync::mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.rx, rx));
        self.join();
    }
}
