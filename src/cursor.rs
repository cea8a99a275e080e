//! Rune cursor over UTF-8 source with a single step of look-back.

use crate::error::InternalError;

/// Saved `(position, line)` pair, see [`Cursor::read_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadState {
    pos: usize,
    line: usize,
}

/// What the last `next` consumed, so `backup` can undo it.
#[derive(Debug, Clone, Copy)]
struct LastRead {
    width: usize,
    newline: bool,
}

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    last: Option<LastRead>,
    backed_up: bool,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            last: None,
            backed_up: false,
        }
    }

    #[must_use]
    pub const fn input(&self) -> &'a str {
        self.input
    }

    /// Byte offset of the next rune.
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// 1 + number of newlines consumed.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub const fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Consume and return the next rune; `None` at end of input.
    ///
    /// Reading at the end still counts as a read of zero width, so it can
    /// be backed up like any other.
    pub fn next(&mut self) -> Option<char> {
        self.backed_up = false;
        let Some(r) = self.input[self.pos..].chars().next() else {
            self.last = Some(LastRead {
                width: 0,
                newline: false,
            });
            return None;
        };
        let newline = r == '\n';
        self.last = Some(LastRead {
            width: r.len_utf8(),
            newline,
        });
        self.pos += r.len_utf8();
        if newline {
            self.line += 1;
        }
        Some(r)
    }

    /// Undo the most recent [`next`](Self::next).
    ///
    /// # Errors
    ///
    /// [`InternalError::DoubleBackup`] if the previous call was already a
    /// backup, [`InternalError::BackupWithoutRead`] if nothing was read
    /// since the cursor was created or restored.
    pub const fn backup(&mut self) -> Result<(), InternalError> {
        if self.backed_up {
            return Err(InternalError::DoubleBackup);
        }
        let Some(last) = self.last else {
            return Err(InternalError::BackupWithoutRead);
        };
        self.pos -= last.width;
        if last.newline {
            self.line -= 1;
        }
        self.backed_up = true;
        Ok(())
    }

    /// Return the next rune without consuming it.
    pub fn peek(&mut self) -> Result<Option<char>, InternalError> {
        let r = self.next();
        self.backup()?;
        Ok(r)
    }

    #[must_use]
    pub const fn read_state(&self) -> ReadState {
        ReadState {
            pos: self.pos,
            line: self.line,
        }
    }

    /// Rewind to a saved state. Only `next` may follow.
    pub const fn set_read_state(&mut self, state: ReadState) {
        self.pos = state.pos;
        self.line = state.line;
        self.last = None;
        self.backed_up = false;
    }

    /// 1-based column of a byte offset, counted in runes.
    #[must_use]
    pub fn column_at(&self, offset: usize) -> usize {
        let before = &self.input[..offset];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        before[line_start..].chars().count() + 1
    }

    /// Line of a byte offset already consumed.
    #[must_use]
    pub fn line_at(&self, offset: usize) -> usize {
        if offset >= self.pos {
            return self.line;
        }
        let crossed = self.input[offset..self.pos].matches('\n').count();
        self.line - crossed
    }
}
