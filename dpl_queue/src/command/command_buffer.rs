//! Fixed-capacity command buffer (display list)
//!
//! A `CommandBuffer` owns a contiguous run of 64-bit command words and a write
//! cursor. Commands are appended in order and submitted as one linear span.
//! The capacity is fixed at construction: appending past it is a bug in the
//! caller and panics, the buffer never grows, truncates or wraps.

use crate::command::opcode::Opcode;
use crate::error::{Error, Result};
use crate::submit::Ticket;

/// Submission state of a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Being recorded, or reset and ready for recording
    Built,
    /// Handed to the hardware and not yet retired
    Submitted,
    /// Observed (or assumed) consumed by the hardware
    Completed,
    /// A blocking submission gave up waiting. Terminal until `reset()`.
    TimedOut,
}

/// Fixed-capacity command buffer
pub struct CommandBuffer {
    storage: Vec<u64>,
    cursor: usize,
    state: BufferState,
    ticket: Option<Ticket>,
}

impl CommandBuffer {
    /// Allocate a buffer able to hold `capacity_words` command words
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` if the backing storage cannot be reserved.
    pub fn new(capacity_words: usize) -> Result<Self> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity_words)
            .map_err(|_| Error::OutOfMemory { requested_words: capacity_words })?;
        storage.resize(capacity_words, 0);

        Ok(Self {
            storage,
            cursor: 0,
            state: BufferState::Built,
            ticket: None,
        })
    }

    /// Append one command and return `self` for chaining
    ///
    /// # Panics
    ///
    /// If the command does not fit in the remaining capacity, or if the buffer
    /// is currently submitted.
    pub fn append<O: Opcode>(&mut self, opcode: O) -> &mut Self {
        self.assert_writable("append");
        let count = opcode.word_count();
        let end = self.cursor + count;
        assert!(
            end <= self.storage.len(),
            "command buffer overflow: {} words at offset {} exceeds capacity {}",
            count,
            self.cursor,
            self.storage.len()
        );
        opcode.encode(&mut self.storage[self.cursor..end]);
        self.cursor = end;
        self
    }

    /// Append one already encoded word
    pub fn append_word(&mut self, word: u64) -> &mut Self {
        self.append(word)
    }

    /// Direct access to the buffer's words for in-place patching
    ///
    /// # Safety
    ///
    /// The returned cursor must only be used while no hardware fetch window
    /// covers this buffer. The buffer state check catches the common misuse
    /// (patching a submitted buffer), but a buffer whose span was handed to
    /// the hardware through some other path is not tracked.
    ///
    /// # Panics
    ///
    /// If the buffer is currently submitted.
    pub unsafe fn raw_cursor(&mut self) -> RawCursor<'_> {
        self.assert_writable("raw_cursor");
        RawCursor {
            storage: &mut self.storage,
            cursor: &mut self.cursor,
        }
    }

    /// Rewind the cursor to zero, keeping the storage
    ///
    /// # Panics
    ///
    /// If the buffer is currently submitted.
    pub fn reset(&mut self) {
        self.assert_writable("reset");
        self.cursor = 0;
        self.state = BufferState::Built;
    }

    /// Number of committed words
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Total capacity in words
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Words still available for appending
    pub fn remaining(&self) -> usize {
        self.storage.len() - self.cursor
    }

    /// Committed words, in append order
    pub fn words(&self) -> &[u64] {
        &self.storage[..self.cursor]
    }

    /// Committed words as raw bytes, for cache writeback or DMA
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.words())
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Ticket of the most recent submission, if any
    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    // ===== DISPATCHER HOOKS =====

    pub(crate) fn mark_submitted(&mut self, ticket: Ticket) {
        self.state = BufferState::Submitted;
        self.ticket = Some(ticket);
    }

    pub(crate) fn mark_completed(&mut self) {
        self.state = BufferState::Completed;
    }

    pub(crate) fn mark_timed_out(&mut self) {
        self.state = BufferState::TimedOut;
    }

    fn assert_writable(&self, operation: &str) {
        assert!(
            self.state != BufferState::Submitted,
            "CommandBuffer::{} on a submitted buffer: retire it through the dispatcher first",
            operation
        );
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("len", &self.cursor)
            .field("capacity", &self.storage.len())
            .field("state", &self.state)
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if self.state == BufferState::Submitted {
            crate::dpl_warn!(
                "dpl::CommandBuffer",
                "Dropping command buffer while submitted ({} words, ticket {:?})",
                self.cursor,
                self.ticket.as_ref().map(|t| t.sequence)
            );
        }
    }
}

/// Bounded view over a command buffer's storage, see [`CommandBuffer::raw_cursor`]
pub struct RawCursor<'a> {
    storage: &'a mut [u64],
    cursor: &'a mut usize,
}

impl<'a> RawCursor<'a> {
    /// Current write position in words
    pub fn position(&self) -> usize {
        *self.cursor
    }

    /// Reserved but not yet committed words
    pub fn unwritten(&mut self) -> &mut [u64] {
        &mut self.storage[*self.cursor..]
    }

    /// Already committed words, for patching
    pub fn written(&mut self) -> &mut [u64] {
        &mut self.storage[..*self.cursor]
    }

    /// Commit `count` words written through `unwritten()`
    ///
    /// # Panics
    ///
    /// If that would move the cursor past the capacity.
    pub fn advance(&mut self, count: usize) {
        let end = *self.cursor + count;
        assert!(
            end <= self.storage.len(),
            "raw cursor advance of {} words at offset {} exceeds capacity {}",
            count,
            *self.cursor,
            self.storage.len()
        );
        *self.cursor = end;
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
