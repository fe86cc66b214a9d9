//! Error types for the DPL submission core
//!
//! Only recoverable conditions live here. Precondition violations (writing past a
//! command buffer's capacity, mutating a buffer the hardware may still be reading)
//! are bugs in the caller and panic instead.

use std::fmt;

/// Result type for DPL operations
pub type Result<T> = std::result::Result<T, Error>;

/// DPL errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backing storage for a command buffer could not be allocated
    OutOfMemory {
        /// Requested capacity in command words
        requested_words: usize,
    },

    /// A prior fire-and-forget submission did not finish within the wait budget
    /// of the dispatcher's completion policy
    PriorSubmissionStalled {
        /// Sequence number of the stalled submission
        sequence: u64,
        /// Ticks spent waiting before giving up
        waited_ticks: u64,
    },

    /// Configuration value rejected by validation
    InvalidConfig(String),

    /// Framebuffer dump text that cannot be parsed back into reference images
    MalformedDump {
        /// 1-based line number in the dump text
        line: usize,
        reason: String,
    },

    /// Backend-specific failure (register block, platform hooks)
    Backend(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory { requested_words } => {
                write!(f, "Out of memory: cannot reserve {} command words", requested_words)
            }
            Error::PriorSubmissionStalled { sequence, waited_ticks } => write!(
                f,
                "Prior submission #{} still in flight after {} ticks",
                sequence, waited_ticks
            ),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::MalformedDump { line, reason } => {
                write!(f, "Malformed dump at line {}: {}", line, reason)
            }
            Error::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
