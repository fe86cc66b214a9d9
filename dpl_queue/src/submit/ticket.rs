/// Submission tickets and blocking-submission outcomes

use crate::hardware::{DiagnosticRegisters, Span};

/// Contract a buffer was submitted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitMode {
    /// Blocking, polled to completion or timeout
    Sync,
    /// Fire-and-forget
    Async,
    /// Fire-and-forget that ignores prior work, used for health probes
    Probe,
}

/// Record of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub mode: SubmitMode,
    /// Bus addresses handed to the queue. Empty for buffers that were never kicked.
    pub span: Span,
    pub word_count: usize,
    /// Tick count right after the END write
    pub submitted_at: u64,
    /// Monotonic per-dispatcher submission number, starting at 1
    pub sequence: u64,
}

impl Ticket {
    /// Whether the buffer was actually handed to the hardware
    pub fn was_kicked(&self) -> bool {
        !self.span.is_empty()
    }
}

/// Result of a blocking submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The queue consumed the whole span
    Completed {
        ticket: Ticket,
        /// Ticks between submission and observed completion
        elapsed_ticks: u64,
    },
    /// The timeout elapsed first. Nothing was reset.
    TimedOut {
        ticket: Ticket,
        /// Registers as read when giving up
        registers: DiagnosticRegisters,
        elapsed_ticks: u64,
    },
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }

    pub fn ticket(&self) -> &Ticket {
        match self {
            SyncOutcome::Completed { ticket, .. } | SyncOutcome::TimedOut { ticket, .. } => ticket,
        }
    }

    pub fn elapsed_ticks(&self) -> u64 {
        match self {
            SyncOutcome::Completed { elapsed_ticks, .. }
            | SyncOutcome::TimedOut { elapsed_ticks, .. } => *elapsed_ticks,
        }
    }
}
