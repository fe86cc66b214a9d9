//! Dispatcher - hands finished command buffers to the hardware queue
//!
//! The dispatcher owns the queue exclusively; nothing else writes its
//! registers. Three submission contracts are offered:
//!
//! - `submit_sync`: kick, then poll until the span is consumed or the timeout
//!   elapses. A timeout is reported, never retried, and leaves the registers
//!   untouched.
//! - `submit_async`: kick and return a `Ticket` immediately.
//! - `submit_probe`: like `submit_async` but never looks at prior work and is
//!   never refused, so a health check can run on a wedged queue.
//!
//! Work submitted earlier and not yet observed complete is handled by the
//! configured `CompletionPolicy`.

use crate::command::{BufferState, CommandBuffer};
use crate::config::{CompletionPolicy, DispatchConfig, Timeout};
use crate::error::{Error, Result};
use crate::hardware::{DiagnosticRegisters, HardwareQueue, QueueStatus, Span};
use crate::submit::ticket::{SubmitMode, SyncOutcome, Ticket};
use crate::{dpl_debug, dpl_trace, dpl_warn};
use std::collections::VecDeque;

/// Kicked submissions tracked before the oldest is assumed consumed
const MAX_TRACKED: usize = 64;

/// Submission counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub sync_submissions: u64,
    pub async_submissions: u64,
    pub probe_submissions: u64,
    /// Submissions of empty buffers, completed without a kick
    pub empty_submissions: u64,
    pub timeouts: u64,
    /// Prior submissions that exceeded the `WaitForCompletion` budget
    pub stalls: u64,
}

/// Single owner of the hardware queue
pub struct Dispatcher<Q: HardwareQueue> {
    queue: Q,
    config: DispatchConfig,
    next_sequence: u64,
    /// Most recent kicked submission
    latest: Option<Ticket>,
    /// Kicked submissions not yet observed complete, oldest first
    in_flight: VecDeque<Ticket>,
    stats: DispatchStats,
}

impl<Q: HardwareQueue> Dispatcher<Q> {
    /// Take ownership of `queue`
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` if `config` fails validation.
    pub fn new(queue: Q, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        dpl_debug!(
            "dpl::Dispatcher",
            "Dispatcher created (policy={:?}, sync timeout={:?})",
            config.completion_policy,
            config.default_sync_timeout
        );
        Ok(Self {
            queue,
            config,
            next_sequence: 1,
            latest: None,
            in_flight: VecDeque::new(),
            stats: DispatchStats::default(),
        })
    }

    // ===== SUBMISSION =====

    /// Submit and block until the span is consumed or `timeout` elapses
    ///
    /// # Errors
    ///
    /// `Error::PriorSubmissionStalled` under `WaitForCompletion` when earlier
    /// work does not finish in time. In that case nothing is kicked.
    ///
    /// # Panics
    ///
    /// If `buffer` is still submitted.
    pub fn submit_sync(&mut self, buffer: &mut CommandBuffer, timeout: Timeout) -> Result<SyncOutcome> {
        self.settle_prior_work()?;
        self.stats.sync_submissions += 1;

        let ticket = self.kick(buffer, SubmitMode::Sync);
        if !ticket.was_kicked() {
            buffer.mark_completed();
            return Ok(SyncOutcome::Completed { ticket, elapsed_ticks: 0 });
        }

        match self.wait_for(&ticket, ticket.submitted_at, timeout.ticks()) {
            Ok(elapsed_ticks) => {
                buffer.mark_completed();
                dpl_trace!(
                    "dpl::Dispatcher",
                    "Sync #{} completed in {} ticks",
                    ticket.sequence,
                    elapsed_ticks
                );
                Ok(SyncOutcome::Completed { ticket, elapsed_ticks })
            }
            Err(elapsed_ticks) => {
                buffer.mark_timed_out();
                self.stats.timeouts += 1;
                let registers = self.queue.snapshot();
                dpl_warn!(
                    "dpl::Dispatcher",
                    "Sync #{} timed out after {} ticks ({})",
                    ticket.sequence,
                    elapsed_ticks,
                    registers
                );
                Ok(SyncOutcome::TimedOut { ticket, registers, elapsed_ticks })
            }
        }
    }

    /// `submit_sync` with the configured default timeout
    pub fn submit_sync_default(&mut self, buffer: &mut CommandBuffer) -> Result<SyncOutcome> {
        let timeout = self.config.default_sync_timeout;
        self.submit_sync(buffer, timeout)
    }

    /// Submit and return immediately
    ///
    /// The buffer stays `Submitted` until retired through [`Dispatcher::retire`]
    /// or observed complete through [`Dispatcher::poll`].
    ///
    /// # Errors
    ///
    /// `Error::PriorSubmissionStalled`, as for `submit_sync`.
    pub fn submit_async(&mut self, buffer: &mut CommandBuffer) -> Result<Ticket> {
        self.settle_prior_work()?;
        self.stats.async_submissions += 1;
        let ticket = self.kick(buffer, SubmitMode::Async);
        if !ticket.was_kicked() {
            buffer.mark_completed();
        }
        Ok(ticket)
    }

    /// Submit without regard for prior work
    ///
    /// Used by the health monitor. The caller is responsible for only probing
    /// once per test cycle.
    pub fn submit_probe(&mut self, buffer: &mut CommandBuffer) -> Ticket {
        self.stats.probe_submissions += 1;
        let ticket = self.kick(buffer, SubmitMode::Probe);
        if !ticket.was_kicked() {
            buffer.mark_completed();
        }
        ticket
    }

    // ===== COMPLETION =====

    /// Whether the hardware has consumed `ticket`'s span
    ///
    /// The latest submission is complete once the fetch pointer reached its end
    /// and the pipeline went idle. An earlier one is complete once the latest
    /// is, or once the fetch pointer has moved into any span kicked after it.
    pub fn is_complete(&mut self, ticket: &Ticket) -> bool {
        if !ticket.was_kicked() {
            return true;
        }
        let Some(position) = self.in_flight.iter().position(|t| t.sequence == ticket.sequence) else {
            return true;
        };

        let current = self.queue.current();
        if let Some(latest) = self.in_flight.back() {
            if current == latest.span.end && !self.queue.status().contains(QueueStatus::PIPE_BUSY) {
                self.in_flight.clear();
                return true;
            }
        }

        // Spans run in kick order: fetching a later one means this one drained
        let later = self
            .in_flight
            .iter()
            .skip(position + 1)
            .rposition(|t| t.span.contains(current));
        match later {
            Some(offset) => {
                self.in_flight.drain(..position + 1 + offset);
                true
            }
            None => false,
        }
    }

    /// Move a submitted buffer to `Completed` if the hardware is done with it
    pub fn poll(&mut self, buffer: &mut CommandBuffer) -> BufferState {
        if buffer.state() == BufferState::Submitted {
            let done = match buffer.ticket() {
                Some(ticket) => {
                    let ticket = *ticket;
                    self.is_complete(&ticket)
                }
                None => true,
            };
            if done {
                buffer.mark_completed();
            }
        }
        buffer.state()
    }

    /// Make a submitted buffer reusable by applying the completion policy
    ///
    /// Under `AssumePriorComplete` the buffer is marked completed without
    /// reading any register. Under `WaitForCompletion` its span is polled.
    /// Buffers in any other state are returned as they are.
    ///
    /// # Errors
    ///
    /// `Error::PriorSubmissionStalled` if the wait budget runs out; the buffer
    /// then stays submitted.
    pub fn retire(&mut self, buffer: &mut CommandBuffer) -> Result<BufferState> {
        if buffer.state() != BufferState::Submitted {
            return Ok(buffer.state());
        }
        let Some(ticket) = buffer.ticket().copied() else {
            buffer.mark_completed();
            return Ok(buffer.state());
        };

        match self.config.completion_policy {
            CompletionPolicy::AssumePriorComplete => {
                dpl_trace!(
                    "dpl::Dispatcher",
                    "Retiring #{} without polling",
                    ticket.sequence
                );
                self.forget_through(ticket.sequence);
                buffer.mark_completed();
            }
            CompletionPolicy::WaitForCompletion { timeout_ticks } => {
                let started = self.queue.ticks();
                if let Err(waited_ticks) = self.wait_for(&ticket, started, Some(timeout_ticks)) {
                    return Err(self.stalled(ticket.sequence, waited_ticks));
                }
                buffer.mark_completed();
            }
        }
        Ok(buffer.state())
    }

    // ===== DIAGNOSTICS / PASSTHROUGH =====

    /// Raw register snapshot
    pub fn diagnostics(&mut self) -> DiagnosticRegisters {
        self.queue.snapshot()
    }

    pub fn wait_us(&mut self, us: u64) {
        self.queue.wait_us(us);
    }

    pub fn wait_ticks(&mut self, ticks: u64) {
        self.queue.wait_ticks(ticks);
    }

    pub fn ticks(&mut self) -> u64 {
        self.queue.ticks()
    }

    /// Most recent kicked submission
    pub fn latest(&self) -> Option<&Ticket> {
        self.latest.as_ref()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Direct queue access for callers that poll raw registers
    ///
    /// Kicking through this handle bypasses the dispatcher's bookkeeping.
    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    /// Give the queue back
    pub fn into_inner(self) -> Q {
        self.queue
    }

    // ===== INTERNALS =====

    fn kick(&mut self, buffer: &mut CommandBuffer, mode: SubmitMode) -> Ticket {
        assert!(
            buffer.state() != BufferState::Submitted,
            "submitting a buffer that is still in flight: retire it first"
        );

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if buffer.is_empty() {
            self.stats.empty_submissions += 1;
            let ticket = Ticket {
                mode,
                span: Span::default(),
                word_count: 0,
                submitted_at: self.queue.ticks(),
                sequence,
            };
            buffer.mark_submitted(ticket);
            return ticket;
        }

        let span = self.queue.kick(buffer.words());
        let ticket = Ticket {
            mode,
            span,
            word_count: buffer.len(),
            submitted_at: self.queue.ticks(),
            sequence,
        };
        dpl_trace!(
            "dpl::Dispatcher",
            "Kick #{} {:?}: {:08X}..{:08X} ({} words)",
            sequence,
            mode,
            span.start,
            span.end,
            ticket.word_count
        );

        if self.in_flight.len() >= MAX_TRACKED {
            self.in_flight.pop_front();
        }
        self.in_flight.push_back(ticket);
        self.latest = Some(ticket);
        buffer.mark_submitted(ticket);
        ticket
    }

    /// Apply the completion policy to the latest submission before new work
    fn settle_prior_work(&mut self) -> Result<()> {
        let Some(latest) = self.in_flight.back().copied() else {
            return Ok(());
        };
        match self.config.completion_policy {
            CompletionPolicy::AssumePriorComplete => Ok(()),
            CompletionPolicy::WaitForCompletion { timeout_ticks } => {
                let started = self.queue.ticks();
                self.wait_for(&latest, started, Some(timeout_ticks))
                    .map(|_| ())
                    .map_err(|waited_ticks| self.stalled(latest.sequence, waited_ticks))
            }
        }
    }

    /// Poll until `ticket` completes. `Ok(elapsed)` on completion, `Err(elapsed)`
    /// once `budget` ticks have passed since `started`.
    fn wait_for(&mut self, ticket: &Ticket, started: u64, budget: Option<u64>) -> std::result::Result<u64, u64> {
        loop {
            let complete = self.is_complete(ticket);
            let elapsed = self.queue.ticks().wrapping_sub(started);
            if complete {
                return Ok(elapsed);
            }
            if let Some(budget) = budget {
                if elapsed >= budget {
                    return Err(elapsed);
                }
            }
            if self.config.poll_interval_ticks > 0 {
                self.queue.wait_ticks(self.config.poll_interval_ticks);
            }
        }
    }

    /// Stop tracking `sequence` and everything kicked before it
    fn forget_through(&mut self, sequence: u64) {
        while self.in_flight.front().is_some_and(|t| t.sequence <= sequence) {
            self.in_flight.pop_front();
        }
    }

    fn stalled(&mut self, sequence: u64, waited_ticks: u64) -> Error {
        self.stats.stalls += 1;
        dpl_warn!(
            "dpl::Dispatcher",
            "Prior submission #{} still in flight after {} ticks",
            sequence,
            waited_ticks
        );
        Error::PriorSubmissionStalled { sequence, waited_ticks }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
