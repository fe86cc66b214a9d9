/// DoubleBufferScheduler - two command buffers recorded and submitted in turn

use crate::command::CommandBuffer;
use crate::error::Result;
use crate::hardware::HardwareQueue;
use crate::submit::dispatcher::Dispatcher;
use crate::submit::ticket::Ticket;
use crate::dpl_trace;

/// What one `step` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Buffer (0 or 1) that was built and submitted
    pub buffer_index: usize,
    pub ticket: Ticket,
}

/// Alternates between two command buffers
///
/// While the hardware fetches one buffer the caller records the other. A step
/// never touches the buffer submitted by the previous step; the buffer it
/// reuses is first retired through the dispatcher's completion policy.
pub struct DoubleBufferScheduler {
    buffers: [CommandBuffer; 2],
    next: usize,
    last_submitted: Option<usize>,
    steps: u64,
}

impl DoubleBufferScheduler {
    /// Two empty buffers of `capacity_words` each
    pub fn new(capacity_words: usize) -> Result<Self> {
        Ok(Self {
            buffers: [CommandBuffer::new(capacity_words)?, CommandBuffer::new(capacity_words)?],
            next: 0,
            last_submitted: None,
            steps: 0,
        })
    }

    /// Two buffers pre-populated by `prefill`
    ///
    /// The placeholder words stay in storage after the reset at the start of
    /// each step, so a `build` closure can patch them in place through
    /// [`CommandBuffer::raw_cursor`] instead of appending from scratch.
    pub fn with_prefill<F>(capacity_words: usize, mut prefill: F) -> Result<Self>
    where
        F: FnMut(&mut CommandBuffer),
    {
        let mut scheduler = Self::new(capacity_words)?;
        for buffer in scheduler.buffers.iter_mut() {
            prefill(buffer);
        }
        Ok(scheduler)
    }

    /// Retire, reset, build and submit the buffer not submitted last
    ///
    /// # Arguments
    ///
    /// * `dispatcher` - Dispatcher the buffer is submitted through
    /// * `build` - Records (or patches) the commands for this step
    ///
    /// # Errors
    ///
    /// `Error::PriorSubmissionStalled` under `WaitForCompletion` when a buffer
    /// cannot be retired or earlier work does not finish. The scheduler does
    /// not flip in that case.
    pub fn step<Q, F>(&mut self, dispatcher: &mut Dispatcher<Q>, build: F) -> Result<StepReport>
    where
        Q: HardwareQueue,
        F: FnOnce(&mut CommandBuffer),
    {
        let index = self.next;
        assert!(
            self.last_submitted != Some(index),
            "double buffer would overwrite the buffer submitted last"
        );

        let buffer = &mut self.buffers[index];
        dispatcher.retire(buffer)?;
        buffer.reset();
        build(buffer);
        let ticket = dispatcher.submit_async(buffer)?;

        dpl_trace!(
            "dpl::DoubleBuffer",
            "Step {} submitted buffer {} as #{}",
            self.steps,
            index,
            ticket.sequence
        );

        self.last_submitted = Some(index);
        self.next = index ^ 1;
        self.steps += 1;
        Ok(StepReport { buffer_index: index, ticket })
    }

    /// Retire both buffers, e.g. before dropping the scheduler
    pub fn retire_all<Q: HardwareQueue>(&mut self, dispatcher: &mut Dispatcher<Q>) -> Result<()> {
        for buffer in self.buffers.iter_mut() {
            dispatcher.retire(buffer)?;
        }
        Ok(())
    }

    pub fn buffer(&self, index: usize) -> &CommandBuffer {
        &self.buffers[index]
    }

    /// Index the next step will write into
    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn last_submitted(&self) -> Option<usize> {
        self.last_submitted
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
#[path = "double_buffer_tests.rs"]
mod tests;
