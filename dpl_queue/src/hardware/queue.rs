/// HardwareQueue trait - register-level access to the single command queue

use bitflags::bitflags;
use std::fmt;

/// Tick rate of the N64 CPU count register (half the 93.75 MHz CPU clock)
pub const N64_TICKS_PER_SECOND: u64 = 46_875_000;

bitflags! {
    /// Queue status register flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueueStatus: u32 {
        /// Commands are fetched from the RSP data memory instead of RAM
        const XBUS_DMEM_DMA = 0x001;
        const FREEZE = 0x002;
        const FLUSH = 0x004;
        const START_GCLK = 0x008;
        const TMEM_BUSY = 0x010;
        /// The rendering pipeline still has work in flight
        const PIPE_BUSY = 0x020;
        const CMD_BUSY = 0x040;
        /// Command buffer ready
        const CBUF_READY = 0x080;
        const DMA_BUSY = 0x100;
        /// An END write is pending
        const END_VALID = 0x200;
        /// A START write is pending
        const START_VALID = 0x400;
    }
}

/// Bus address range `[start, end)` handed to the fetch unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Length in bytes
    pub fn len(&self) -> u32 {
        self.end.wrapping_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether a fetch pointer lies inside this span, end excluded
    pub fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }
}

/// Raw register snapshot, used for hang reports and caller diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticRegisters {
    /// Free-running queue clock counter
    pub clock: u32,
    /// Cycles the command buffer was busy
    pub busy: u32,
    /// Current fetch pointer
    pub current: u32,
    /// End of the programmed span
    pub end: u32,
    pub status: QueueStatus,
}

impl fmt::Display for DiagnosticRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DP_CLCK={:08X} DP_BUSY={:08X} DP_CURR={:08X} DP_END={:08X} DP_STATUS={:08X}",
            self.clock,
            self.busy,
            self.current,
            self.end,
            self.status.bits()
        )
    }
}

/// Monotonic tick counter plus busy-wait
///
/// All timeouts and delays in the crate are expressed in ticks of this source.
pub trait TickSource {
    /// Current tick count
    fn ticks(&mut self) -> u64;

    /// Tick rate in Hz
    fn ticks_per_second(&self) -> u64;

    /// Busy-wait for `ticks` ticks
    fn wait_ticks(&mut self, ticks: u64);

    /// Convert microseconds to ticks
    fn us_to_ticks(&self, us: u64) -> u64 {
        us.saturating_mul(self.ticks_per_second()) / 1_000_000
    }

    /// Convert milliseconds to ticks
    fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms.saturating_mul(self.ticks_per_second()) / 1_000
    }

    /// Busy-wait for `us` microseconds
    fn wait_us(&mut self, us: u64) {
        let ticks = self.us_to_ticks(us);
        self.wait_ticks(ticks);
    }
}

/// The hardware command queue
///
/// One consumer, one span at a time. Implemented by the memory-mapped backend
/// and by the software model in [`crate::hardware::sim`]. Only the dispatcher
/// calls `kick`; everything else is a read.
pub trait HardwareQueue: TickSource {
    /// Program the fetch window over `commands` and start execution
    ///
    /// START is written first, END last; the END write is what triggers the
    /// fetch. The words must stay untouched until the span has been consumed.
    ///
    /// # Returns
    ///
    /// The bus address span that was programmed.
    fn kick(&mut self, commands: &[u64]) -> Span;

    fn status(&mut self) -> QueueStatus;

    /// Current fetch pointer
    fn current(&mut self) -> u32;

    fn start(&mut self) -> u32;

    fn end(&mut self) -> u32;

    fn clock_counter(&mut self) -> u32;

    fn busy_counter(&mut self) -> u32;

    fn pipe_counter(&mut self) -> u32;

    /// Read the registers that make up a hang report
    fn snapshot(&mut self) -> DiagnosticRegisters {
        DiagnosticRegisters {
            clock: self.clock_counter(),
            busy: self.busy_counter(),
            current: self.current(),
            end: self.end(),
            status: self.status(),
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
