/// MmioQueue - HardwareQueue over the memory-mapped command queue registers

use dpl_queue::dpl::hardware::{HardwareQueue, QueueStatus, Span, TickSource};
use dpl_queue::dpl::Result;
use dpl_queue::dpl_trace;

use crate::platform::Platform;
use crate::registers::{
    RegisterBlock, StatusControl, COUNTER_MASK, DPC_BASE, DPC_BUFBUSY, DPC_CLOCK, DPC_CURRENT,
    DPC_END, DPC_PIPEBUSY, DPC_START, DPC_STATUS, DPC_TMEM,
};

/// Command queue driven through its registers
///
/// Owns the register block. Hand it to a `Dispatcher`, which then is the only
/// writer of START and END.
pub struct MmioQueue<P: Platform> {
    regs: RegisterBlock,
    platform: P,
}

impl<P: Platform> MmioQueue<P> {
    /// Queue whose registers start at `base`
    ///
    /// # Safety
    ///
    /// `base` must be the mapped command queue register block, or memory
    /// standing in for it, as required by [`RegisterBlock::new`]. At most one
    /// `MmioQueue` may exist per block.
    ///
    /// # Errors
    ///
    /// `Error::Backend` if `base` is null or misaligned.
    pub unsafe fn new(base: *mut u32, platform: P) -> Result<Self> {
        Ok(Self {
            regs: RegisterBlock::new(base)?,
            platform,
        })
    }

    /// Queue at the console's uncached register address
    ///
    /// # Safety
    ///
    /// Only sound on the console itself, under the same exclusivity rule as
    /// [`MmioQueue::new`].
    pub unsafe fn at_default_address(platform: P) -> Result<Self> {
        Self::new(DPC_BASE as *mut u32, platform)
    }

    /// Reset the clock, busy, pipe and TMEM counters
    pub fn reset_counters(&mut self) {
        self.regs.write(DPC_STATUS, StatusControl::CLR_ALL_COUNTERS.bits());
    }

    /// Raw write to the status register
    pub fn control(&mut self, bits: StatusControl) {
        self.regs.write(DPC_STATUS, bits.bits());
    }

    /// TMEM load counter
    pub fn tmem_counter(&mut self) -> u32 {
        self.regs.read(DPC_TMEM) & COUNTER_MASK
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

impl<P: Platform> TickSource for MmioQueue<P> {
    fn ticks(&mut self) -> u64 {
        self.platform.ticks()
    }

    fn ticks_per_second(&self) -> u64 {
        self.platform.ticks_per_second()
    }

    fn wait_ticks(&mut self, ticks: u64) {
        self.platform.wait_ticks(ticks);
    }
}

impl<P: Platform> HardwareQueue for MmioQueue<P> {
    fn kick(&mut self, commands: &[u64]) -> Span {
        let bytes: &[u8] = bytemuck::cast_slice(commands);
        self.platform.writeback(bytes);

        let start = self.platform.physical_address(bytes.as_ptr());
        let end = start.wrapping_add(bytes.len() as u32);
        self.regs.write(DPC_START, start);
        self.regs.write(DPC_END, end);

        dpl_trace!("dpl::MmioQueue", "START={:08X} END={:08X}", start, end);
        Span { start, end }
    }

    fn status(&mut self) -> QueueStatus {
        QueueStatus::from_bits_truncate(self.regs.read(DPC_STATUS))
    }

    fn current(&mut self) -> u32 {
        self.regs.read(DPC_CURRENT)
    }

    fn start(&mut self) -> u32 {
        self.regs.read(DPC_START)
    }

    fn end(&mut self) -> u32 {
        self.regs.read(DPC_END)
    }

    fn clock_counter(&mut self) -> u32 {
        self.regs.read(DPC_CLOCK) & COUNTER_MASK
    }

    fn busy_counter(&mut self) -> u32 {
        self.regs.read(DPC_BUFBUSY) & COUNTER_MASK
    }

    fn pipe_counter(&mut self) -> u32 {
        self.regs.read(DPC_PIPEBUSY) & COUNTER_MASK
    }
}

#[cfg(test)]
#[path = "mmio_queue_tests.rs"]
mod tests;
