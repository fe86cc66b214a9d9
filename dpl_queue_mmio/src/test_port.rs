/// MmioTestPort - TestModePort over the span test registers

use std::sync::atomic::{fence, Ordering};

use dpl_queue::dpl::hardware::{TestModePort, SPAN_SLOT_COUNT};
use dpl_queue::dpl::Result;

use crate::registers::{RegisterBlock, DPS_BASE, DPS_BUFTEST_ADDR, DPS_BUFTEST_DATA, DPS_TEST_MODE};

/// Span buffer access through BUFTEST_ADDR / BUFTEST_DATA
///
/// The slot index is latched into BUFTEST_ADDR before each data access.
pub struct MmioTestPort {
    regs: RegisterBlock,
}

impl MmioTestPort {
    /// # Safety
    ///
    /// `base` must be the mapped span test register block, or memory standing
    /// in for it, as required by [`RegisterBlock::new`].
    ///
    /// # Errors
    ///
    /// `Error::Backend` if `base` is null or misaligned.
    pub unsafe fn new(base: *mut u32) -> Result<Self> {
        Ok(Self { regs: RegisterBlock::new(base)? })
    }

    /// # Safety
    ///
    /// Only sound on the console itself.
    pub unsafe fn at_default_address() -> Result<Self> {
        Self::new(DPS_BASE as *mut u32)
    }

    fn select(&mut self, index: usize) {
        self.regs.write(DPS_BUFTEST_ADDR, (index % SPAN_SLOT_COUNT) as u32);
        fence(Ordering::SeqCst);
    }
}

impl TestModePort for MmioTestPort {
    fn slot_count(&self) -> usize {
        SPAN_SLOT_COUNT
    }

    fn enable(&mut self) {
        self.regs.write(DPS_TEST_MODE, 1);
    }

    fn disable(&mut self) {
        self.regs.write(DPS_TEST_MODE, 0);
    }

    fn read(&mut self, index: usize) -> u32 {
        self.select(index);
        self.regs.read(DPS_BUFTEST_DATA)
    }

    fn write(&mut self, index: usize, value: u32) {
        self.select(index);
        self.regs.write(DPS_BUFTEST_DATA, value);
    }
}

#[cfg(test)]
#[path = "test_port_tests.rs"]
mod tests;
