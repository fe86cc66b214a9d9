/// Register blocks - offsets, control bits and volatile 32-bit access

use bitflags::bitflags;
use dpl_queue::dpl::Result;
use dpl_queue::dpl_bail;
use std::ptr::{read_volatile, write_volatile};

// ============================================================================
// COMMAND QUEUE (DPC) REGISTERS
// ============================================================================

/// Uncached KSEG1 address of the command queue registers
pub const DPC_BASE: usize = 0xA410_0000;

/// Start of the fetch window (write first)
pub const DPC_START: usize = 0x00;
/// End of the fetch window (write triggers the fetch)
pub const DPC_END: usize = 0x04;
/// Current fetch pointer
pub const DPC_CURRENT: usize = 0x08;
/// Status on read, `StatusControl` on write
pub const DPC_STATUS: usize = 0x0C;
pub const DPC_CLOCK: usize = 0x10;
pub const DPC_BUFBUSY: usize = 0x14;
pub const DPC_PIPEBUSY: usize = 0x18;
pub const DPC_TMEM: usize = 0x1C;

/// Queue counters are 24 bits wide
pub const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Physical address bits of a pointer handed to the fetch unit
pub const PHYSICAL_MASK: u32 = 0x1FFF_FFFF;

// ============================================================================
// SPAN TEST (DPS) REGISTERS
// ============================================================================

/// Uncached KSEG1 address of the span test registers
pub const DPS_BASE: usize = 0xA420_0000;

pub const DPS_TEST_MODE: usize = 0x04;
pub const DPS_BUFTEST_ADDR: usize = 0x08;
pub const DPS_BUFTEST_DATA: usize = 0x0C;

/// Size of each register block in 32-bit registers
pub const BLOCK_REGISTERS: usize = 8;

bitflags! {
    /// Write-side meaning of the queue status register: each bit pair clears
    /// or sets one status flag, the rest reset a counter
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusControl: u32 {
        const CLR_XBUS_DMEM_DMA = 0x0001;
        const SET_XBUS_DMEM_DMA = 0x0002;
        const CLR_FREEZE = 0x0004;
        const SET_FREEZE = 0x0008;
        const CLR_FLUSH = 0x0010;
        const SET_FLUSH = 0x0020;
        const CLR_TMEM_CTR = 0x0040;
        const CLR_PIPE_CTR = 0x0080;
        const CLR_CMD_CTR = 0x0100;
        const CLR_CLOCK_CTR = 0x0200;

        const CLR_ALL_COUNTERS = Self::CLR_TMEM_CTR.bits()
            | Self::CLR_PIPE_CTR.bits()
            | Self::CLR_CMD_CTR.bits()
            | Self::CLR_CLOCK_CTR.bits();
    }
}

/// Base pointer of one memory-mapped register block
#[derive(Debug)]
pub struct RegisterBlock {
    base: *mut u32,
}

impl RegisterBlock {
    /// Wrap a register block
    ///
    /// # Safety
    ///
    /// `base` must point to `BLOCK_REGISTERS` readable and writable 32-bit
    /// registers that stay mapped for the lifetime of the block, and nothing
    /// else may access them meanwhile.
    ///
    /// # Errors
    ///
    /// `Error::Backend` if `base` is null or not 4-byte aligned.
    pub unsafe fn new(base: *mut u32) -> Result<Self> {
        if base.is_null() {
            dpl_bail!("dpl::RegisterBlock", "register base is null");
        }
        if (base as usize) % 4 != 0 {
            dpl_bail!("dpl::RegisterBlock", "register base {:p} is not word aligned", base);
        }
        Ok(Self { base })
    }

    /// Read the register at byte `offset`
    #[inline]
    pub fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset % 4 == 0 && offset / 4 < BLOCK_REGISTERS);
        // SAFETY: `new` guarantees the block is mapped; offsets are in bounds
        unsafe { read_volatile(self.base.add(offset / 4)) }
    }

    /// Write the register at byte `offset`
    #[inline]
    pub fn write(&mut self, offset: usize, value: u32) {
        debug_assert!(offset % 4 == 0 && offset / 4 < BLOCK_REGISTERS);
        // SAFETY: as for `read`
        unsafe { write_volatile(self.base.add(offset / 4), value) }
    }

    pub fn base(&self) -> *mut u32 {
        self.base
    }
}

#[cfg(test)]
#[path = "registers_tests.rs"]
mod tests;
