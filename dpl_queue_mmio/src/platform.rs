/// Platform trait - CPU-side services the memory-mapped queue depends on

use dpl_queue::dpl::hardware::TickSource;
use std::time::Instant;

/// CPU services needed to hand command words to the coprocessor
///
/// The tick source is the CPU count register on a console build. `writeback`
/// flushes the data cache lines covering a byte range to RAM so the fetch unit
/// sees what the CPU wrote.
pub trait Platform: TickSource {
    /// Write back (without invalidating) the cache lines covering `bytes`
    fn writeback(&mut self, bytes: &[u8]);

    /// Bus address of a CPU pointer
    fn physical_address(&self, ptr: *const u8) -> u32 {
        (ptr as usize as u32) & crate::registers::PHYSICAL_MASK
    }
}

/// Platform for hosts with coherent memory and a monotonic clock
///
/// Ticks are derived from `Instant` at the configured rate; `writeback` only
/// counts the bytes it was asked to flush.
pub struct HostPlatform {
    origin: Instant,
    ticks_per_second: u64,
    written_back: u64,
}

impl HostPlatform {
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            origin: Instant::now(),
            ticks_per_second: ticks_per_second.max(1),
            written_back: 0,
        }
    }

    /// Total bytes passed to `writeback`
    pub fn written_back(&self) -> u64 {
        self.written_back
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new(dpl_queue::dpl::hardware::N64_TICKS_PER_SECOND)
    }
}

impl TickSource for HostPlatform {
    fn ticks(&mut self) -> u64 {
        let nanos = self.origin.elapsed().as_nanos();
        (nanos * self.ticks_per_second as u128 / 1_000_000_000) as u64
    }

    fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    fn wait_ticks(&mut self, ticks: u64) {
        let target = self.ticks().saturating_add(ticks);
        while self.ticks() < target {
            std::hint::spin_loop();
        }
    }
}

impl Platform for HostPlatform {
    fn writeback(&mut self, bytes: &[u8]) {
        self.written_back += bytes.len() as u64;
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
