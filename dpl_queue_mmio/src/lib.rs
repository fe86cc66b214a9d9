/*!
# DPL Queue - Memory-Mapped Backend

Register-level implementation of the `dpl_queue` hardware seams.

[`MmioQueue`] drives the command queue registers (START, END, CURRENT,
STATUS and the counters) and implements `HardwareQueue`. [`MmioTestPort`]
drives the span test registers and implements `TestModePort`. CPU services
(tick source, cache writeback) come from a [`Platform`].

Both types take a raw register base so they can be pointed at plain memory
in tests.
*/

mod mmio_queue;
mod platform;
mod registers;
mod test_port;

pub use mmio_queue::MmioQueue;
pub use platform::{HostPlatform, Platform};
pub use registers::{RegisterBlock, StatusControl, BLOCK_REGISTERS, DPC_BASE, DPS_BASE};
pub use test_port::MmioTestPort;
