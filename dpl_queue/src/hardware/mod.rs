//! Hardware seams: the command queue registers, the tick source, the
//! diagnostic test-mode port, and a software model of all three.

pub mod queue;
pub mod sim;
pub mod test_mode;

pub use queue::{
    DiagnosticRegisters, HardwareQueue, QueueStatus, Span, TickSource, N64_TICKS_PER_SECOND,
};
pub use sim::{SimConfig, SimQueue, SPAN_SLOT_COUNT};
pub use test_mode::TestModePort;
