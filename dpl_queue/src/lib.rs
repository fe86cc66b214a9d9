/*!
# DPL Queue

Display-list submission core for a fixed-function graphics coprocessor with a
single-consumer command queue (the N64 RDP class of hardware).

Commands are recorded into a fixed-capacity [`CommandBuffer`](dpl::command::CommandBuffer)
and handed to the hardware by a [`Dispatcher`](dpl::submit::Dispatcher) that owns
the queue registers. Everything hardware-specific sits behind the
[`HardwareQueue`](dpl::hardware::HardwareQueue) trait; a deterministic software
model ([`SimQueue`](dpl::hardware::SimQueue)) implements it for tests and host demos.

## Architecture

- **CommandBuffer**: append-only display list with a bounds-checked cursor
- **Opcode**: encoder seam, with a reference RDP command set in `rdp`
- **Dispatcher**: blocking, fire-and-forget and probe submission
- **HealthMonitor**: liveness probe producing a hang report
- **DoubleBufferScheduler**: two buffers recorded and submitted in turn
- **Harness**: framebuffer dump test driver and span buffer check
*/

// Internal modules
mod config;
mod error;
pub mod log;
pub mod command;
pub mod hardware;
pub mod harness;
pub mod submit;

// Main dpl namespace module
pub mod dpl {
    // Error types
    pub use crate::error::{Error, Result};

    // Dispatcher configuration
    pub use crate::config::{CompletionPolicy, DispatchConfig, Timeout};

    // Core types most callers need
    pub use crate::command::{BufferState, CommandBuffer, Opcode};
    pub use crate::hardware::{HardwareQueue, TickSource};
    pub use crate::submit::{Dispatcher, DoubleBufferScheduler, Health, HealthMonitor, Ticket};

    // Logging sub-module (types only; the dpl_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, Log, LogEntry, LogSeverity, Logger};
    }

    // Command recording sub-module
    pub mod command {
        pub use crate::command::*;
    }

    // Hardware seams sub-module
    pub mod hardware {
        pub use crate::hardware::*;
    }

    // Submission sub-module
    pub mod submit {
        pub use crate::submit::*;
    }

    // Harness sub-module
    pub mod harness {
        pub use crate::harness::*;
    }
}
