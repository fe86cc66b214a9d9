//! Command recording: the `Opcode` encoder seam, the fixed-capacity
//! `CommandBuffer`, and a reference encoder for the RDP command set.

pub mod command_buffer;
pub mod opcode;
pub mod rdp;

pub use command_buffer::{BufferState, CommandBuffer, RawCursor};
pub use opcode::Opcode;
pub use rdp::{
    CycleType, DitherAlpha, DitherRgb, FillTriangle, ImageFormat, OtherModes, PixelSize, RdpCmd,
    RdpOp, Rgba, Surface, MAX_COORD,
};
