//! Reference encoder for the RDP command set.
//!
//! Every RDP command is one or more big 64-bit words with the opcode in bits
//! [61:56]. The helpers here are pure: they pack parameters and nothing else.
//! Coordinates are in the hardware's unsigned 10.2 fixed-point format unless a
//! function says it takes whole pixels.

use crate::command::opcode::Opcode;

/// One encoded single-word RDP command
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RdpCmd(u64);

/// Opcode numbers, as found in bits [61:56] of the first word
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum RdpOp {
    FillTriangle = 0x08,
    SyncLoad = 0x26,
    SyncPipe = 0x27,
    SyncTile = 0x28,
    SyncFull = 0x29,
    SetScissor = 0x2D,
    SetOtherModes = 0x2F,
    FillRectangle = 0x36,
    SetFillColor = 0x37,
    SetFogColor = 0x38,
    SetBlendColor = 0x39,
    SetPrimColor = 0x3A,
    SetEnvColor = 0x3B,
    SetCombineMode = 0x3C,
    SetColorImage = 0x3F,
}

impl RdpOp {
    const fn build(self, payload: u64) -> RdpCmd {
        RdpCmd(((self as u64) << 56) | (payload & PAYLOAD_MASK))
    }
}

const PAYLOAD_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;
const COORD_MASK: u64 = 0xFFF;

/// Largest whole-pixel coordinate a 10.2 field holds
pub const MAX_COORD: u16 = 1023;

/// Pixel to 10.2 fixed point, clamped to `MAX_COORD`
const fn to_fixed(pixels: u16) -> u16 {
    if pixels > MAX_COORD {
        MAX_COORD * 4
    } else {
        pixels * 4
    }
}

/// Last pixel of a run of `extent` pixels from `origin`; a zero extent counts as one
const fn last_pixel(origin: u16, extent: u16) -> u16 {
    origin.saturating_add(extent.saturating_sub(1))
}

/// Color image pixel format
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum ImageFormat {
    Rgba = 0,
    Yuv = 1,
    ColorIndex = 2,
    IntensityAlpha = 3,
    Intensity = 4,
}

/// Color image pixel size
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum PixelSize {
    Bits4 = 0,
    Bits8 = 1,
    Bits16 = 2,
    Bits32 = 3,
}

impl RdpCmd {
    pub const SYNC_PIPE: Self = RdpOp::SyncPipe.build(0);
    pub const SYNC_FULL: Self = RdpOp::SyncFull.build(0);
    pub const SYNC_LOAD: Self = RdpOp::SyncLoad.build(0);
    pub const SYNC_TILE: Self = RdpOp::SyncTile.build(0);

    /// Wraps a raw command word. The caller vouches that it is a valid encoding.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Opcode number of this command
    pub const fn opcode(&self) -> u8 {
        ((self.0 >> 56) & 0x3F) as u8
    }

    pub const fn sync_pipe() -> Self {
        Self::SYNC_PIPE
    }

    /// Waits for the whole pipeline to drain and raises the DP interrupt.
    pub const fn sync_full() -> Self {
        Self::SYNC_FULL
    }

    pub const fn sync_load() -> Self {
        Self::SYNC_LOAD
    }

    pub const fn sync_tile() -> Self {
        Self::SYNC_TILE
    }

    /// `width` is the row length in pixels (the stride, not the visible width).
    pub const fn set_color_image(format: ImageFormat, size: PixelSize, width: u16, address: u32) -> Self {
        RdpOp::SetColorImage.build(
            (format as u64) << 53
                | (size as u64) << 51
                | ((width as u64).wrapping_sub(1) & 0x3FF) << 32
                | (address as u64 & 0x03FF_FFFF),
        )
    }

    /// Scissor box in whole pixels, both corners inclusive. Coordinates
    /// past `MAX_COORD` are clamped.
    pub const fn set_scissor(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self::set_scissor_fx(to_fixed(x0), to_fixed(y0), to_fixed(x1), to_fixed(y1))
    }

    pub const fn set_scissor_fx(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        RdpOp::SetScissor.build(
            (x0 as u64 & COORD_MASK) << 44
                | (y0 as u64 & COORD_MASK) << 32
                | (x1 as u64 & COORD_MASK) << 12
                | (y1 as u64 & COORD_MASK),
        )
    }

    /// Scissor box given as origin plus extent in whole pixels.
    pub const fn set_scissor_extent(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self::set_scissor(x, y, last_pixel(x, width), last_pixel(y, height))
    }

    pub const fn set_other_modes(modes: OtherModes) -> Self {
        RdpOp::SetOtherModes.build(modes.raw())
    }

    /// Fill color for FILL cycle mode on a 16-bit target; the packed pixel is
    /// repeated in both halves.
    pub const fn set_fill_color(color: Rgba) -> Self {
        let px = color.to_rgba16() as u32;
        Self::set_fill_color_raw(px << 16 | px)
    }

    pub const fn set_fill_color_raw(raw: u32) -> Self {
        RdpOp::SetFillColor.build(raw as u64)
    }

    /// Fill rectangle in whole pixels. In FILL mode both corners are inclusive.
    /// Coordinates past `MAX_COORD` are clamped.
    pub const fn fill_rect(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self::fill_rect_fx(to_fixed(x0), to_fixed(y0), to_fixed(x1), to_fixed(y1))
    }

    pub const fn fill_rect_fx(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        RdpOp::FillRectangle.build(
            (x1 as u64 & COORD_MASK) << 44
                | (y1 as u64 & COORD_MASK) << 32
                | (x0 as u64 & COORD_MASK) << 12
                | (y0 as u64 & COORD_MASK),
        )
    }

    /// Fill rectangle covering exactly `width` x `height` pixels in FILL mode.
    /// A zero extent covers one pixel.
    pub const fn fill_rect_size(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self::fill_rect(x, y, last_pixel(x, width), last_pixel(y, height))
    }

    pub const fn set_env_color(color: Rgba) -> Self {
        RdpOp::SetEnvColor.build(color.to_rgba32() as u64)
    }

    pub const fn set_prim_color(color: Rgba) -> Self {
        RdpOp::SetPrimColor.build(color.to_rgba32() as u64)
    }

    pub const fn set_blend_color(color: Rgba) -> Self {
        RdpOp::SetBlendColor.build(color.to_rgba32() as u64)
    }

    pub const fn set_fog_color(color: Rgba) -> Self {
        RdpOp::SetFogColor.build(color.to_rgba32() as u64)
    }

    /// Color combiner setup, passed through as the 56-bit payload.
    pub const fn set_combine_raw(payload: u64) -> Self {
        RdpOp::SetCombineMode.build(payload)
    }
}

impl Opcode for RdpCmd {
    fn word_count(&self) -> usize {
        1
    }

    fn encode(&self, out: &mut [u64]) {
        out[0] = self.0;
    }
}

// ============================================================================
// Colors
// ============================================================================

/// 8-bit-per-channel color
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0, 0, 0, 0);
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// RGBA5551 as stored in a 16-bit framebuffer
    pub const fn to_rgba16(&self) -> u16 {
        ((self.r as u16 >> 3) << 11)
            | ((self.g as u16 >> 3) << 6)
            | ((self.b as u16 >> 3) << 1)
            | (self.a as u16 >> 7)
    }

    /// Expands an RGBA5551 pixel, replicating the high bits into the low ones.
    pub const fn from_rgba16(px: u16) -> Self {
        let r = ((px >> 11) & 0x1F) as u8;
        let g = ((px >> 6) & 0x1F) as u8;
        let b = ((px >> 1) & 0x1F) as u8;
        Self {
            r: (r << 3) | (r >> 2),
            g: (g << 3) | (g >> 2),
            b: (b << 3) | (b >> 2),
            a: if px & 1 != 0 { 0xFF } else { 0 },
        }
    }

    pub const fn to_rgba32(&self) -> u32 {
        (self.r as u32) << 24 | (self.g as u32) << 16 | (self.b as u32) << 8 | self.a as u32
    }
}

// ============================================================================
// Other modes
// ============================================================================

/// Rasterizer cycle type
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum CycleType {
    One = 0,
    Two = 1,
    Copy = 2,
    Fill = 3,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum DitherRgb {
    MagicSquare = 0,
    Bayer = 1,
    Noise = 2,
    Disabled = 3,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum DitherAlpha {
    Pattern = 0,
    InvertedPattern = 1,
    Noise = 2,
    Disabled = 3,
}

/// Builder for the SET_OTHER_MODES payload
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct OtherModes(u64);

impl OtherModes {
    const CYCLE_SHIFT: u32 = 52;
    const RGB_DITHER_SHIFT: u32 = 38;
    const ALPHA_DITHER_SHIFT: u32 = 36;
    const FORCE_BLEND: u64 = 1 << 14;
    const IMAGE_READ: u64 = 1 << 6;
    const Z_UPDATE: u64 = 1 << 5;
    const Z_COMPARE: u64 = 1 << 4;
    const ANTI_ALIAS: u64 = 1 << 3;

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn raw(&self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    const fn with_field(self, shift: u32, width_mask: u64, value: u64) -> Self {
        Self((self.0 & !(width_mask << shift)) | ((value & width_mask) << shift))
    }

    const fn with_flag(self, flag: u64, on: bool) -> Self {
        if on {
            Self(self.0 | flag)
        } else {
            Self(self.0 & !flag)
        }
    }

    pub const fn cycle_type(self, cycle: CycleType) -> Self {
        self.with_field(Self::CYCLE_SHIFT, 0b11, cycle as u64)
    }

    pub const fn dither_rgb(self, mode: DitherRgb) -> Self {
        self.with_field(Self::RGB_DITHER_SHIFT, 0b11, mode as u64)
    }

    pub const fn dither_alpha(self, mode: DitherAlpha) -> Self {
        self.with_field(Self::ALPHA_DITHER_SHIFT, 0b11, mode as u64)
    }

    pub const fn anti_alias(self, on: bool) -> Self {
        self.with_flag(Self::ANTI_ALIAS, on)
    }

    pub const fn force_blend(self, on: bool) -> Self {
        self.with_flag(Self::FORCE_BLEND, on)
    }

    pub const fn image_read(self, on: bool) -> Self {
        self.with_flag(Self::IMAGE_READ, on)
    }

    pub const fn depth_write(self, on: bool) -> Self {
        self.with_flag(Self::Z_UPDATE, on)
    }

    pub const fn depth_compare(self, on: bool) -> Self {
        self.with_flag(Self::Z_COMPARE, on)
    }
}

// ============================================================================
// Flat fill triangle
// ============================================================================

/// Edge coefficients of a non-shaded, non-textured triangle.
///
/// Y values are signed 11.2, X values and slopes signed 15.16, exactly as the
/// hardware consumes them. Computing them from vertices is the caller's job.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct FillTriangle {
    pub left_major: bool,
    pub yl: i16,
    pub ym: i16,
    pub yh: i16,
    pub xl: i32,
    pub dxl_dy: i32,
    pub xh: i32,
    pub dxh_dy: i32,
    pub xm: i32,
    pub dxm_dy: i32,
}

impl FillTriangle {
    pub const WORDS: usize = 4;

    pub const fn words(&self) -> [u64; Self::WORDS] {
        let header = (RdpOp::FillTriangle as u64) << 56
            | (self.left_major as u64) << 55
            | (self.yl as u64 & 0x3FFF) << 32
            | (self.ym as u64 & 0x3FFF) << 16
            | (self.yh as u64 & 0x3FFF);
        [
            header,
            Self::edge(self.xl, self.dxl_dy),
            Self::edge(self.xh, self.dxh_dy),
            Self::edge(self.xm, self.dxm_dy),
        ]
    }

    const fn edge(x: i32, slope: i32) -> u64 {
        (x as u32 as u64) << 32 | (slope as u32 as u64)
    }
}

impl Opcode for FillTriangle {
    fn word_count(&self) -> usize {
        Self::WORDS
    }

    fn encode(&self, out: &mut [u64]) {
        out.copy_from_slice(&self.words());
    }
}

// ============================================================================
// Surfaces
// ============================================================================

/// A 16-bit color framebuffer as seen by the coprocessor
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Surface {
    /// Bus address of the first pixel
    pub address: u32,
    pub width: u16,
    pub height: u16,
    /// Bytes per row
    pub stride: u32,
}

impl Surface {
    pub const BYTES_PER_PIXEL: u32 = 2;

    pub const fn new(address: u32, width: u16, height: u16, stride: u32) -> Self {
        Self { address, width, height, stride }
    }

    /// Row length in pixels
    pub const fn stride_pixels(&self) -> u32 {
        self.stride / Self::BYTES_PER_PIXEL
    }

    /// SET_COLOR_IMAGE targeting this surface
    pub const fn color_image(&self) -> RdpCmd {
        RdpCmd::set_color_image(
            ImageFormat::Rgba,
            PixelSize::Bits16,
            self.stride_pixels() as u16,
            self.address,
        )
    }

    /// Scissor covering the whole visible area
    pub const fn full_scissor(&self) -> RdpCmd {
        RdpCmd::set_scissor_extent(0, 0, self.width, self.height)
    }
}

#[cfg(test)]
#[path = "rdp_tests.rs"]
mod tests;
