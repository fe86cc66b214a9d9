//! Span buffer read/write check over the test-mode port
//!
//! Writes a fixed table of values into the first 16 slots and reads them
//! back. Slots keep all, the low byte, or none of what is written depending
//! on their position in each group of four, so the table lists the masked
//! value expected back rather than the value written. A mismatch is reported
//! per slot, never raised as an error.

use std::fmt;

use crate::command::Rgba;
use crate::hardware::TestModePort;

/// One row of the check table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanTestValue {
    pub write: u32,
    pub read: u32,
}

const fn tv(write: u32, read: u32) -> SpanTestValue {
    SpanTestValue { write, read }
}

/// Values written to slots 0..16 and the masked values expected back
pub const SPAN_TEST_VALUES: [SpanTestValue; 16] = [
    tv(0xDEAD_BEEF, 0xDEAD_BEEF),
    tv(0x1234_5678, 0x1234_5678),
    tv(0xBADD_CAFE, 0x0000_00FE),
    tv(0x9876_5432, 0x0000_0000),
    tv(0x1111_1111, 0x1111_1111),
    tv(0x2222_2222, 0x2222_2222),
    tv(0x3333_3333, 0x0000_0033),
    tv(0x4444_4444, 0x0000_0000),
    tv(0x5555_5555, 0x5555_5555),
    tv(0x6666_6666, 0x6666_6666),
    tv(0x7777_7777, 0x0000_0077),
    tv(0x8888_8888, 0x0000_0000),
    tv(0x9999_9999, 0x9999_9999),
    tv(0xAAAA_AAAA, 0xAAAA_AAAA),
    tv(0xBBBB_BBBB, 0x0000_00BB),
    tv(0xCCCC_CCCC, 0x0000_0000),
];

/// Outcome for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotResult {
    pub index: usize,
    pub written: u32,
    pub expected: u32,
    pub actual: u32,
}

impl SlotResult {
    pub fn passed(&self) -> bool {
        self.actual == self.expected
    }
}

impl fmt::Display for SlotResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:01X}:{:08X}!={:08X}", self.index, self.actual, self.expected)
    }
}

/// All slot outcomes of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanCheckReport {
    pub slots: Vec<SlotResult>,
}

impl SpanCheckReport {
    pub fn ok_count(&self) -> usize {
        self.slots.iter().filter(|s| s.passed()).count()
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn all_ok(&self) -> bool {
        self.ok_count() == self.total()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SlotResult> {
        self.slots.iter().filter(|s| !s.passed())
    }

    /// "Span-R/W: 16/16 (OK)"
    pub fn summary_line(&self) -> String {
        format!(
            "Span-R/W: {}/{} ({})",
            self.ok_count(),
            self.total(),
            if self.all_ok() { "OK" } else { "FAIL!" }
        )
    }
}

/// Span buffer read/write check
pub struct SpanBufferCheck;

impl SpanBufferCheck {
    /// Clear the buffer, write the table, read it back. Leaves test mode disabled.
    pub fn run<P: TestModePort>(port: &mut P) -> SpanCheckReport {
        port.enable();
        port.clear();

        for (index, value) in SPAN_TEST_VALUES.iter().enumerate() {
            port.write(index, value.write);
        }

        let slots = SPAN_TEST_VALUES
            .iter()
            .enumerate()
            .map(|(index, value)| SlotResult {
                index,
                written: value.write,
                expected: value.read,
                actual: port.read(index),
            })
            .collect();

        port.disable();

        let report = SpanCheckReport { slots };
        if report.all_ok() {
            crate::dpl_debug!("dpl::SpanCheck", "{}", report.summary_line());
        } else {
            crate::dpl_warn!(
                "dpl::SpanCheck",
                "{} ({})",
                report.summary_line(),
                report.failures().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
            );
        }
        report
    }
}

/// One pixel of a span as latched in the span buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanPixel {
    /// RGBA5551 color
    pub color: u16,
    /// 2-bit coverage value
    pub coverage: u8,
}

impl SpanPixel {
    pub fn rgba(&self) -> Rgba {
        Rgba::from_rgba16(self.color)
    }
}

/// Decode the span buffer into pixels
///
/// Slots come in groups of four: two color words holding two pixels each, a
/// coverage byte with 2 bits per pixel (first pixel in the top bits), and a
/// slot that reads back as zero. Test mode must be enabled.
pub fn read_span_pixels<P: TestModePort>(port: &mut P) -> Vec<SpanPixel> {
    let groups = port.slot_count() / 4;
    let mut pixels = Vec::with_capacity(groups * 4);

    for group in 0..groups {
        let base = group * 4;
        let zero = port.read(base + 3);
        let colors = [port.read(base) | zero, port.read(base + 1) | zero];
        let coverage = port.read(base + 2);

        let packed = [
            (colors[0] >> 16) as u16,
            colors[0] as u16,
            (colors[1] >> 16) as u16,
            colors[1] as u16,
        ];
        for (j, color) in packed.into_iter().enumerate() {
            let shift = 6 - 2 * j as u32;
            pixels.push(SpanPixel {
                color,
                coverage: ((coverage >> shift) & 0b11) as u8,
            });
        }
    }
    pixels
}

#[cfg(test)]
#[path = "span_check_tests.rs"]
mod tests;
