//! Framebuffer dump test driver
//!
//! Each cycle: probe the coprocessor, pick a test case (manually or in auto
//! mode), let the caller draw it, then compare a rectangular framebuffer
//! region against that case's reference image. Reference images are produced
//! by dumping the region as hex text (`dump_region`) and converting the dump
//! back to pixels (`parse_dump`).

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::hardware::HardwareQueue;
use crate::submit::{HangReport, Health, HealthMonitor, Dispatcher};
use crate::dpl_info;

/// Background color ignored by the coverage count
pub const BACKGROUND_PIXEL: u16 = 0x2108;

/// Region compared by the harness
///
/// Columns `x0..=x1` are inclusive, rows `y0..y1` exclude `y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestRegion {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl TestRegion {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        (self.x1 + 1).saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// Borrowed 16-bit framebuffer
#[derive(Debug, Clone, Copy)]
pub struct FramebufferView<'a> {
    pixels: &'a [u16],
    width: u32,
    height: u32,
    /// Row length in pixels
    stride: u32,
}

impl<'a> FramebufferView<'a> {
    /// # Panics
    ///
    /// If `pixels` is too short for `height` rows of `stride` pixels.
    pub fn new(pixels: &'a [u16], width: u32, height: u32, stride: u32) -> Self {
        assert!(stride >= width, "framebuffer stride {} below width {}", stride, width);
        assert!(
            pixels.len() >= (stride * height) as usize,
            "framebuffer of {} pixels too small for {}x{} (stride {})",
            pixels.len(),
            width,
            height,
            stride
        );
        Self { pixels, width, height, stride }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at (x, y), `None` outside the visible area
    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.stride + x) as usize).copied()
    }

    /// Pixels of `region` in row-major order; out-of-bounds pixels are `None`
    pub fn region_pixels(&self, region: &TestRegion) -> impl Iterator<Item = Option<u16>> + '_ {
        let region = *region;
        (region.y0..region.y1)
            .flat_map(move |y| (region.x0..=region.x1).map(move |x| (x, y)))
            .map(move |(x, y)| self.pixel(x, y))
    }
}

/// Owned framebuffer capture, as returned by a draw closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pub pixels: Vec<u16>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl Framebuffer {
    pub fn new(pixels: Vec<u16>, width: u32, height: u32) -> Self {
        Self { pixels, width, height, stride: width }
    }

    pub fn view(&self) -> FramebufferView<'_> {
        FramebufferView::new(&self.pixels, self.width, self.height, self.stride)
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestResult {
    /// Not run yet
    #[default]
    Pending,
    Passed,
    Failed {
        mismatches: u32,
    },
    /// Ran, but no reference image exists for this case
    Unverified,
}

impl TestResult {
    pub fn is_done(&self) -> bool {
        !matches!(self, TestResult::Pending)
    }

    /// Three-character cell of the results table
    pub fn code(&self) -> String {
        match self {
            TestResult::Pending => "---".to_string(),
            TestResult::Passed => "000".to_string(),
            TestResult::Failed { mismatches } => format!("{:03X}", mismatches),
            TestResult::Unverified => "???".to_string(),
        }
    }
}

/// Operator input for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Navigation {
    pub next: bool,
    pub prev: bool,
    /// Produce a hex dump of the region this cycle
    pub dump: bool,
}

/// Source of reference images, keyed by test case id
pub trait ReferenceSource {
    fn reference(&self, case_id: u32) -> Option<&[u16]>;
}

/// In-memory reference images
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    images: FxHashMap<u32, Vec<u16>>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, case_id: u32, pixels: Vec<u16>) {
        self.images.insert(case_id, pixels);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Build a set from dump text; image names must be hex case ids
    pub fn from_dump(text: &str) -> Result<Self> {
        let mut set = Self::new();
        for image in parse_dump(text)? {
            let case_id = u32::from_str_radix(&image.name, 16).map_err(|_| Error::MalformedDump {
                line: image.line,
                reason: format!("test name '{}' is not a hex id", image.name),
            })?;
            set.insert(case_id, image.pixels());
        }
        Ok(set)
    }
}

impl ReferenceSource for ReferenceSet {
    fn reference(&self, case_id: u32) -> Option<&[u16]> {
        self.images.get(&case_id).map(|p| p.as_slice())
    }
}

/// File name a reference image for `case_id` is stored under
pub fn reference_file_name(case_id: u32) -> String {
    format!("{:08X}.test", case_id)
}

/// One image recovered from dump text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub name: String,
    /// Raw bytes, big-endian 16-bit pixels
    pub bytes: Vec<u8>,
    /// Line of the `TEST=` header
    pub line: usize,
}

impl ReferenceImage {
    pub fn pixels(&self) -> Vec<u16> {
        self.bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// Write `region` as a `TEST=XXXXXXXX` header plus one hex row per line
pub fn dump_region(framebuffer: &FramebufferView<'_>, region: &TestRegion, case_id: u32) -> String {
    let mut out = String::with_capacity(16 + region.pixel_count() * 4 + region.height() as usize);
    let _ = writeln!(out, "TEST={:08X}", case_id);
    for y in region.y0..region.y1 {
        for x in region.x0..=region.x1 {
            let _ = write!(out, "{:04X}", framebuffer.pixel(x, y).unwrap_or(0));
        }
        out.push('\n');
    }
    out
}

/// Parse dump text back into reference images
///
/// Lines are trimmed; empty lines and `[Debug]` lines are skipped. Data before
/// the first `TEST=` header is ignored. Headers without data produce no image.
pub fn parse_dump(text: &str) -> Result<Vec<ReferenceImage>> {
    let mut images = Vec::new();
    let mut current: Option<ReferenceImage> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("[Debug]") {
            continue;
        }

        if let Some(name) = line.strip_prefix("TEST=") {
            if let Some(done) = current.take() {
                if !done.bytes.is_empty() {
                    images.push(done);
                }
            }
            current = Some(ReferenceImage {
                name: name.trim().to_string(),
                bytes: Vec::new(),
                line: line_no,
            });
            continue;
        }

        let Some(image) = current.as_mut() else {
            continue;
        };
        if line.len() % 2 != 0 {
            return Err(Error::MalformedDump {
                line: line_no,
                reason: "odd number of hex digits".to_string(),
            });
        }
        for pair in line.as_bytes().chunks_exact(2) {
            let digits = std::str::from_utf8(pair).map_err(|_| Error::MalformedDump {
                line: line_no,
                reason: "non-ASCII data".to_string(),
            })?;
            let byte = u8::from_str_radix(digits, 16).map_err(|_| Error::MalformedDump {
                line: line_no,
                reason: format!("'{}' is not a hex byte", digits),
            })?;
            image.bytes.push(byte);
        }
    }

    if let Some(done) = current {
        if !done.bytes.is_empty() {
            images.push(done);
        }
    }
    Ok(images)
}

/// What one harness cycle produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub case_index: usize,
    pub case_id: u32,
    pub result: TestResult,
    /// Pixels in the region that are not the background color
    pub covered_pixels: u32,
    /// Cases with a result
    pub done: usize,
    pub passed: usize,
    pub total: usize,
    /// Region dump, when requested through `Navigation::dump`
    pub dump: Option<String>,
}

impl CycleSummary {
    /// `Some(all passed)` once every case has run
    pub fn all_ok(&self) -> Option<bool> {
        (self.done == self.total).then_some(self.passed == self.total)
    }

    /// Header line: "Passed: 3/4 FAIL!" or "Test running..."
    pub fn status_line(&self) -> String {
        match self.all_ok() {
            Some(true) => format!("Passed: {}/{} OK", self.passed, self.total),
            Some(false) => format!("Passed: {}/{} FAIL!", self.passed, self.total),
            None => "Test running...".to_string(),
        }
    }
}

/// Outcome of `DumpTest::run_cycle`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Probe found the coprocessor hung; nothing else ran
    Hung(HangReport),
    Ran(CycleSummary),
}

/// Test case driver
pub struct DumpTest {
    cases: Vec<u32>,
    results: Vec<TestResult>,
    index: usize,
    auto_mode: bool,
    region: TestRegion,
    /// Delay after each cycle, in microseconds
    pub settle_us: u64,
}

impl DumpTest {
    /// # Errors
    ///
    /// `Error::InvalidConfig` if `cases` is empty or `region` has no pixels.
    pub fn new(cases: Vec<u32>, region: TestRegion) -> Result<Self> {
        if cases.is_empty() {
            return Err(Error::InvalidConfig("dump test needs at least one case".to_string()));
        }
        if region.pixel_count() == 0 {
            return Err(Error::InvalidConfig(format!("empty test region {:?}", region)));
        }
        let results = vec![TestResult::Pending; cases.len()];
        Ok(Self {
            cases,
            results,
            index: 0,
            auto_mode: true,
            region,
            settle_us: 5_000,
        })
    }

    /// Back to the first case with every result pending, in auto mode
    pub fn reset(&mut self) {
        self.index = 0;
        self.auto_mode = true;
        self.results.iter_mut().for_each(|r| *r = TestResult::Pending);
    }

    pub fn cases(&self) -> &[u32] {
        &self.cases
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_auto(&self) -> bool {
        self.auto_mode
    }

    pub fn region(&self) -> &TestRegion {
        &self.region
    }

    /// One test cycle
    ///
    /// The case index moves before drawing: next/prev from `input`, then one
    /// more step while in auto mode. Auto mode ends at the start of the first
    /// cycle that finds every case with a result.
    ///
    /// # Arguments
    ///
    /// * `dispatcher` - Dispatcher used for the probe and passed to `draw`
    /// * `monitor` - Health monitor running the probe
    /// * `input` - Operator navigation for this cycle
    /// * `references` - Reference images by case id
    /// * `draw` - Renders the case and returns the framebuffer to inspect
    pub fn run_cycle<Q, R, D>(
        &mut self,
        dispatcher: &mut Dispatcher<Q>,
        monitor: &mut HealthMonitor,
        input: Navigation,
        references: &R,
        draw: D,
    ) -> CycleOutcome
    where
        Q: HardwareQueue,
        R: ReferenceSource + ?Sized,
        D: FnOnce(&mut Dispatcher<Q>, u32) -> Framebuffer,
    {
        if let Health::Hung(report) = monitor.probe_default(dispatcher) {
            return CycleOutcome::Hung(report);
        }

        if self.results.iter().all(TestResult::is_done) {
            self.auto_mode = false;
        }

        let count = self.cases.len();
        if input.next {
            self.index += 1;
        }
        if input.prev {
            self.index = (self.index + count - 1) % count;
        }
        if self.auto_mode {
            self.index += 1;
        }
        self.index %= count;

        let case_id = self.cases[self.index];
        let framebuffer = draw(dispatcher, case_id);
        let view = framebuffer.view();

        let dump = input.dump.then(|| dump_region(&view, &self.region, case_id));
        let (result, covered_pixels) = self.compare(&view, references.reference(case_id));
        self.results[self.index] = result;

        let summary = CycleSummary {
            case_index: self.index,
            case_id,
            result,
            covered_pixels,
            done: self.results.iter().filter(|r| r.is_done()).count(),
            passed: self.results.iter().filter(|r| **r == TestResult::Passed).count(),
            total: count,
            dump,
        };

        if summary.all_ok().is_some() && self.auto_mode {
            dpl_info!("dpl::DumpTest", "{}", summary.status_line());
        }

        dispatcher.wait_us(self.settle_us);
        CycleOutcome::Ran(summary)
    }

    /// Mismatch count against `reference`, plus non-background pixel count
    fn compare(&self, view: &FramebufferView<'_>, reference: Option<&[u16]>) -> (TestResult, u32) {
        let mut covered = 0u32;
        let mut mismatches = 0u32;
        let mut expected = reference.map(|r| r.iter());

        for pixel in view.region_pixels(&self.region) {
            if let Some(px) = pixel {
                if px != BACKGROUND_PIXEL {
                    covered += 1;
                }
            }
            if let Some(iter) = expected.as_mut() {
                match (iter.next(), pixel) {
                    (Some(want), Some(got)) if *want == got => {}
                    _ => mismatches += 1,
                }
            }
        }

        let result = match reference {
            None => TestResult::Unverified,
            Some(_) if mismatches == 0 => TestResult::Passed,
            Some(_) => TestResult::Failed { mismatches },
        };
        (result, covered)
    }
}

#[cfg(test)]
#[path = "dump_test_tests.rs"]
mod tests;
