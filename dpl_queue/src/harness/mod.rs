//! Correctness-test harness: the framebuffer dump test driver and the span
//! buffer check.

pub mod dump_test;
pub mod span_check;

pub use dump_test::{
    dump_region, parse_dump, reference_file_name, CycleOutcome, CycleSummary, DumpTest,
    Framebuffer, FramebufferView, Navigation, ReferenceImage, ReferenceSet, ReferenceSource,
    TestRegion, TestResult, BACKGROUND_PIXEL,
};
pub use span_check::{
    read_span_pixels, SlotResult, SpanBufferCheck, SpanCheckReport, SpanPixel, SpanTestValue,
    SPAN_TEST_VALUES,
};
