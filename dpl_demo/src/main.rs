//! DPL demo - drives the submission core against the software queue
//!
//! Runs the health probe, a blocking clear, the double-buffered scanline
//! effect, the span buffer check, two passes of the dump test harness and a
//! simulated hang, logging each stage.

use colored::Colorize;
use dpl_queue::dpl::command::{CycleType, OtherModes, RdpCmd, Rgba, Surface};
use dpl_queue::dpl::hardware::{SimConfig, SimQueue};
use dpl_queue::dpl::harness::{
    reference_file_name, CycleOutcome, DumpTest, Framebuffer, Navigation, ReferenceSet,
    SpanBufferCheck, TestRegion, BACKGROUND_PIXEL,
};
use dpl_queue::dpl::log::{Log, LogSeverity};
use dpl_queue::dpl::{
    CommandBuffer, DispatchConfig, Dispatcher, DoubleBufferScheduler, Health, HealthMonitor,
    Result,
};
use dpl_queue::{dpl_error, dpl_info, dpl_warn};

const FB_ADDR: u32 = 0x0080_0000;
const FB_WIDTH: u16 = 320;
const FB_HEIGHT: u16 = 240;

/// Words per two-pixel cell of the scanline effect: color, rect, color, sync
const CELL_WORDS: usize = 4;
const CELLS_PER_ROW: usize = FB_WIDTH as usize / 2;
const FRAMES: u32 = 4;

fn surface() -> Surface {
    Surface::new(FB_ADDR, FB_WIDTH, FB_HEIGHT, FB_WIDTH as u32 * Surface::BYTES_PER_PIXEL)
}

fn main() {
    Log::set_min_severity(LogSeverity::Info);
    println!("{}", "=== DPL submission demo ===".bold().cyan());

    if let Err(e) = run() {
        dpl_error!("dpl::Demo", "Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut queue = SimQueue::new(SimConfig::default())?;
    queue.attach_framebuffer(FB_ADDR, FB_WIDTH as u32, FB_HEIGHT as u32);
    let mut dispatcher = Dispatcher::new(queue, DispatchConfig::default())?;
    let mut monitor = HealthMonitor::new()?;

    stage("Health probe");
    report_health(monitor.probe_default(&mut dispatcher));

    stage("Blocking clear");
    clear(&mut dispatcher, RdpCmd::set_fill_color(Rgba::new(0x10, 0x10, 0x10, 0xFF)))?;
    dpl_info!(
        "dpl::Demo",
        "Clear done, pixel(0,0)={:04X}",
        capture(&dispatcher).pixels[0]
    );

    stage("Double-buffered scanlines");
    scanline_effect(&mut dispatcher)?;

    stage("Span buffer check");
    let report = SpanBufferCheck::run(dispatcher.queue_mut());
    if report.all_ok() {
        println!("{}", report.summary_line().green());
    } else {
        println!("{}", report.summary_line().red());
    }

    stage("Dump test");
    dump_test(&mut dispatcher, &mut monitor)?;

    stage("Simulated hang");
    dispatcher.queue_mut().hang_after(1);
    report_health(monitor.probe_default(&mut dispatcher));
    dispatcher.queue_mut().power_cycle();
    report_health(monitor.probe_default(&mut dispatcher));

    let stats = dispatcher.stats();
    dpl_info!(
        "dpl::Demo",
        "Submissions: {} sync, {} async, {} probe, {} timeouts",
        stats.sync_submissions,
        stats.async_submissions,
        stats.probe_submissions,
        stats.timeouts
    );
    Ok(())
}

fn stage(name: &str) {
    println!("{}", format!("--- {} ---", name).bold());
}

fn report_health(health: Health) {
    match health {
        Health::Healthy => println!("{}", "RDP healthy".green()),
        Health::Hung(report) => println!("{}", report.to_string().red().bold()),
    }
}

fn capture(dispatcher: &Dispatcher<SimQueue>) -> Framebuffer {
    let pixels = dispatcher
        .queue()
        .framebuffer()
        .map(<[u16]>::to_vec)
        .unwrap_or_else(|| vec![0; FB_WIDTH as usize * FB_HEIGHT as usize]);
    Framebuffer::new(pixels, FB_WIDTH as u32, FB_HEIGHT as u32)
}

/// Target the framebuffer in FILL mode and clear it with `fill_color`
fn clear(dispatcher: &mut Dispatcher<SimQueue>, fill_color: RdpCmd) -> Result<()> {
    let mut buf = CommandBuffer::new(8)?;
    buf.append(RdpCmd::SYNC_PIPE)
        .append(surface().color_image())
        .append(surface().full_scissor())
        .append(RdpCmd::set_other_modes(OtherModes::new().cycle_type(CycleType::Fill)))
        .append(fill_color)
        .append(RdpCmd::fill_rect(0, 0, FB_WIDTH - 1, FB_HEIGHT - 1))
        .append(RdpCmd::SYNC_FULL);

    let outcome = dispatcher.submit_sync_default(&mut buf)?;
    if !outcome.is_completed() {
        dpl_warn!("dpl::Demo", "Clear did not complete");
    }
    Ok(())
}

/// Two source pixels packed as one fill color
fn source_pair(image: u32, x: u32, y: u32) -> u32 {
    let shade = |v: u32| Rgba::new((v * 3) as u8, (y ^ image * 0x55) as u8, (x + y) as u8, 0xFF);
    let left = shade(x).to_rgba16() as u32;
    let right = shade(x + 1).to_rgba16() as u32;
    left << 16 | right
}

/// Row-by-row fill of two-pixel cells through the double buffer
///
/// Both buffers are prefilled with one placeholder cell per column; each
/// step patches the colors and rectangles in place and resubmits. The second
/// fill color of a cell is set with no sync after the rectangle.
fn scanline_effect(dispatcher: &mut Dispatcher<SimQueue>) -> Result<()> {
    let mut scheduler = DoubleBufferScheduler::with_prefill(CELLS_PER_ROW * CELL_WORDS, |buf| {
        for _ in 0..CELLS_PER_ROW {
            buf.append(RdpCmd::set_fill_color_raw(0))
                .append(RdpCmd::fill_rect_fx(0, 0, 0, 0))
                .append(RdpCmd::set_fill_color_raw(0))
                .append(RdpCmd::SYNC_PIPE);
        }
    })?;

    let row_ticks = dispatcher.queue().config().ticks_per_command
        * (CELLS_PER_ROW * CELL_WORDS) as u64;

    for frame in 0..FRAMES {
        let first = frame % 4;
        for y in (first..FB_HEIGHT as u32).step_by(4) {
            scheduler.step(dispatcher, |buf| {
                // SAFETY: the scheduler retired and reset this buffer, and
                // the queue copied its last span when it was kicked
                let mut cursor = unsafe { buf.raw_cursor() };
                for cell in 0..CELLS_PER_ROW as u32 {
                    let x = cell * 2;
                    let words = cursor.unwritten();
                    words[0] = RdpCmd::set_fill_color_raw(source_pair(1, x, y)).as_raw();
                    words[1] = RdpCmd::fill_rect_fx(
                        (x * 4) as u16,
                        (y * 4) as u16,
                        (x * 4 + 4) as u16,
                        (y * 4) as u16,
                    )
                    .as_raw();
                    words[2] = RdpCmd::set_fill_color_raw(source_pair(0, x, y)).as_raw();
                    cursor.advance(CELL_WORDS);
                }
            })?;
            dispatcher.wait_ticks(row_ticks);
        }
        dpl_info!("dpl::Demo", "Frame {} submitted", frame);
    }
    scheduler.retire_all(dispatcher)?;

    let pixel = capture(dispatcher).pixels[100];
    dpl_info!(
        "dpl::Demo",
        "Pixel 100 after {} frames: {:04X} (low bits {:03b})",
        FRAMES,
        pixel,
        (pixel >> 1) & 0b111
    );
    Ok(())
}

/// White rectangle at (2, 2) on the background color
fn draw_rect(dispatcher: &mut Dispatcher<SimQueue>, width: u16, height: u16) -> Result<()> {
    let background = BACKGROUND_PIXEL as u32;
    clear(dispatcher, RdpCmd::set_fill_color_raw(background << 16 | background))?;

    let mut buf = CommandBuffer::new(4)?;
    buf.append(RdpCmd::SYNC_PIPE)
        .append(RdpCmd::set_fill_color(Rgba::WHITE))
        .append(RdpCmd::fill_rect(2, 2, 1 + width, 1 + height))
        .append(RdpCmd::SYNC_FULL);
    dispatcher.submit_sync_default(&mut buf)?;
    Ok(())
}

/// Case id: rectangle width in the high half, height in the low half
fn draw_case(dispatcher: &mut Dispatcher<SimQueue>, case_id: u32) -> Framebuffer {
    if let Err(e) = draw_rect(dispatcher, (case_id >> 16) as u16, case_id as u16) {
        dpl_warn!("dpl::Demo", "Case {:08X} not drawn: {}", case_id, e);
    }
    capture(dispatcher)
}

fn dump_test(dispatcher: &mut Dispatcher<SimQueue>, monitor: &mut HealthMonitor) -> Result<()> {
    let cases = vec![0x0001_0001, 0x0004_0002, 0x0008_0008, 0x000C_0003];
    let region = TestRegion::new(0, 0, 15, 12);

    // Pass 1: no references yet, collect the dumps
    let mut harness = DumpTest::new(cases.clone(), region)?;
    harness.settle_us = 0;
    let mut dump = String::new();
    for _ in 0..cases.len() {
        let input = Navigation { dump: true, ..Default::default() };
        match harness.run_cycle(dispatcher, monitor, input, &ReferenceSet::new(), draw_case) {
            CycleOutcome::Ran(summary) => {
                dpl_info!(
                    "dpl::Demo",
                    "{} -> {} ({} px covered)",
                    reference_file_name(summary.case_id),
                    summary.result.code(),
                    summary.covered_pixels
                );
                dump.push_str(&summary.dump.unwrap_or_default());
            }
            CycleOutcome::Hung(report) => {
                println!("{}", report.to_string().red().bold());
                return Ok(());
            }
        }
    }

    // Pass 2: verify against what pass 1 dumped
    let references = ReferenceSet::from_dump(&dump)?;
    let mut harness = DumpTest::new(cases.clone(), region)?;
    harness.settle_us = 0;
    for _ in 0..cases.len() {
        if let CycleOutcome::Ran(summary) =
            harness.run_cycle(dispatcher, monitor, Navigation::default(), &references, draw_case)
        {
            if summary.all_ok().is_some() {
                let line = summary.status_line();
                if summary.all_ok() == Some(true) {
                    println!("{}", line.green());
                } else {
                    println!("{}", line.red());
                }
            }
        }
    }
    Ok(())
}
