//! Deterministic software model of the command queue
//!
//! `SimQueue` implements [`HardwareQueue`], [`TickSource`] and [`TestModePort`]
//! on a virtual clock so the dispatcher, health monitor and harness can run
//! without hardware. Time only moves when the model is observed: every
//! register or tick read costs `ticks_per_read`, every wait advances by the
//! requested amount, and each command takes `ticks_per_command` to retire.
//!
//! Kicked spans are copied into a fake RAM map at bump-allocated bus
//! addresses, executed in FIFO order and logged. A hang can be injected after
//! a given number of commands, or forced with explicit register values.
//!
//! The model also keeps just enough FILL-mode state (color image, scissor,
//! fill color, fill rectangle) to paint an attached 16-bit framebuffer, so the
//! correctness harness has pixels to compare. Nothing else is rasterized.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::command::rdp::RdpOp;
use crate::error::{Error, Result};
use crate::hardware::queue::{
    DiagnosticRegisters, HardwareQueue, QueueStatus, Span, TickSource, N64_TICKS_PER_SECOND,
};
use crate::hardware::test_mode::TestModePort;

/// Counters are 24 bits wide on hardware
const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Span buffer size in 32-bit slots
pub const SPAN_SLOT_COUNT: usize = 32;

/// Software queue configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Virtual tick rate in Hz
    pub ticks_per_second: u64,
    /// Ticks needed to retire one command word
    pub ticks_per_command: u64,
    /// Ticks consumed by each register or clock read
    pub ticks_per_read: u64,
    /// Stop making progress after this many executed words
    pub hang_after_commands: Option<u64>,
    /// Bus address of the first kicked span
    pub base_address: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: N64_TICKS_PER_SECOND,
            ticks_per_command: 16,
            ticks_per_read: 1,
            hang_after_commands: None,
            base_address: 0x0010_0000,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_second == 0 {
            return Err(Error::InvalidConfig("tick rate must be non-zero".to_string()));
        }
        if self.ticks_per_read == 0 {
            return Err(Error::InvalidConfig(
                "register reads must advance the clock (ticks_per_read > 0)".to_string(),
            ));
        }
        if self.base_address % 8 != 0 {
            return Err(Error::InvalidConfig(format!(
                "base address {:08X} is not 8-byte aligned",
                self.base_address
            )));
        }
        Ok(())
    }

    /// Same configuration with a hang injected after `commands` words
    pub fn with_hang_after(mut self, commands: u64) -> Self {
        self.hang_after_commands = Some(commands);
        self
    }
}

/// One kicked span waiting for, or under, execution
#[derive(Debug)]
struct Job {
    span: Span,
    next: usize,
    len: usize,
}

/// 16-bit framebuffer painted by FILL_RECTANGLE
#[derive(Debug)]
struct SimFramebuffer {
    address: u32,
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

/// FILL-mode state latched from executed commands
#[derive(Debug, Default)]
struct FillState {
    color_image: u32,
    fill_color: u32,
    /// Scissor in whole pixels: x0, y0, x1, y1 (inclusive)
    scissor: Option<(u32, u32, u32, u32)>,
}

/// Software command queue
pub struct SimQueue {
    config: SimConfig,
    now: u64,
    pending_ticks: u64,
    next_address: u32,

    ram: FxHashMap<u32, Vec<u64>>,
    jobs: VecDeque<Job>,
    executed: Vec<u64>,
    opcode_counts: FxHashMap<u8, u64>,

    start: u32,
    end: u32,
    current: u32,
    clock: u32,
    busy: u32,
    pipe: u32,
    kicks: u64,

    stalled: bool,
    forced: Option<DiagnosticRegisters>,

    test_mode: bool,
    slots: [u32; SPAN_SLOT_COUNT],

    fill: FillState,
    framebuffer: Option<SimFramebuffer>,
}

impl SimQueue {
    /// Create an idle queue
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` if `config` fails validation.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base_address;
        Ok(Self {
            config,
            now: 0,
            pending_ticks: 0,
            next_address: base,
            ram: FxHashMap::default(),
            jobs: VecDeque::new(),
            executed: Vec::new(),
            opcode_counts: FxHashMap::default(),
            start: base,
            end: base,
            current: base,
            clock: 0,
            busy: 0,
            pipe: 0,
            kicks: 0,
            stalled: false,
            forced: None,
            test_mode: false,
            slots: [0; SPAN_SLOT_COUNT],
            fill: FillState::default(),
            framebuffer: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Every word executed so far, in execution order
    pub fn executed(&self) -> &[u64] {
        &self.executed
    }

    /// How many executed words carried `op`
    pub fn opcode_count(&self, op: RdpOp) -> u64 {
        self.opcode_counts.get(&(op as u8)).copied().unwrap_or(0)
    }

    /// Number of spans kicked so far
    pub fn kick_count(&self) -> u64 {
        self.kicks
    }

    /// Spans kicked but not fully executed
    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    /// Words stored at a kicked span's start address, while it is in flight
    pub fn memory_at(&self, address: u32) -> Option<&[u64]> {
        self.ram.get(&address).map(|words| words.as_slice())
    }

    /// Whether the model stopped making progress
    pub fn is_hung(&self) -> bool {
        self.stalled || self.forced.is_some()
    }

    /// Freeze the queue and report exactly `registers` from now on
    pub fn force_hang(&mut self, registers: DiagnosticRegisters) {
        self.forced = Some(registers);
    }

    /// Inject a hang once `commands` more words have executed
    pub fn hang_after(&mut self, commands: u64) {
        self.config.hang_after_commands = Some(self.executed.len() as u64 + commands);
        self.check_stall();
    }

    /// Drop all queued work and hang state, as a power cycle would
    pub fn power_cycle(&mut self) {
        self.jobs.clear();
        self.ram.clear();
        self.pending_ticks = 0;
        self.stalled = false;
        self.forced = None;
        self.config.hang_after_commands = None;
        self.current = self.end;
        self.test_mode = false;
    }

    /// Attach a 16-bit framebuffer at bus address `address`
    pub fn attach_framebuffer(&mut self, address: u32, width: u32, height: u32) {
        self.framebuffer = Some(SimFramebuffer {
            address,
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        });
    }

    /// Pixels of the attached framebuffer, row-major
    pub fn framebuffer(&self) -> Option<&[u16]> {
        self.framebuffer.as_ref().map(|fb| fb.pixels.as_slice())
    }

    // ===== MODEL =====

    fn advance(&mut self, ticks: u64) {
        self.now = self.now.wrapping_add(ticks);
        self.clock = self.clock.wrapping_add(ticks as u32) & COUNTER_MASK;

        if self.jobs.is_empty() || self.stalled || self.forced.is_some() {
            self.pending_ticks = 0;
            return;
        }

        self.pending_ticks += ticks;
        while self.pending_ticks >= self.config.ticks_per_command && !self.stalled {
            if !self.execute_one() {
                self.pending_ticks = 0;
                break;
            }
            self.pending_ticks -= self.config.ticks_per_command;
        }
    }

    fn check_stall(&mut self) {
        if let Some(limit) = self.config.hang_after_commands {
            if self.executed.len() as u64 >= limit && !self.jobs.is_empty() {
                if !self.stalled {
                    crate::dpl_debug!(
                        "dpl::SimQueue",
                        "Injected hang at {:08X} after {} words",
                        self.current,
                        self.executed.len()
                    );
                }
                self.stalled = true;
            }
        }
    }

    /// Execute the next queued word. Returns false when there is nothing to do.
    fn execute_one(&mut self) -> bool {
        self.check_stall();
        if self.stalled {
            return false;
        }

        let Some(job) = self.jobs.front_mut() else {
            return false;
        };
        let word = self
            .ram
            .get(&job.span.start)
            .and_then(|words| words.get(job.next))
            .copied()
            .unwrap_or(0);
        job.next += 1;
        self.current = job.span.start + (job.next as u32) * 8;

        if job.next >= job.len {
            let start = job.span.start;
            self.jobs.pop_front();
            self.ram.remove(&start);
        }

        let cost = self.config.ticks_per_command as u32;
        self.busy = self.busy.wrapping_add(cost) & COUNTER_MASK;
        self.pipe = self.pipe.wrapping_add(cost) & COUNTER_MASK;
        self.executed.push(word);
        *self.opcode_counts.entry(((word >> 56) & 0x3F) as u8).or_insert(0) += 1;
        self.apply_fill(word);
        true
    }

    fn apply_fill(&mut self, word: u64) {
        let op = ((word >> 56) & 0x3F) as u8;
        if op == RdpOp::SetColorImage as u8 {
            self.fill.color_image = (word & 0x03FF_FFFF) as u32;
        } else if op == RdpOp::SetFillColor as u8 {
            self.fill.fill_color = word as u32;
        } else if op == RdpOp::SetScissor as u8 {
            let field = |shift: u32| ((word >> shift) & 0xFFF) as u32 / 4;
            self.fill.scissor = Some((field(44), field(32), field(12), field(0)));
        } else if op == RdpOp::FillRectangle as u8 {
            let field = |shift: u32| ((word >> shift) & 0xFFF) as u32 / 4;
            self.fill_rect(field(12), field(0), field(44), field(32));
        }
    }

    fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
        let color = self.fill.fill_color;
        let scissor = self.fill.scissor;
        let image = self.fill.color_image;
        let Some(fb) = self.framebuffer.as_mut() else {
            return;
        };
        if fb.address != image {
            return;
        }

        let (sx0, sy0, sx1, sy1) = scissor.unwrap_or((0, 0, fb.width.saturating_sub(1), fb.height.saturating_sub(1)));
        // Fill mode covers both corners
        let x_end = (x1 + 1).min(sx1 + 1).min(fb.width);
        let y_end = (y1 + 1).min(sy1 + 1).min(fb.height);
        for y in y0.max(sy0)..y_end {
            for x in x0.max(sx0)..x_end {
                let px = if x % 2 == 0 { (color >> 16) as u16 } else { color as u16 };
                fb.pixels[(y * fb.width + x) as usize] = px;
            }
        }
    }

    fn live_status(&self) -> QueueStatus {
        if self.stalled {
            return QueueStatus::PIPE_BUSY | QueueStatus::CMD_BUSY | QueueStatus::START_GCLK;
        }
        let mut status = match self.jobs.len() {
            0 => QueueStatus::CBUF_READY,
            _ => {
                QueueStatus::PIPE_BUSY
                    | QueueStatus::CMD_BUSY
                    | QueueStatus::DMA_BUSY
                    | QueueStatus::START_GCLK
            }
        };
        if self.jobs.len() > 1 {
            status |= QueueStatus::START_VALID | QueueStatus::END_VALID;
        }
        status
    }

    /// Charge one register read and return the (possibly forced) registers
    fn sample_registers(&mut self) -> DiagnosticRegisters {
        let cost = self.config.ticks_per_read;
        self.advance(cost);
        match self.forced {
            Some(forced) => forced,
            None => DiagnosticRegisters {
                clock: self.clock,
                busy: self.busy,
                current: self.current,
                end: self.end,
                status: self.live_status(),
            },
        }
    }

    /// Mask applied by the span buffer to a slot, by position in its group of 4
    fn slot_mask(index: usize) -> u32 {
        match index % 4 {
            0 | 1 => 0xFFFF_FFFF,
            2 => 0x0000_00FF,
            _ => 0,
        }
    }
}

impl TickSource for SimQueue {
    fn ticks(&mut self) -> u64 {
        let cost = self.config.ticks_per_read;
        self.advance(cost);
        self.now
    }

    fn ticks_per_second(&self) -> u64 {
        self.config.ticks_per_second
    }

    fn wait_ticks(&mut self, ticks: u64) {
        self.advance(ticks);
    }
}

impl HardwareQueue for SimQueue {
    fn kick(&mut self, commands: &[u64]) -> Span {
        let start = self.next_address;
        let end = start.wrapping_add((commands.len() * 8) as u32);
        let span = Span { start, end };
        self.next_address = end;

        if self.jobs.is_empty() {
            self.current = start;
        }
        self.start = start;
        self.end = end;
        self.kicks += 1;

        if !commands.is_empty() {
            self.ram.insert(start, commands.to_vec());
            self.jobs.push_back(Job { span, next: 0, len: commands.len() });
            self.check_stall();
        }
        span
    }

    fn status(&mut self) -> QueueStatus {
        self.sample_registers().status
    }

    fn current(&mut self) -> u32 {
        self.sample_registers().current
    }

    fn start(&mut self) -> u32 {
        let cost = self.config.ticks_per_read;
        self.advance(cost);
        self.start
    }

    fn end(&mut self) -> u32 {
        self.sample_registers().end
    }

    fn clock_counter(&mut self) -> u32 {
        self.sample_registers().clock
    }

    fn busy_counter(&mut self) -> u32 {
        self.sample_registers().busy
    }

    fn pipe_counter(&mut self) -> u32 {
        let cost = self.config.ticks_per_read;
        self.advance(cost);
        self.pipe
    }

    fn snapshot(&mut self) -> DiagnosticRegisters {
        self.sample_registers()
    }
}

impl TestModePort for SimQueue {
    fn slot_count(&self) -> usize {
        SPAN_SLOT_COUNT
    }

    fn enable(&mut self) {
        self.test_mode = true;
    }

    fn disable(&mut self) {
        self.test_mode = false;
    }

    fn read(&mut self, index: usize) -> u32 {
        if !self.test_mode {
            return 0;
        }
        self.slots[index % SPAN_SLOT_COUNT]
    }

    fn write(&mut self, index: usize, value: u32) {
        if !self.test_mode {
            return;
        }
        let index = index % SPAN_SLOT_COUNT;
        self.slots[index] = value & Self::slot_mask(index);
    }
}

#[cfg(test)]
#[path = "sim_tests.rs"]
mod tests;
