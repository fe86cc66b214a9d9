//! Coprocessor liveness probe
//!
//! A probe kicks `[SYNC_PIPE, SYNC_FULL]`, waits a fixed delay and reads the
//! status register once. If the pipeline is still busy after the delay the
//! coprocessor is considered hung. There is no recovery: the report tells the
//! operator to power cycle.
//!
//! Probe once per correctness-test cycle, never per frame.

use std::fmt;

use crate::command::{CommandBuffer, RdpCmd};
use crate::error::Result;
use crate::hardware::{DiagnosticRegisters, HardwareQueue, QueueStatus};
use crate::submit::dispatcher::Dispatcher;
use crate::submit::ticket::Ticket;
use crate::{dpl_debug, dpl_error};

/// Result of a liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Hung(HangReport),
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Healthy)
    }
}

/// Raw registers captured when a hang was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangReport {
    pub registers: DiagnosticRegisters,
    /// Probe submission that did not drain
    pub ticket: Ticket,
    /// Delay that elapsed before the status read, in microseconds
    pub delay_us: u64,
}

impl HangReport {
    pub const HEADLINE: &'static str = "!!! RDP HAS CRASHED !!!";
    pub const INSTRUCTION: &'static str = "Please Power Cycle";

    /// Operator-facing text, one entry per screen line
    pub fn lines(&self) -> Vec<String> {
        vec![
            Self::HEADLINE.to_string(),
            Self::INSTRUCTION.to_string(),
            format!("DP_CLCK: {:08X}", self.registers.clock),
            format!("DP_BUSY: {:08X}", self.registers.busy),
            format!("DP_CURR: {:08X}", self.registers.current),
            format!("DP_END : {:08X}", self.registers.end),
        ]
    }
}

impl fmt::Display for HangReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Runs liveness probes through a dispatcher
///
/// Owns the two-word probe buffer so a probe never allocates.
pub struct HealthMonitor {
    probe: CommandBuffer,
    probes: u64,
    last: Option<Health>,
}

impl HealthMonitor {
    pub const PROBE_WORDS: usize = 2;

    /// # Errors
    ///
    /// `Error::OutOfMemory` if the probe buffer cannot be allocated.
    pub fn new() -> Result<Self> {
        Ok(Self {
            probe: CommandBuffer::new(Self::PROBE_WORDS)?,
            probes: 0,
            last: None,
        })
    }

    /// Probe with an explicit delay between kick and status read
    ///
    /// A probe buffer left behind by a hung probe is reused: the hardware is
    /// wedged on it either way.
    pub fn probe<Q: HardwareQueue>(&mut self, dispatcher: &mut Dispatcher<Q>, delay_us: u64) -> Health {
        if self.probe.state() == crate::command::BufferState::Submitted {
            self.probe.mark_timed_out();
        }
        self.probe.reset();
        self.probe.append(RdpCmd::sync_pipe()).append(RdpCmd::sync_full());

        let ticket = dispatcher.submit_probe(&mut self.probe);
        dispatcher.wait_us(delay_us);
        let status = dispatcher.queue_mut().status();
        self.probes += 1;

        let health = if status.contains(QueueStatus::PIPE_BUSY) {
            self.probe.mark_timed_out();
            let report = HangReport {
                registers: dispatcher.diagnostics(),
                ticket,
                delay_us,
            };
            dpl_error!(
                "dpl::HealthMonitor",
                "Coprocessor hung after {}us probe: {}",
                delay_us,
                report.registers
            );
            Health::Hung(report)
        } else {
            self.probe.mark_completed();
            dpl_debug!(
                "dpl::HealthMonitor",
                "Probe #{} healthy (status {:08X})",
                self.probes,
                status.bits()
            );
            Health::Healthy
        };

        self.last = Some(health.clone());
        health
    }

    /// Probe with the dispatcher's configured delay
    pub fn probe_default<Q: HardwareQueue>(&mut self, dispatcher: &mut Dispatcher<Q>) -> Health {
        let delay_us = dispatcher.config().probe_delay_us;
        self.probe(dispatcher, delay_us)
    }

    /// Result of the most recent probe
    pub fn last(&self) -> Option<&Health> {
        self.last.as_ref()
    }

    /// Number of probes run so far
    pub fn probe_count(&self) -> u64 {
        self.probes
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
