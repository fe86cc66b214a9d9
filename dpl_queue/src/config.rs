/// Dispatcher configuration

use crate::error::{Error, Result};

/// How long a blocking submission may poll before reporting non-completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Poll until the hardware reports completion
    Infinite,
    /// Give up after this many hardware clock ticks
    Ticks(u64),
}

impl Timeout {
    /// Budget in ticks, `None` for infinite
    pub fn ticks(self) -> Option<u64> {
        match self {
            Timeout::Infinite => None,
            Timeout::Ticks(t) => Some(t),
        }
    }
}

/// What the dispatcher assumes about a fire-and-forget submission that has not
/// been observed to complete when new work arrives or its buffer is reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Trust that enough time has passed for the prior buffer to finish.
    /// No registers are read; the buffer is marked completed on retire.
    AssumePriorComplete,
    /// Poll the prior submission to completion, giving up after `timeout_ticks`
    WaitForCompletion {
        timeout_ticks: u64,
    },
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Timeout used by `submit_sync_default`
    pub default_sync_timeout: Timeout,
    /// Handling of unobserved fire-and-forget submissions
    pub completion_policy: CompletionPolicy,
    /// Delay between the health probe kick and the busy-flag read, in microseconds
    pub probe_delay_us: u64,
    /// Ticks to wait between two polls of the fetch registers (0 = spin)
    pub poll_interval_ticks: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_sync_timeout: Timeout::Infinite,
            completion_policy: CompletionPolicy::AssumePriorComplete,
            probe_delay_us: 250,
            poll_interval_ticks: 0,
        }
    }
}

impl DispatchConfig {
    /// Longest probe delay accepted: one NTSC frame
    pub const MAX_PROBE_DELAY_US: u64 = 16_666;

    /// Check the configuration for values the protocol cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.probe_delay_us == 0 {
            return Err(Error::InvalidConfig("probe delay must be non-zero".to_string()));
        }
        if self.probe_delay_us >= Self::MAX_PROBE_DELAY_US {
            return Err(Error::InvalidConfig(format!(
                "probe delay {}us must be shorter than a frame ({}us)",
                self.probe_delay_us,
                Self::MAX_PROBE_DELAY_US
            )));
        }
        if let Timeout::Ticks(0) = self.default_sync_timeout {
            return Err(Error::InvalidConfig("sync timeout of zero ticks can never complete".to_string()));
        }
        if let CompletionPolicy::WaitForCompletion { timeout_ticks: 0 } = self.completion_policy {
            return Err(Error::InvalidConfig("completion wait of zero ticks can never complete".to_string()));
        }
        Ok(())
    }

    /// Same configuration with an explicit completion policy
    pub fn with_completion_policy(mut self, policy: CompletionPolicy) -> Self {
        self.completion_policy = policy;
        self
    }

    /// Same configuration with a different default sync timeout
    pub fn with_sync_timeout(mut self, timeout: Timeout) -> Self {
        self.default_sync_timeout = timeout;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
