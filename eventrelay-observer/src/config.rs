use std::time::Duration;

/// Quiet period that coalesces bursts of subscription changes into one `start`.
pub const START_DEBOUNCE: Duration = Duration::from_millis(50);
/// Delay before the next long poll after a successful fetch.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Delay before the next long poll after a failed fetch.
pub const POLL_ERROR_INTERVAL: Duration = Duration::from_millis(2500);

/// Relay cadence. Defaults to the module constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTimings {
    pub start_debounce: Duration,
    pub poll_interval: Duration,
    pub poll_error_interval: Duration,
}

impl Default for RelayTimings {
    fn default() -> Self {
        Self {
            start_debounce: START_DEBOUNCE,
            poll_interval: POLL_INTERVAL,
            poll_error_interval: POLL_ERROR_INTERVAL,
        }
    }
}
