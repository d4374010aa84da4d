//! Fixed delays and retry limits used during a login attempt
//!
//! These are tuned against the Riot Client's startup and input latency. The
//! state machine reads them from `Timings`; nothing changes them mid-attempt.

use crate::config::AppConfig;
use std::time::Duration;

/// Interval between checks for a freshly launched process
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Number of process checks after a launch (~25 s total)
pub const POLL_ATTEMPTS: u32 = 50;
/// Warm-up after a fresh launch before looking for the window
pub const SETTLE_DELAY: Duration = Duration::from_millis(3000);
/// Wait before the second and last main-window lookup
pub const WINDOW_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Wait after foreground activation
pub const ACTIVATION_DELAY: Duration = Duration::from_millis(500);
/// Wait after the focus click
pub const POST_CLICK_DELAY: Duration = Duration::from_millis(200);
/// Wait after each baseline Tab
pub const TAB_DELAY: Duration = Duration::from_millis(50);
/// Wait between clearing, typing and advancing fields
pub const FIELD_DELAY: Duration = Duration::from_millis(100);
/// Wait after typing the password, before Enter
pub const PRE_SUBMIT_DELAY: Duration = Duration::from_millis(200);

/// Tabs sent after the focus click to land on the username field
pub const BASELINE_TABS: usize = 3;
/// Focus click position relative to the window's top-left corner
pub const FOCUS_CLICK_OFFSET: (i32, i32) = (100, 100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub settle_delay: Duration,
    pub window_retry_delay: Duration,
    pub activation_delay: Duration,
    pub post_click_delay: Duration,
    pub tab_delay: Duration,
    pub field_delay: Duration,
    pub pre_submit_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            poll_attempts: POLL_ATTEMPTS,
            settle_delay: SETTLE_DELAY,
            window_retry_delay: WINDOW_RETRY_DELAY,
            activation_delay: ACTIVATION_DELAY,
            post_click_delay: POST_CLICK_DELAY,
            tab_delay: TAB_DELAY,
            field_delay: FIELD_DELAY,
            pre_submit_delay: PRE_SUBMIT_DELAY,
        }
    }
}

impl Timings {
    /// Defaults, with the settle delay taken from the user's launch delay setting
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settle_delay: config.launch_delay(),
            ..Self::default()
        }
    }

    /// Upper bound on how long process polling can take
    pub fn max_poll_duration(&self) -> Duration {
        self.poll_interval * self.poll_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let timings = Timings::default();
        assert_eq!(timings.settle_delay, Duration::from_secs(3));
        assert_eq!(timings.max_poll_duration(), Duration::from_secs(25));
    }

    #[test]
    fn test_settle_delay_follows_config() {
        let config = AppConfig {
            launch_delay_ms: 1200,
            ..AppConfig::default()
        };
        let timings = Timings::from_config(&config);
        assert_eq!(timings.settle_delay, Duration::from_millis(1200));
        assert_eq!(timings.poll_interval, POLL_INTERVAL);
    }
}
