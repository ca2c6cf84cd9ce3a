// ── Runtime binding configuration ──
//
// These types describe how the engine paces itself and where the
// controller lives. They never touch disk: `ihc-config` (or any other
// host) builds them and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Timing knobs for the scheduler and both listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Period of the refresh scheduler tick.
    pub refresh_tick: Duration,
    /// Run the scheduler tick from an internal task. Hosts that drive
    /// [`IhcBinding::refresh_now`](crate::IhcBinding::refresh_now) from
    /// their own timer turn this off.
    pub refresh_enabled: bool,
    /// Upper bound of one value-notification long-poll.
    pub notification_timeout: Duration,
    /// Upper bound of one controller-state long-poll.
    pub state_change_timeout: Duration,
    /// Quiet period after the last configuration change before
    /// notifications are re-ordered.
    pub settle_delay: Duration,
    /// Pause after a failed session recovery.
    pub recovery_backoff: Duration,
    /// Pause after an unclassified error or a missing session.
    pub error_backoff: Duration,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            refresh_tick: Duration::from_millis(1000),
            refresh_enabled: true,
            notification_timeout: Duration::from_secs(10),
            state_change_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            recovery_backoff: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Where and as whom to connect. Consumed by `ConnectionManager`
/// implementations, never by the engine itself.
#[derive(Debug, Clone)]
pub struct ControllerEndpoint {
    /// Controller URL (e.g., `https://192.168.1.3`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    /// Per-request timeout for non-blocking calls.
    pub timeout: Duration,
}
