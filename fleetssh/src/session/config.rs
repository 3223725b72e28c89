//! Timing and protocol settings for a session.

use std::time::Duration;

/// Marker printed by the node when an operation succeeded.
pub const SUCCESS_MARKER: &str = "OperationSucceeded";

/// Marker printed by the node when an operation failed.
pub const FAILURE_MARKER: &str = "OperationFailed";

/// Configuration for the session protocol engine.
///
/// Every network wait is guarded twice: the per-call timeout given to the
/// transport, and an absolute deadline of that timeout plus `grace` which
/// aborts the whole step even if the transport ignores its own timeout.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use fleetssh::SessionConfig;
///
/// let config = SessionConfig::default()
///     .command_timeout(Duration::from_secs(30))
///     .grace(Duration::from_secs(2));
/// assert_eq!(config.command_deadline(), Duration::from_secs(32));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time budget for the login step.
    pub login_timeout: Duration,

    /// Per-call timeout for transport connect.
    pub connect_timeout: Duration,

    /// Default per-call timeout for command writes and reads.
    pub command_timeout: Duration,

    /// Slack added to every timeout to form the absolute deadline.
    pub grace: Duration,

    /// Pause before reading a response; some nodes answer slowly.
    pub quiescence: Duration,

    /// Pause after sending the logout command.
    pub settle: Duration,

    /// Maximum bytes requested per receive call.
    pub read_chunk: usize,

    /// Command that ends the shell session.
    pub logout_command: String,

    /// Explicit success marker.
    pub success_marker: String,

    /// Explicit failure marker.
    pub failure_marker: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(15),
            grace: Duration::from_secs(5),
            quiescence: Duration::from_millis(100),
            settle: Duration::from_millis(1500),
            read_chunk: 1024,
            logout_command: "exit".to_string(),
            success_marker: SUCCESS_MARKER.to_string(),
            failure_marker: FAILURE_MARKER.to_string(),
        }
    }
}

impl SessionConfig {
    /// Set the login time budget.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the per-call connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the deadline grace period.
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Set the pre-read pause.
    pub fn quiescence(mut self, quiescence: Duration) -> Self {
        self.quiescence = quiescence;
        self
    }

    /// Set the post-logout pause.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the receive chunk size.
    pub fn read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = bytes.max(1);
        self
    }

    /// Set the logout command.
    pub fn logout_command(mut self, command: impl Into<String>) -> Self {
        self.logout_command = command.into();
        self
    }

    /// Set the explicit result markers.
    pub fn markers(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_marker = success.into();
        self.failure_marker = failure.into();
        self
    }

    /// Absolute deadline for a step bounded by `timeout`.
    pub fn deadline_for(&self, timeout: Duration) -> Duration {
        timeout + self.grace
    }

    /// Absolute deadline of the login step.
    pub fn login_deadline(&self) -> Duration {
        self.deadline_for(self.login_timeout)
    }

    /// Absolute deadline of a command round trip with the default timeout.
    pub fn command_deadline(&self) -> Duration {
        self.deadline_for(self.command_timeout)
    }
}
