use std::time::Duration;

/// Configuration for [`PoolClient`](super::PoolClient).
///
/// # Examples
///
/// ```
/// use extdata_fetch::PoolOptions;
/// use std::time::Duration;
///
/// let options = PoolOptions::new()
///     .stage_attempts(5)
///     .stage_retry_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Bound on each construction-time health check.
    ///
    /// Default: 5s
    pub health_timeout: Duration,

    /// Bound on each per-fetch staged-copy check, independent of the caller's
    /// own deadline. A server that does not answer in time counts as not
    /// having the object staged.
    ///
    /// Default: 3s
    pub staged_lookup_timeout: Duration,

    /// Total stage requests issued before giving up, including the first.
    ///
    /// Default: 3
    pub stage_attempts: u32,

    /// Fixed wait between stage attempts.
    ///
    /// Default: 1s
    pub stage_retry_delay: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            health_timeout:        Duration::from_secs(5),
            staged_lookup_timeout: Duration::from_secs(3),
            stage_attempts:        3,
            stage_retry_delay:     Duration::from_secs(1),
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self { Self::default() }

    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn staged_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.staged_lookup_timeout = timeout;
        self
    }

    pub fn stage_attempts(mut self, attempts: u32) -> Self {
        self.stage_attempts = attempts.max(1);
        self
    }

    pub fn stage_retry_delay(mut self, delay: Duration) -> Self {
        self.stage_retry_delay = delay;
        self
    }
}
