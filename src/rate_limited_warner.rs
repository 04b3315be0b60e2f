use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default interval between dropped-record warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Helper that rate limits dropped-record warnings.
///
/// The caller increments the drop counter via [`record_drop`]. The next call to
/// [`warn_if_due`] emits a warning using the provided callback if the configured
/// interval has elapsed. [`flush`] emits a warning immediately if any records
/// have been dropped since the last emission.
///
/// [`record_drop`]: RateLimitedWarner::record_drop
/// [`warn_if_due`]: RateLimitedWarner::warn_if_due
/// [`flush`]: RateLimitedWarner::flush
pub struct RateLimitedWarner {
    interval_secs: u64,
    last_warn: AtomicU64,
    dropped: AtomicU64,
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

impl RateLimitedWarner {
    /// Create a new warner. The first warning can be emitted immediately.
    pub fn new(interval: Duration) -> Self {
        let interval_secs = interval.as_secs();
        Self {
            interval_secs,
            last_warn: AtomicU64::new(now_secs().saturating_sub(interval_secs)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Increment the dropped-record counter.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of drops recorded since the last warning.
    pub fn pending(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Emit a warning if the rate limit interval has elapsed.
    pub fn warn_if_due(&self, mut warn: impl FnMut(u64)) {
        let now = now_secs();
        let prev = self.last_warn.load(Ordering::Relaxed);
        if now.saturating_sub(prev) >= self.interval_secs {
            let count = self.dropped.swap(0, Ordering::Relaxed);
            if count > 0 {
                warn(count);
            }
            self.last_warn.store(now, Ordering::Relaxed);
        }
    }

    /// Immediately warn about any dropped records.
    pub fn flush(&self, mut warn: impl FnMut(u64)) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn.store(now_secs(), Ordering::Relaxed);
        }
    }
}
