//! Fixed-window send-rate limiting per (user, conversation).
//!
//! Each key owns a [`RateWindow`] with a start time and an atomic counter.
//! A window is replaced (never incremented) once `start + window < now`.
//! Replacement happens under the map entry lock; the increment happens on
//! the shared counter after the lock is released.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use crate::types::{DbId, Timestamp};

/// Default number of SEND frames admitted per window.
pub const DEFAULT_MAX_MESSAGES: u32 = 30;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Limits applied by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_messages: u32,
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            window: DEFAULT_WINDOW,
        }
    }
}

/// One fixed window for a single key.
#[derive(Debug)]
pub struct RateWindow {
    window_start: Timestamp,
    count: AtomicU32,
}

impl RateWindow {
    fn new(window_start: Timestamp) -> Self {
        Self {
            window_start,
            count: AtomicU32::new(0),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    fn is_expired(&self, now: Timestamp, window: chrono::Duration) -> bool {
        self.window_start + window < now
    }
}

type RateKey = (DbId, DbId);

/// In-memory limiter shared by every connection task.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    window: chrono::Duration,
    windows: DashMap<RateKey, Arc<RateWindow>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        let window = chrono::Duration::from_std(settings.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_WINDOW.as_secs() as i64));
        Self {
            settings,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Admit one SEND for `(user_id, conversation_id)` at the current time.
    pub fn try_admit(&self, user_id: DbId, conversation_id: DbId) -> bool {
        self.try_admit_at(user_id, conversation_id, Utc::now())
    }

    /// Admit one SEND for `(user_id, conversation_id)` at `now`.
    ///
    /// Returns `true` iff the post-increment count of the current window is
    /// within `max_messages`. Denied attempts still count against the window.
    pub fn try_admit_at(&self, user_id: DbId, conversation_id: DbId, now: Timestamp) -> bool {
        let window = {
            let mut slot = self
                .windows
                .entry((user_id, conversation_id))
                .or_insert_with(|| Arc::new(RateWindow::new(now)));
            if slot.is_expired(now, self.window) {
                *slot = Arc::new(RateWindow::new(now));
            }
            Arc::clone(&slot)
        };

        let count = window.count.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        count <= self.settings.max_messages
    }

    /// Number of SENDs counted in the live window for a key (0 if none).
    pub fn current_count(&self, user_id: DbId, conversation_id: DbId) -> u32 {
        self.windows
            .get(&(user_id, conversation_id))
            .map(|w| w.count())
            .unwrap_or(0)
    }

    /// Number of tracked windows, live or stale.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Forget every window.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Drop windows that have already expired. Returns how many were removed.
    pub fn cleanup_expired_entries(&self) -> usize {
        self.cleanup_expired_entries_at(Utc::now())
    }

    pub fn cleanup_expired_entries_at(&self, now: Timestamp) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now, self.window));
        before.saturating_sub(self.windows.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::TimeZone;

    use super::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn admits_exactly_max_within_window() {
        let limiter = RateLimiter::default();
        for i in 0..30 {
            assert!(limiter.try_admit_at(7, 42, t0() + secs(i % 10)), "message {i}");
        }
        assert!(!limiter.try_admit_at(7, 42, t0() + secs(10)));
        assert_eq!(limiter.current_count(7, 42), 31);
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::default();
        for _ in 0..31 {
            limiter.try_admit_at(7, 42, t0());
        }
        assert!(!limiter.try_admit_at(7, 42, t0() + secs(59)));
        assert!(limiter.try_admit_at(7, 42, t0() + secs(61)));
        assert_eq!(limiter.current_count(7, 42), 1);
    }

    #[test]
    fn window_boundary_still_belongs_to_old_window() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_messages: 1,
            window: Duration::from_secs(60),
        });
        assert!(limiter.try_admit_at(1, 1, t0()));
        assert!(!limiter.try_admit_at(1, 1, t0() + secs(59)));
        assert!(!limiter.try_admit_at(1, 1, t0() + secs(60)));
        assert!(limiter.try_admit_at(
            1,
            1,
            t0() + secs(60) + chrono::Duration::nanoseconds(1)
        ));
    }

    #[test]
    fn full_window_rejects_at_exact_boundary() {
        let limiter = RateLimiter::default();
        for _ in 0..30 {
            assert!(limiter.try_admit_at(7, 42, t0()));
        }
        assert!(!limiter.try_admit_at(7, 42, t0() + secs(60)));
        assert_eq!(limiter.current_count(7, 42), 31);
    }

    #[test]
    fn cleanup_keeps_window_at_exact_boundary() {
        let limiter = RateLimiter::default();
        limiter.try_admit_at(1, 1, t0());
        assert_eq!(limiter.cleanup_expired_entries_at(t0() + secs(60)), 0);
        assert_eq!(limiter.cleanup_expired_entries_at(t0() + secs(61)), 1);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(RateLimitSettings {
            max_messages: 1,
            window: Duration::from_secs(60),
        });
        assert!(limiter.try_admit_at(1, 1, t0()));
        assert!(limiter.try_admit_at(1, 2, t0()));
        assert!(limiter.try_admit_at(2, 1, t0()));
        assert!(!limiter.try_admit_at(1, 1, t0()));
    }

    #[test]
    fn cleanup_removes_only_expired_windows() {
        let limiter = RateLimiter::default();
        limiter.try_admit_at(1, 1, t0());
        limiter.try_admit_at(2, 2, t0() + secs(30));
        assert_eq!(limiter.len(), 2);

        let removed = limiter.cleanup_expired_entries_at(t0() + secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.current_count(1, 1), 0);
        assert_eq!(limiter.current_count(2, 2), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let limiter = RateLimiter::default();
        limiter.try_admit_at(1, 1, t0());
        limiter.clear();
        assert!(limiter.is_empty());
    }

    #[test]
    fn concurrent_admissions_never_exceed_max() {
        let limiter = Arc::new(RateLimiter::default());
        let now = t0();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..20).filter(|_| limiter.try_admit_at(7, 42, now)).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 30);
        assert_eq!(limiter.current_count(7, 42), 160);
    }
}
