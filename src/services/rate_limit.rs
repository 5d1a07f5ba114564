//! In-memory failed-login tracking for suspicious-activity detection.
//!
//! Process-lifetime state only: the window resets when the process restarts.
//! Constructed once at startup and injected into the auth service so the
//! policy is testable and replaceable.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::config::AuthThrottleConfig;

pub struct FailedAttemptTracker {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl FailedAttemptTracker {
    #[must_use]
    pub fn new(config: &AuthThrottleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts as usize,
            window: Duration::minutes(config.window_minutes),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this username has accumulated enough recent failures to count
    /// as suspicious. Stale attempts are pruned before counting.
    pub fn is_suspicious(&self, username: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut attempts = self.lock();

        match attempts.get_mut(&key(username)) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.max_attempts
            }
            None => false,
        }
    }

    /// Records one failed attempt at `now`.
    pub fn record_failure(&self, username: &str, now: DateTime<Utc>) {
        self.lock().entry(key(username)).or_default().push(now);
    }

    /// Drops all recorded failures for a username (successful login).
    pub fn clear(&self, username: &str) {
        self.lock().remove(&key(username));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<DateTime<Utc>>>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key(username: &str) -> String {
    username.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FailedAttemptTracker {
        FailedAttemptTracker::new(&AuthThrottleConfig {
            max_attempts: 3,
            window_minutes: 15,
        })
    }

    #[test]
    fn three_recent_failures_flag_suspicious() {
        let tracker = tracker();
        let now = Utc::now();

        for i in 0..3 {
            assert!(!tracker.is_suspicious("jdoe1234", now));
            tracker.record_failure("jdoe1234", now + Duration::seconds(i));
        }
        assert!(tracker.is_suspicious("jdoe1234", now + Duration::seconds(3)));
    }

    #[test]
    fn failures_outside_window_are_pruned() {
        let tracker = tracker();
        let start = Utc::now();

        for i in 0..3 {
            tracker.record_failure("jdoe1234", start + Duration::seconds(i));
        }
        assert!(tracker.is_suspicious("jdoe1234", start + Duration::minutes(1)));
        assert!(!tracker.is_suspicious("jdoe1234", start + Duration::minutes(16)));
    }

    #[test]
    fn clear_resets_the_count() {
        let tracker = tracker();
        let now = Utc::now();

        for _ in 0..3 {
            tracker.record_failure("jdoe1234", now);
        }
        tracker.clear("jdoe1234");
        assert!(!tracker.is_suspicious("jdoe1234", now));

        tracker.record_failure("jdoe1234", now);
        assert!(!tracker.is_suspicious("jdoe1234", now));
    }

    #[test]
    fn usernames_are_case_insensitive() {
        let tracker = tracker();
        let now = Utc::now();

        for _ in 0..3 {
            tracker.record_failure("JDoe1234", now);
        }
        assert!(tracker.is_suspicious("jdoe1234", now));
    }
}
