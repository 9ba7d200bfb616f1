//! Policy guard: scope checks and per-identity rate limiting.
//!
//! Write quotas and confirmation thresholds are per-turn state and live in
//! the agent loop, not here.

use slo_core::{Scope, ScopeSet, ToolError, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Guard rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("scope_denied:{needed}")]
    ScopeDenied { needed: Scope },

    #[error("rate_limited:{key}")]
    RateLimited { key: String },
}

impl From<GuardError> for ToolError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::ScopeDenied { needed } => ToolError::ScopeDenied {
                needed: needed.to_string(),
            },
            GuardError::RateLimited { .. } => ToolError::Unavailable(err.to_string()),
        }
    }
}

/// Fail with `ScopeDenied` unless `needed` was granted.
pub fn check_scope(scopes: &ScopeSet, needed: Scope) -> Result<(), GuardError> {
    if scopes.contains(needed) {
        Ok(())
    } else {
        Err(GuardError::ScopeDenied { needed })
    }
}

/// Rate-limit key for agent turns.
pub fn agent_rate_key(user_id: UserId) -> String {
    format!("agent:{user_id}")
}

type Bucket = Arc<Mutex<VecDeque<Instant>>>;

/// Checks between sweeps of idle buckets.
const SWEEP_EVERY: usize = 256;

/// Sliding-window rate limiter keyed by identity string.
///
/// The outer map lock is held only long enough to fetch a key's bucket, so
/// checks for different keys never contend on the same lock. Buckets with no
/// call inside the window are dropped every [`SWEEP_EVERY`] checks.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    checks: AtomicUsize,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one call for `key` if fewer than `max_calls` happened within the
    /// trailing `window`, recording it. Otherwise fail with `RateLimited`.
    pub fn check(&self, key: &str, max_calls: usize, window: Duration) -> Result<(), GuardError> {
        let now = Instant::now();
        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
                sweep(&mut buckets, now, window);
            }
            buckets.entry(key.to_string()).or_default().clone()
        };

        let mut stamps = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        while stamps
            .front()
            .is_some_and(|t| now.duration_since(*t) > window)
        {
            stamps.pop_front();
        }

        if stamps.len() >= max_calls {
            tracing::warn!(key, max_calls, window_secs = window.as_secs(), "Rate limit exceeded");
            return Err(GuardError::RateLimited { key: key.to_string() });
        }

        stamps.push_back(now);
        Ok(())
    }

    /// Calls currently counted against `key`.
    pub fn in_window(&self, key: &str, window: Duration) -> usize {
        let bucket = {
            let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            match buckets.get(key) {
                Some(b) => b.clone(),
                None => return 0,
            }
        };
        let now = Instant::now();
        let stamps = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        stamps
            .iter()
            .filter(|t| now.duration_since(**t) <= window)
            .count()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Drop buckets whose newest call fell out of `window`. Buckets locked by an
/// in-flight check are kept.
fn sweep(buckets: &mut HashMap<String, Bucket>, now: Instant, window: Duration) {
    buckets.retain(|_, bucket| match bucket.try_lock() {
        Ok(stamps) => stamps.back().is_some_and(|t| now.duration_since(*t) <= window),
        Err(_) => true,
    });
}

/// Resolves the scopes a user holds for a turn.
pub trait ScopeResolver: Send + Sync {
    fn resolve(&self, user_id: UserId) -> ScopeSet;
}

/// Grants every scope to every user.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullAccess;

impl ScopeResolver for FullAccess {
    fn resolve(&self, _user_id: UserId) -> ScopeSet {
        ScopeSet::all()
    }
}

/// Grants a fixed set to every user.
#[derive(Debug, Clone, Default)]
pub struct StaticScopes(pub ScopeSet);

impl ScopeResolver for StaticScopes {
    fn resolve(&self, _user_id: UserId) -> ScopeSet {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_present_passes() {
        let scopes: ScopeSet = [Scope::TasksRead].into_iter().collect();
        assert!(check_scope(&scopes, Scope::TasksRead).is_ok());
    }

    #[test]
    fn scope_absent_is_denied() {
        let scopes: ScopeSet = [Scope::TasksRead].into_iter().collect();
        let err = check_scope(&scopes, Scope::TasksWrite).unwrap_err();
        assert_eq!(err, GuardError::ScopeDenied { needed: Scope::TasksWrite });
        assert_eq!(err.to_string(), "scope_denied:tasks:write");
    }

    #[test]
    fn scope_denial_converts_to_tool_error() {
        let err: ToolError = GuardError::ScopeDenied { needed: Scope::NotesWrite }.into();
        assert!(matches!(err, ToolError::ScopeDenied { ref needed } if needed == "notes:write"));
    }

    #[test]
    fn agent_key_format() {
        assert_eq!(agent_rate_key(42), "agent:42");
    }

    #[tokio::test(start_paused = true)]
    async fn sixty_first_call_in_window_is_rejected() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        for _ in 0..60 {
            limiter.check("agent:1", 60, window).unwrap();
        }
        assert!(matches!(
            limiter.check("agent:1", 60, window),
            Err(GuardError::RateLimited { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        for _ in 0..60 {
            limiter.check("agent:1", 60, window).unwrap();
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("agent:1", 60, window).is_ok());
        assert_eq!(limiter.in_window("agent:1", window), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_call_of_three_is_rejected() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        for _ in 0..3 {
            limiter.check("agent:42", 3, window).unwrap();
        }
        let err = limiter.check("agent:42", 3, window).unwrap_err();
        assert_eq!(err, GuardError::RateLimited { key: "agent:42".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn call_exactly_window_old_still_counts() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        limiter.check("agent:42", 1, window).unwrap();
        tokio::time::advance(window).await;
        assert!(limiter.check("agent:42", 1, window).is_err());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.check("agent:42", 1, window).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_keys_are_swept() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        for user in 0..100 {
            limiter.check(&agent_rate_key(user), 60, window).unwrap();
        }
        assert_eq!(limiter.tracked_keys(), 100);

        tokio::time::advance(Duration::from_secs(61)).await;
        for _ in 0..SWEEP_EVERY {
            limiter.check("agent:active", 1_000, window).unwrap();
        }
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.in_window("agent:active", window), SWEEP_EVERY);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_calls_are_not_recorded() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(10);
        limiter.check("k", 1, window).unwrap();
        assert!(limiter.check("k", 1, window).is_err());
        assert!(limiter.check("k", 1, window).is_err());
        assert_eq!(limiter.in_window("k", window), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);
        limiter.check("agent:1", 1, window).unwrap();
        assert!(limiter.check("agent:1", 1, window).is_err());
        assert!(limiter.check("agent:2", 1, window).is_ok());
    }

    #[test]
    fn concurrent_checks_never_over_admit() {
        let limiter = Arc::new(RateLimiter::new());
        let window = Duration::from_secs(60);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.check("agent:9", 50, window).is_ok())
                        .count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn full_access_grants_everything() {
        let scopes = FullAccess.resolve(1);
        assert!(scopes.contains(Scope::CalendarWrite));
        assert!(scopes.contains(Scope::AnalyticsRead));
    }
}
