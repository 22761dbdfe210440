use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::LockoutPolicy;
use crate::state::AppState;

/// Source of "now" for the tracker.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    pub remaining_secs: u64,
}

impl BlockStatus {
    pub const OPEN: BlockStatus = BlockStatus {
        blocked: false,
        remaining_secs: 0,
    };
}

/// Failure timestamps per key, not necessarily in order.
type Windows = HashMap<String, Vec<Instant>>;

/// Tracks failed logins by account identifier and by origin address.
///
/// A key is blocked once it holds `max_attempts` failures younger than
/// `block_time`. Stale failures are dropped lazily on every check and in
/// bulk by [`AttemptTracker::sweep`].
pub struct AttemptTracker {
    by_identifier: Windows,
    by_origin: Windows,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl AttemptTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        AttemptTracker {
            by_identifier: HashMap::new(),
            by_origin: HashMap::new(),
            policy,
            clock,
        }
    }

    pub fn is_blocked(&mut self, identifier: &str, origin: &str) -> BlockStatus {
        let now = self.clock.now();
        let block_time = self.policy.block_time;
        let by_identifier = prune_key(&mut self.by_identifier, identifier, now, block_time);
        let by_origin = prune_key(&mut self.by_origin, origin, now, block_time);

        let max = self.policy.max_attempts;
        if by_identifier.count < max && by_origin.count < max {
            return BlockStatus::OPEN;
        }

        // The longer of the two cooldowns wins.
        let remaining = by_identifier
            .remaining(now, block_time)
            .max(by_origin.remaining(now, block_time));
        BlockStatus {
            blocked: true,
            remaining_secs: remaining.as_secs(),
        }
    }

    pub fn add_attempt(&mut self, identifier: &str, origin: &str) {
        let now = self.clock.now();
        let identifier_count = record(&mut self.by_identifier, identifier, now, &self.policy);
        let origin_count = record(&mut self.by_origin, origin, now, &self.policy);

        if identifier_count == self.policy.max_attempts {
            tracing::warn!(
                "Login blocked for identifier {} after {} failures",
                identifier,
                identifier_count
            );
        }
        if origin_count == self.policy.max_attempts {
            tracing::warn!(
                "Login blocked for origin {} after {} failures",
                origin,
                origin_count
            );
        }
    }

    pub fn reset_attempts(&mut self, identifier: &str, origin: &str) {
        self.by_identifier.remove(identifier);
        self.by_origin.remove(origin);
    }

    /// Drops stale failures everywhere. Returns how many keys were removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let block_time = self.policy.block_time;
        prune_all(&mut self.by_identifier, now, block_time)
            + prune_all(&mut self.by_origin, now, block_time)
    }

    pub fn tracked_keys(&self) -> (usize, usize) {
        (self.by_identifier.len(), self.by_origin.len())
    }
}

struct WindowSummary {
    count: usize,
    oldest: Option<Instant>,
}

impl WindowSummary {
    fn remaining(&self, now: Instant, block_time: Duration) -> Duration {
        match self.oldest {
            Some(oldest) => block_time.saturating_sub(now.saturating_duration_since(oldest)),
            None => Duration::ZERO,
        }
    }
}

fn is_fresh(at: Instant, now: Instant, block_time: Duration) -> bool {
    now.saturating_duration_since(at) < block_time
}

fn prune_key(
    windows: &mut Windows,
    key: &str,
    now: Instant,
    block_time: Duration,
) -> WindowSummary {
    let Some(window) = windows.get_mut(key) else {
        return WindowSummary {
            count: 0,
            oldest: None,
        };
    };
    window.retain(|at| is_fresh(*at, now, block_time));
    let summary = WindowSummary {
        count: window.len(),
        oldest: window.iter().min().copied(),
    };
    if window.is_empty() {
        windows.remove(key);
    }
    summary
}

fn prune_all(windows: &mut Windows, now: Instant, block_time: Duration) -> usize {
    let before = windows.len();
    windows.retain(|_, window| {
        window.retain(|at| is_fresh(*at, now, block_time));
        !window.is_empty()
    });
    before - windows.len()
}

/// Appends `now` to the key's window and returns the window length, or 0
/// when the mapping is full of blocking keys and `key` was not tracked.
fn record(windows: &mut Windows, key: &str, now: Instant, policy: &LockoutPolicy) -> usize {
    if let Some(window) = windows.get_mut(key) {
        // Only drops records the next check would drop anyway.
        window.retain(|at| is_fresh(*at, now, policy.block_time));
        window.push(now);
        return window.len();
    }

    if windows.len() >= policy.max_tracked_keys && !make_room(windows, now, policy) {
        tracing::warn!("Attempt tracker full of blocked keys, not tracking {}", key);
        return 0;
    }
    windows.insert(key.to_string(), vec![now]);
    1
}

/// Drops stale windows in one pass. If the mapping is still full, evicts the
/// non-blocking window whose latest failure is oldest. Blocking windows are
/// never evicted; returns false when nothing could be freed.
fn make_room(windows: &mut Windows, now: Instant, policy: &LockoutPolicy) -> bool {
    let mut quietest: Option<(Instant, String)> = None;
    windows.retain(|key, window| {
        window.retain(|at| is_fresh(*at, now, policy.block_time));
        if window.is_empty() {
            return false;
        }
        if window.len() < policy.max_attempts {
            if let Some(latest) = window.iter().max().copied() {
                if quietest.as_ref().is_none_or(|(at, _)| latest < *at) {
                    quietest = Some((latest, key.clone()));
                }
            }
        }
        true
    });

    if windows.len() < policy.max_tracked_keys {
        return true;
    }
    match quietest {
        Some((_, key)) => {
            tracing::warn!("Attempt tracker at capacity, evicting {}", key);
            windows.remove(&key);
            true
        }
        None => false,
    }
}

pub fn spawn_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let mut tracker = state.login_tracker.lock().await;
            let removed = tracker.sweep();
            if removed > 0 {
                let (identifiers, origins) = tracker.tracked_keys();
                tracing::debug!(
                    "Swept {} stale keys ({} identifiers, {} origins still tracked)",
                    removed,
                    identifiers,
                    origins
                );
            }
        }
    })
}
