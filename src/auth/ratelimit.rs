//! Failed-login throttling
//!
//! Failures are counted per client IP inside a sliding window. Once an IP
//! reaches `max_failures` it is locked out for `block_duration`; a
//! successful login clears its history. Idle histories are swept while
//! recording failures, at most once per window.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Throttling thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Failures inside the window that trigger a lockout
    pub max_failures: u32,

    /// How long a locked-out IP stays locked
    pub block_duration: Duration,

    /// Width of the sliding failure window
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            block_duration: Duration::from_secs(300),
            window_duration: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Default)]
struct ClientHistory {
    failures: VecDeque<Instant>,
    locked_until: Option<Instant>,
}

impl ClientHistory {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if now.duration_since(*oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
        if matches!(self.locked_until, Some(until) if until <= now) {
            self.locked_until = None;
        }
    }

    fn is_idle(&self) -> bool {
        self.failures.is_empty() && self.locked_until.is_none()
    }
}

#[derive(Debug)]
struct LimiterState {
    clients: HashMap<IpAddr, ClientHistory>,
    last_sweep: Instant,
}

impl LimiterState {
    /// Drop histories with no live failures and no active lockout
    fn sweep(&mut self, now: Instant, window: Duration) {
        let before = self.clients.len();
        self.clients.retain(|_, history| {
            history.prune(now, window);
            !history.is_idle()
        });
        self.last_sweep = now;

        let dropped = before - self.clients.len();
        if dropped > 0 {
            tracing::debug!(dropped, tracked = self.clients.len(), "Swept idle login histories");
        }
    }
}

/// Per-IP failed-login limiter shared by all login scopes
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    // A poisoned lock only means another request panicked mid-update; the
    // map itself is still usable.
    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remaining lockout for the IP, or `None` if it may attempt a login
    pub fn lockout_remaining(&self, ip: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        let state = self.lock();
        state
            .clients
            .get(&ip)
            .and_then(|history| history.locked_until)
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.lockout_remaining(ip).is_some()
    }

    /// Record a failed attempt; returns `true` when the IP is now locked out
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let window = self.config.window_duration;
        let mut state = self.lock();
        if now.duration_since(state.last_sweep) >= window {
            state.sweep(now, window);
        }

        let history = state.clients.entry(ip).or_default();
        history.prune(now, window);

        if history.locked_until.is_some() {
            return true;
        }

        history.failures.push_back(now);
        if history.failures.len() as u32 >= self.config.max_failures {
            history.failures.clear();
            history.locked_until = Some(now + self.config.block_duration);
            return true;
        }
        false
    }

    /// Forget the IP's failures (after a successful login)
    pub fn reset(&self, ip: IpAddr) {
        self.lock().clients.remove(&ip);
    }

    /// Failures currently inside the window
    pub fn failure_count(&self, ip: IpAddr) -> u32 {
        let now = Instant::now();
        let mut state = self.lock();
        match state.clients.get_mut(&ip) {
            Some(history) => {
                history.prune(now, self.config.window_duration);
                history.failures.len() as u32
            }
            None => 0,
        }
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.lock().clients.len()
    }
}
