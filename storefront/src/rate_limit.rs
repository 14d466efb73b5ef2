// storefront/src/rate_limit.rs

//! Fixed-window request limits for STK pushes: one window per phone number
//! plus one shared window. Counters live in this process only; a restart or a
//! second instance starts from zero.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entries untouched for this many windows are dropped by `sweep`.
const STALE_WINDOWS: u32 = 5;
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Allowed,
  /// Seconds until the blocking window resets, at least 1.
  Limited { retry_after: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Window {
  started: Instant,
  count: u32,
}

impl Window {
  fn fresh(now: Instant) -> Self {
    Self { started: now, count: 0 }
  }

  fn expired(&self, now: Instant, length: Duration) -> bool {
    now.saturating_duration_since(self.started) > length
  }

  fn retry_after(&self, now: Instant, length: Duration) -> u64 {
    let remaining = length.saturating_sub(now.saturating_duration_since(self.started));
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
  }
}

struct Windows {
  global: Window,
  per_phone: HashMap<String, Window>,
}

pub struct RateLimiter {
  config: RateLimitConfig,
  windows: Mutex<Windows>,
}

impl RateLimiter {
  pub fn new(config: RateLimitConfig) -> Self {
    Self {
      config,
      windows: Mutex::new(Windows {
        global: Window::fresh(Instant::now()),
        per_phone: HashMap::new(),
      }),
    }
  }

  pub fn check(&self, phone: &str) -> Decision {
    self.check_at(phone, Instant::now())
  }

  /// Counts one request for `phone` at `now`. The global window is checked
  /// first; a limited request does not use up quota in either window.
  pub fn check_at(&self, phone: &str, now: Instant) -> Decision {
    let window = self.config.window;
    let mut guard = self.windows.lock();
    let windows = &mut *guard;

    if windows.global.expired(now, window) {
      windows.global = Window::fresh(now);
    }
    if windows.global.count >= self.config.global {
      return Decision::Limited {
        retry_after: windows.global.retry_after(now, window),
      };
    }

    let entry = windows.per_phone.entry(phone.to_string()).or_insert_with(|| Window::fresh(now));
    if entry.expired(now, window) {
      *entry = Window::fresh(now);
    }
    if entry.count >= self.config.per_phone {
      return Decision::Limited {
        retry_after: entry.retry_after(now, window),
      };
    }

    entry.count += 1;
    windows.global.count += 1;
    Decision::Allowed
  }

  pub fn sweep(&self) -> usize {
    self.sweep_at(Instant::now())
  }

  /// Drops phone windows older than five window lengths; returns how many went.
  pub fn sweep_at(&self, now: Instant) -> usize {
    let stale_after = self.config.window * STALE_WINDOWS;
    let mut guard = self.windows.lock();
    let before = guard.per_phone.len();
    guard.per_phone.retain(|_, w| !w.expired(now, stale_after));
    before - guard.per_phone.len()
  }

  pub fn tracked_phones(&self) -> usize {
    self.windows.lock().per_phone.len()
  }
}
