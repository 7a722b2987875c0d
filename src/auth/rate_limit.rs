//! Sliding-window rate limiter keyed by client identity.
//!
//! One instance guards one group of routes. It lives in the router state, so
//! each test builds its own and `reset` wipes the history between runs.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window.max(Duration::from_secs(1)),
            hits: DashMap::new(),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request for `key`; `false` once the window is full
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        while entry
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.max_requests {
            return false;
        }
        entry.push_back(now);
        true
    }

    /// Forget every recorded request
    pub fn reset(&self) {
        self.hits.clear();
    }

    /// Drop clients with no requests inside the window
    pub fn purge_idle(&self) {
        let now = Instant::now();
        self.hits.retain(|_, times| {
            times
                .back()
                .is_some_and(|&t| now.saturating_duration_since(t) < self.window)
        });
    }
}
