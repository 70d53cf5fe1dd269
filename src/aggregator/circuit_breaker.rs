//! Per-operation circuit breaker for the remote source

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,   // Normal operation
    Open,     // Failing, reject requests
    HalfOpen, // One trial request allowed through
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    failure_count: usize,
    opened_at: Option<Instant>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            opened_at: None,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Tracks consecutive failures per operation name
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    breakers: DashMap<String, BreakerEntry>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Whether calls for `operation` should be rejected right now
    ///
    /// An open breaker past its reset timeout moves to half-open and lets
    /// the caller through.
    pub fn is_open(&self, operation: &str) -> bool {
        let Some(mut entry) = self.breakers.get_mut(operation) else {
            return false;
        };

        match (entry.state, entry.opened_at) {
            (BreakerState::Open, Some(opened_at))
                if opened_at.elapsed() >= self.config.reset_timeout =>
            {
                entry.state = BreakerState::HalfOpen;
                false
            }
            (BreakerState::Open, _) => true,
            _ => false,
        }
    }

    pub fn mark_success(&self, operation: &str) {
        self.breakers.remove(operation);
    }

    pub fn mark_failure(&self, operation: &str) {
        let mut entry = self.breakers.entry(operation.to_string()).or_default();
        entry.failure_count += 1;

        // A failed half-open trial reopens immediately
        if entry.state == BreakerState::HalfOpen
            || entry.failure_count >= self.config.failure_threshold
        {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, operation: &str) -> BreakerState {
        self.breakers
            .get(operation)
            .map(|entry| entry.state)
            .unwrap_or(BreakerState::Closed)
    }

    pub fn failure_count(&self, operation: &str) -> usize {
        self.breakers
            .get(operation)
            .map(|entry| entry.failure_count)
            .unwrap_or(0)
    }

    pub fn reset_all(&self) {
        self.breakers.clear();
    }
}
