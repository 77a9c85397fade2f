//! Circuit breaker guarding one document store.
//!
//! Repeated failures trip the breaker so a dead store fails fast instead
//! of costing a full timeout per request. State is per source; breakers
//! never cross source boundaries.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Consecutive failures before the circuit opens
pub const FAILURE_THRESHOLD: u32 = 3;

/// How long an open circuit waits before admitting a probe request
pub const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Consecutive successes in half-open state before the circuit closes
pub const SUCCESS_THRESHOLD: u32 = 2;

/// Breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast, no requests pass
    Open,
    /// Probing whether the store recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Per-source circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
}

impl CircuitBreaker {
    /// Breaker with the default thresholds
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_thresholds(name, FAILURE_THRESHOLD, RECOVERY_TIMEOUT, SUCCESS_THRESHOLD)
    }

    /// Breaker with explicit thresholds
    pub fn with_thresholds(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        success_threshold: u32,
    ) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            failure_threshold,
            recovery_timeout,
            success_threshold,
        }
    }

    /// Gate a request: `Ok` admits it, `Err` fails fast without any
    /// network call. An open circuit whose recovery timeout elapsed
    /// transitions to half-open and admits the request as a probe.
    pub fn check(&mut self) -> Result<()> {
        if self.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = self.last_failure.map(|t| t.elapsed());
        match elapsed {
            Some(elapsed) if elapsed < self.recovery_timeout => {
                let remaining = self.recovery_timeout - elapsed;
                Err(Error::connection(format!(
                    "Circuit breaker open for '{}', retry in {:.1}s",
                    self.name,
                    remaining.as_secs_f64()
                )))
            },
            _ => {
                self.state = CircuitState::HalfOpen;
                self.success_count = 0;
                info!(source = %self.name, "Circuit breaker half-open, probing store");
                Ok(())
            },
        }
    }

    /// Record a successful request
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                    info!(source = %self.name, "Circuit breaker closed, store recovered");
                }
            },
            CircuitState::Closed => {
                self.failure_count = 0;
            },
            CircuitState::Open => {},
        }
    }

    /// Record a failed request
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure = Some(Instant::now());

        match self.state {
            // Any failure while probing reopens immediately.
            CircuitState::HalfOpen => self.open(),
            CircuitState::Closed => {
                if self.failure_count >= self.failure_threshold {
                    self.open();
                }
            },
            CircuitState::Open => {},
        }
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.state
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.success_count = 0;
        warn!(
            source = %self.name,
            failures = self.failure_count,
            recovery_secs = self.recovery_timeout.as_secs(),
            "Circuit breaker opened"
        );
    }
}
