//! Three-state circuit breaker (`closed` / `open` / `half-open`), keyed
//! by service name in a process-wide registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub reset_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct Inner {
    state: CircuitState,
    failures: Vec<Instant>,
    successes_in_half_open: u32,
    opened_at: Option<Instant>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: Vec::new(),
            successes_in_half_open: 0,
            opened_at: None,
        }
    }
}

/// A single service's breaker. Cheaply cloneable; state lives behind an
/// `Arc<Mutex<_>>` so callers can share one instance across tasks.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    /// Whether a call should be let through right now. Transitions
    /// `open -> half-open` once `reset_timeout` has elapsed.
    pub async fn allow(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                if opened_at.elapsed() >= self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.successes_in_half_open = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failures.clear();
            }
            CircuitState::HalfOpen => {
                inner.successes_in_half_open += 1;
                if inner.successes_in_half_open >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures.clear();
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                let now = Instant::now();
                inner.failures.push(now);
                let window = self.config.failure_window;
                inner.failures.retain(|t| now.duration_since(*t) <= window);
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
            }
            CircuitState::Open => {}
        }
    }
}

/// Process-wide registry of breakers, one per service name, created
/// lazily on first lookup.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&self, service: &str, config: &CircuitBreakerConfig) -> CircuitBreaker {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| CircuitBreaker::new(config.clone()))
            .clone()
    }
}
