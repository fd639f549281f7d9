//! Circuit breaker for external service resilience (indexers, arrs, BitTorrent clients).
//!
//! States:
//! - Closed: normal operation, requests pass through.
//! - Open: service is failing, requests are rejected immediately.
//! - Half-Open: testing recovery, a single request is allowed through.

use crate::{CrossSeedError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Duration to wait before transitioning from Open to Half-Open.
    pub timeout: Duration,
    /// Successes required in Half-Open before closing the circuit.
    pub success_threshold: u32,
    /// Timeout for individual operations.
    pub request_timeout: Duration,
    /// Service name for logging and error reporting.
    pub service_name: String,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 1,
            request_timeout: Duration::from_secs(10),
            service_name: "unknown".to_string(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitBreakerState,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_failure_time: Option<Instant>,
    pub last_success_time: Option<Instant>,
    pub circuit_opened_time: Option<Instant>,
    pub service_name: String,
}

#[derive(Debug)]
struct CircuitBreakerInternalState {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_time: Option<Instant>,
    last_success_time: Option<Instant>,
    circuit_opened_time: Option<Instant>,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Arc<RwLock<CircuitBreakerInternalState>>,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    rejected_requests: AtomicU64,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(CircuitBreakerInternalState {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_time: None,
                last_success_time: None,
                circuit_opened_time: None,
            })),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
        }
    }

    /// Execute an operation protected by the circuit breaker.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, E>>,
        E: Into<CrossSeedError>,
    {
        if !self.can_proceed().await {
            self.rejected_requests.fetch_add(1, Ordering::Relaxed);
            return Err(CrossSeedError::CircuitBreakerOpen {
                service: self.config.service_name.clone(),
            });
        }

        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let start_time = Instant::now();
        let operation_result = tokio::time::timeout(self.config.request_timeout, operation).await;

        match operation_result {
            Ok(Ok(result)) => {
                self.on_success().await;
                debug!(
                    service = %self.config.service_name,
                    duration_ms = start_time.elapsed().as_millis(),
                    "circuit breaker: operation succeeded"
                );
                Ok(result)
            }
            Ok(Err(error)) => {
                let error = error.into();
                self.on_failure().await;
                error!(
                    service = %self.config.service_name,
                    error = %error,
                    "circuit breaker: operation failed"
                );
                Err(error)
            }
            Err(_) => {
                let timeout_error = CrossSeedError::Timeout {
                    operation: format!("{} request", self.config.service_name),
                    timeout_ms: self.config.request_timeout.as_millis() as u64,
                };
                self.on_failure().await;
                error!(
                    service = %self.config.service_name,
                    timeout_ms = self.config.request_timeout.as_millis(),
                    "circuit breaker: operation timed out"
                );
                Err(timeout_error)
            }
        }
    }

    async fn can_proceed(&self) -> bool {
        let state = self.state.read().await;

        match state.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                if let Some(opened_time) = state.circuit_opened_time {
                    if opened_time.elapsed() >= self.config.timeout {
                        drop(state);
                        self.transition_to_half_open().await;
                        true
                    } else {
                        false
                    }
                } else {
                    warn!(service = %self.config.service_name, "circuit is open but no opened time recorded");
                    true
                }
            }
        }
    }

    async fn on_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.write().await;
        state.last_success_time = Some(Instant::now());
        state.consecutive_failures = 0;

        match state.state {
            CircuitBreakerState::Closed => {}
            CircuitBreakerState::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    info!(service = %self.config.service_name, "circuit breaker: transitioning to CLOSED");
                    state.state = CircuitBreakerState::Closed;
                    state.consecutive_successes = 0;
                    state.circuit_opened_time = None;
                }
            }
            CircuitBreakerState::Open => {
                warn!(service = %self.config.service_name, "unexpected success while circuit is open");
            }
        }
    }

    async fn on_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.write().await;
        state.last_failure_time = Some(Instant::now());
        state.consecutive_successes = 0;

        match state.state {
            CircuitBreakerState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        service = %self.config.service_name,
                        failures = state.consecutive_failures,
                        "circuit breaker: transitioning to OPEN"
                    );
                    state.state = CircuitBreakerState::Open;
                    state.circuit_opened_time = Some(Instant::now());
                }
            }
            CircuitBreakerState::HalfOpen => {
                warn!(service = %self.config.service_name, "test request failed, returning to OPEN");
                state.state = CircuitBreakerState::Open;
                state.circuit_opened_time = Some(Instant::now());
                state.consecutive_failures += 1;
            }
            CircuitBreakerState::Open => {
                state.consecutive_failures += 1;
            }
        }
    }

    async fn transition_to_half_open(&self) {
        let mut state = self.state.write().await;
        if state.state == CircuitBreakerState::Open {
            info!(service = %self.config.service_name, "circuit breaker: transitioning to HALF_OPEN");
            state.state = CircuitBreakerState::HalfOpen;
            state.consecutive_successes = 0;
        }
    }

    pub async fn get_metrics(&self) -> CircuitBreakerMetrics {
        let state = self.state.read().await;

        CircuitBreakerMetrics {
            state: state.state,
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            last_failure_time: state.last_failure_time,
            last_success_time: state.last_success_time,
            circuit_opened_time: state.circuit_opened_time,
            service_name: self.config.service_name.clone(),
        }
    }

    pub async fn get_state(&self) -> CircuitBreakerState {
        self.state.read().await.state
    }

    pub async fn force_open(&self) {
        let mut state = self.state.write().await;
        warn!(service = %self.config.service_name, "circuit breaker: manually forced OPEN");
        state.state = CircuitBreakerState::Open;
        state.circuit_opened_time = Some(Instant::now());
    }

    pub async fn force_close(&self) {
        let mut state = self.state.write().await;
        info!(service = %self.config.service_name, "circuit breaker: manually forced CLOSED");
        state.state = CircuitBreakerState::Closed;
        state.consecutive_failures = 0;
        state.consecutive_successes = 0;
        state.circuit_opened_time = None;
    }

    pub async fn is_healthy(&self) -> bool {
        let metrics = self.get_metrics().await;

        if metrics.total_requests == 0 {
            return true;
        }
        if metrics.state == CircuitBreakerState::Open {
            return false;
        }

        let success_rate = metrics.successful_requests as f64 / metrics.total_requests as f64;
        success_rate >= 0.8 && metrics.consecutive_failures < self.config.failure_threshold / 2
    }
}
