use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Closed   - calls pass through, consecutive failures are counted
// Open     - calls are rejected until `reset_after` has elapsed
// HalfOpen - one trial call at a time; `success_threshold` successes close
//            the breaker, any failure reopens it
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 open, 2 half-open.
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_after: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_after: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    /// `trial` is when the in-flight trial was admitted.
    HalfOpen { successes: u32, trial: Option<Instant> },
}

impl Phase {
    fn state(&self) -> CircuitState {
        match self {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

type TransitionObserver = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "circuit breaker is open"),
            CircuitBreakerError::OperationFailed(e) => write!(f, "operation failed: {}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for CircuitBreakerError<E> {}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    phase: Arc<Mutex<Phase>>,
    observer: Option<TransitionObserver>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            phase: Arc::new(Mutex::new(Phase::Closed { failures: 0 })),
            observer: None,
        }
    }

    /// Invoke `observer(from, to)` on every state change.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state()
    }

    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match operation.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> bool {
        let mut phase = self.lock();
        let reset_after = self.config.reset_after;
        let (allowed, next) = match &mut *phase {
            Phase::Open { since } if since.elapsed() >= reset_after => (
                true,
                Some(Phase::HalfOpen {
                    successes: 0,
                    trial: Some(Instant::now()),
                }),
            ),
            Phase::Open { .. } => (false, None),
            Phase::Closed { .. } => (true, None),
            // A trial that never reported back (its future was dropped) is
            // given up after `reset_after`.
            Phase::HalfOpen { trial: Some(started), .. } if started.elapsed() < reset_after => {
                (false, None)
            }
            Phase::HalfOpen { trial, .. } => {
                *trial = Some(Instant::now());
                (true, None)
            }
        };

        if let Some(next) = next {
            self.transition(&mut phase, next);
        }
        allowed
    }

    fn record_success(&self) {
        let mut phase = self.lock();
        let next = match &mut *phase {
            Phase::Closed { failures } => {
                *failures = 0;
                None
            }
            Phase::HalfOpen { successes, trial } => {
                *successes += 1;
                *trial = None;
                (*successes >= self.config.success_threshold).then_some(Phase::Closed { failures: 0 })
            }
            // A call admitted before the breaker opened finished late.
            Phase::Open { .. } => None,
        };

        if let Some(next) = next {
            self.transition(&mut phase, next);
        }
    }

    fn record_failure(&self) {
        let mut phase = self.lock();
        let next = match &mut *phase {
            Phase::Closed { failures } => {
                *failures += 1;
                (*failures >= self.config.failure_threshold).then(|| Phase::Open { since: Instant::now() })
            }
            Phase::HalfOpen { .. } => Some(Phase::Open { since: Instant::now() }),
            Phase::Open { since } => {
                *since = Instant::now();
                None
            }
        };

        if let Some(next) = next {
            self.transition(&mut phase, next);
        }
    }

    fn transition(&self, phase: &mut Phase, next: Phase) {
        let from = phase.state();
        let to = next.state();
        *phase = next;

        if from != to {
            tracing::warn!(
                breaker = self.name,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker state changed"
            );
            if let Some(observer) = &self.observer {
                observer(from, to);
            }
        }
    }
}
