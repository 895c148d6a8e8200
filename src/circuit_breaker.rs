use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{CircuitBreaker, Config, StateMachine};
use std::future::Future;
use std::time::Duration;

use crate::errors::AppError;

/// Circuit breaker type shared by the third-party lookup services.
pub type LookupBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for a third-party lookup service.
///
/// # Configuration
///
/// - **Failure threshold**: 3 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, lookups are skipped.
/// - **HALF_OPEN**: Testing if service recovered.
pub fn create_lookup_circuit_breaker() -> LookupBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(3, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Runs `call` through `breaker`.
///
/// When the breaker is open the call is not started and `CircuitOpen` is
/// returned. `NotFound` answers mean the service is healthy and do not count
/// as failures.
pub async fn guarded<T, F>(breaker: &LookupBreaker, service: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    if !breaker.is_call_permitted() {
        tracing::debug!("{} circuit open, skipping call", service);
        return Err(AppError::CircuitOpen(service.to_string()));
    }

    let outcome = call.await;
    let is_failure = |e: &AppError| !matches!(e.root(), AppError::NotFound(_));

    match breaker.call_with(is_failure, move || outcome) {
        Ok(value) => Ok(value),
        Err(failsafe::Error::Inner(e)) => Err(e),
        Err(failsafe::Error::Rejected) => Err(AppError::CircuitOpen(service.to_string())),
    }
}
