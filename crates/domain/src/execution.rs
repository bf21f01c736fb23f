//! Timeout and conflict retry around a single store call.

use std::future::Future;
use std::time::Instant;

use crate::config::CoordinatorConfig;
use crate::error::DomainError;

/// Runs `call` until it succeeds, fails with a non-conflict error, or
/// exhausts the retry budget, all within `config.operation_timeout`.
///
/// A store call abandoned by the timeout drops its open transaction, which
/// rolls back, so nothing is applied. The exception is a timeout that
/// fires while the commit itself is in flight: the server may already
/// have applied it, yet the caller still gets `Transient`. Re-read the
/// cart before retrying a timed-out `add`, or the units can be reserved
/// twice.
pub(crate) async fn run<T, F, Fut>(
    config: &CoordinatorConfig,
    operation: &'static str,
    mut call: F,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = store::Result<T>>,
{
    let started = Instant::now();

    let attempts = async {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(err) if err.is_conflict() && attempt < config.max_conflict_retries => {
                    attempt += 1;
                    metrics::counter!(
                        "reservation_conflict_retries_total",
                        "operation" => operation
                    )
                    .increment(1);
                    tracing::debug!(operation, attempt, error = %err, "retrying after conflict");
                    tokio::time::sleep(config.backoff_for(attempt)).await;
                }
                Err(err) if err.is_conflict() => {
                    tracing::warn!(operation, attempt, error = %err, "conflict retries exhausted");
                    return Err(DomainError::Transient(format!(
                        "{operation} kept conflicting after {attempt} retries: {err}"
                    )));
                }
                other => return other.map_err(DomainError::from),
            }
        }
    };

    let result = match tokio::time::timeout(config.operation_timeout, attempts).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = config.operation_timeout.as_millis() as u64,
                "store operation timed out"
            );
            Err(DomainError::Transient(format!(
                "{operation} timed out after {:?}",
                config.operation_timeout
            )))
        }
    };

    metrics::histogram!("store_operation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    result
}
