//! Bounded dispatch of remote recognition calls.
//!
//! OCR and vision calls are slow and may charge quota. They run on
//! spawned tasks behind a shared semaphore so a burst of requests cannot
//! exhaust the server, each call has its own deadline, and a caller that
//! goes away (client disconnect drops the handler future) cancels the
//! call instead of leaving it running. Calls are never retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use inkstone_core::error::CoreError;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Default number of remote calls allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Shared, cloneable dispatcher for remote calls.
#[derive(Debug, Clone)]
pub struct ExternalCallDispatcher {
    permits: Arc<Semaphore>,
}

impl ExternalCallDispatcher {
    /// Create a dispatcher allowing `concurrency` calls at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Run `call` on a spawned task once a permit is free.
    ///
    /// Fails with [`CoreError::Timeout`] if the call does not finish
    /// within `timeout` (time spent waiting for a permit not included).
    /// Dropping the returned future cancels the call and frees its permit.
    pub async fn dispatch<F, T>(
        &self,
        name: &'static str,
        timeout: Duration,
        call: F,
    ) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
        T: Send + 'static,
    {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal(format!("{name}: dispatcher is closed")))?;

        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    tracing::info!(call = name, "External call cancelled by caller");
                    Err(CoreError::Internal(format!("{name}: cancelled")))
                }
                result = tokio::time::timeout(timeout, call) => match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(call = name, timeout_secs = timeout.as_secs_f64(), "External call timed out");
                        Err(CoreError::Timeout(format!(
                            "{name} did not finish within {}s",
                            timeout.as_secs_f64()
                        )))
                    }
                },
            }
        });

        let joined = handle.await;
        guard.disarm();
        joined.map_err(|e| CoreError::Internal(format!("{name}: task failed: {e}")))?
    }
}

impl Default for ExternalCallDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
