use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::error::DomainError;

/// Política de reintentos del llamador para errores transitorios.
///
/// Reintenta una operación completa mientras su error sea reintentable
/// (`DomainError::is_retryable`), con backoff exponencial acotado. El caso
/// típico es el conflicto de optimistic locking: la clave de idempotencia
/// garantiza que re-ejecutar el caso de uso no duplique efectos.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Valores recomendados: hasta 10 intentos, 10 ms inicial, factor 2,
    /// tope de 1 s.
    pub fn recommended() -> Self {
        Self::new(10, Duration::from_millis(10), Duration::from_secs(1))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::recommended()
    }
}
