use std::sync::Arc;
use tracing::{error, info};

use crate::domain::entities::Transaction;
use crate::domain::repository::TransactionRepository;
use crate::domain::uow::UnitOfWork;
use crate::use_cases::retry_transaction::{RetryTransactionCommand, RetryTransactionUseCase};

/// Job en segundo plano que reabre transacciones FAILED con reintentos
/// disponibles.
///
/// Un fallo externo transitorio deja la transacción FAILED; este barrido la
/// devuelve a PENDING a través del caso de uso de retry (que re-publica
/// `transaction.created`), de modo que el pipeline la procese de nuevo.
pub struct RetryFailedTransactionsJob {
    uow: Arc<dyn UnitOfWork>,
    transaction_repo: Arc<dyn TransactionRepository>,
    retry_transaction: Arc<RetryTransactionUseCase>,
}

impl RetryFailedTransactionsJob {
    /// Candidatas por pasada.
    const BATCH_SIZE: i64 = 50;

    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        transaction_repo: Arc<dyn TransactionRepository>,
        retry_transaction: Arc<RetryTransactionUseCase>,
    ) -> Self {
        Self {
            uow,
            transaction_repo,
            retry_transaction,
        }
    }

    /// Ejecuta una pasada del barrido.
    pub async fn run(&self) {
        let candidates = match self.fetch_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("failed to fetch retryable transactions: {e}");
                return;
            }
        };

        if candidates.is_empty() {
            return;
        }
        info!("found {} retryable failed transactions", candidates.len());

        for transaction in candidates {
            match self
                .retry_transaction
                .execute(RetryTransactionCommand {
                    transaction_id: transaction.id().to_string(),
                })
                .await
            {
                Ok(reopened) => info!(
                    transaction_id = %reopened.id(),
                    retry_count = reopened.retry_count(),
                    "transaction reopened for retry"
                ),
                // Otro proceso pudo haberla reabierto o resuelto; seguimos
                // con el resto del lote.
                Err(e) => error!(
                    transaction_id = %transaction.id(),
                    "could not reopen transaction: {e}"
                ),
            }
        }
    }

    async fn fetch_candidates(
        &self,
    ) -> Result<Vec<Transaction>, crate::domain::error::DomainError> {
        let mut session = self.uow.begin().await?;
        let result = self
            .transaction_repo
            .find_failed_retryable(session.as_mut(), Transaction::MAX_RETRIES, Self::BATCH_SIZE)
            .await;
        match result {
            Ok(candidates) => {
                session.commit().await?;
                Ok(candidates)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }
}
