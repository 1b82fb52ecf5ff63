use std::sync::Arc;

use crate::domain::{
    entities::Transaction,
    error::DomainError,
    events::DomainEvent,
    publisher::EventPublisher,
    repository::TransactionRepository,
    types::TransactionId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct RetryTransactionCommand {
    pub transaction_id: String,
}

/// Caso de Uso: Reintentar una transacción FAILED.
///
/// La entidad impone las reglas (solo FAILED, contador acotado); aquí se
/// reabre a PENDING y se re-publica `transaction.created` para que vuelva a
/// entrar al pipeline de procesamiento.
pub struct RetryTransactionUseCase {
    uow: Arc<dyn UnitOfWork>,
    transaction_repo: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl RetryTransactionUseCase {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        transaction_repo: Arc<dyn TransactionRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            transaction_repo,
            publisher,
        }
    }

    #[tracing::instrument(name = "RetryTransactionUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: RetryTransactionCommand) -> Result<Transaction, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), cmd).await {
            Ok(transaction) => {
                session.commit().await?;
                Ok(transaction)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        session: &mut dyn UowSession,
        cmd: RetryTransactionCommand,
    ) -> Result<Transaction, DomainError> {
        let transaction_id = TransactionId::parse(&cmd.transaction_id)?;
        let mut transaction = self
            .transaction_repo
            .find_by_id(session, transaction_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "transaction",
                id: cmd.transaction_id.clone(),
            })?;

        transaction.retry(Transaction::MAX_RETRIES)?;
        self.transaction_repo.save(session, &transaction).await?;

        self.publisher
            .publish(
                session,
                DomainEvent::TransactionCreated {
                    transaction_id: transaction.id(),
                    wallet_id: transaction.wallet_id(),
                    transaction_type: transaction.transaction_type(),
                    amount: transaction.amount(),
                    idempotency_key: transaction.idempotency_key().to_string(),
                },
            )
            .await?;

        Ok(transaction)
    }
}
