use std::sync::Arc;

use crate::domain::{
    entities::Transaction,
    error::DomainError,
    repository::TransactionRepository,
    types::TransactionId,
    uow::{UnitOfWork, UowSession},
};

/// Caso de Uso: Consultar una transacción por su identificador.
pub struct GetTransactionUseCase {
    uow: Arc<dyn UnitOfWork>,
    transaction_repo: Arc<dyn TransactionRepository>,
}

impl GetTransactionUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, transaction_repo: Arc<dyn TransactionRepository>) -> Self {
        Self {
            uow,
            transaction_repo,
        }
    }

    #[tracing::instrument(name = "GetTransactionUseCase::execute", skip(self))]
    pub async fn execute(&self, transaction_id: &str) -> Result<Transaction, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), transaction_id).await {
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
        transaction_id: &str,
    ) -> Result<Transaction, DomainError> {
        let id = TransactionId::parse(transaction_id)?;
        self.transaction_repo
            .find_by_id(session, id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "transaction",
                id: transaction_id.to_string(),
            })
    }
}
