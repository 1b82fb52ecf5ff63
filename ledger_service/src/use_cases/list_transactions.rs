use std::sync::Arc;

use crate::domain::{
    entities::{Transaction, TransactionStatus, TransactionType},
    error::DomainError,
    repository::{Page, PageRequest, TransactionFilter, TransactionRepository},
    types::WalletId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone, Default)]
pub struct ListTransactionsQuery {
    pub wallet_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
    pub offset: i64,
    pub limit: i64,
}

/// Caso de Uso: Listado paginado de transacciones con filtros opcionales.
pub struct ListTransactionsUseCase {
    uow: Arc<dyn UnitOfWork>,
    transaction_repo: Arc<dyn TransactionRepository>,
}

impl ListTransactionsUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, transaction_repo: Arc<dyn TransactionRepository>) -> Self {
        Self {
            uow,
            transaction_repo,
        }
    }

    #[tracing::instrument(name = "ListTransactionsUseCase::execute", skip(self))]
    pub async fn execute(&self, query: ListTransactionsQuery) -> Result<Page<Transaction>, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), query).await {
            Ok(page) => {
                session.commit().await?;
                Ok(page)
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
        query: ListTransactionsQuery,
    ) -> Result<Page<Transaction>, DomainError> {
        let page = PageRequest::new(query.offset, query.limit)?;
        let wallet_id = match &query.wallet_id {
            Some(raw) => Some(WalletId::parse(raw)?),
            None => None,
        };
        let filter = TransactionFilter {
            wallet_id,
            status: query.status,
            transaction_type: query.transaction_type,
        };
        self.transaction_repo.list(session, filter, page).await
    }
}
