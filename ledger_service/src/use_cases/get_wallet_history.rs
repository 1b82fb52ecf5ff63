use std::sync::Arc;

use crate::domain::{
    entities::Transaction,
    error::DomainError,
    repository::TransactionRepository,
    types::WalletId,
    uow::{UnitOfWork, UowSession},
};

/// Caso de Uso: Historial de movimientos de una billetera.
///
/// Incluye transacciones donde la billetera actúa como origen o destino,
/// de la más reciente a la más antigua.
pub struct GetWalletHistoryUseCase {
    uow: Arc<dyn UnitOfWork>,
    transaction_repo: Arc<dyn TransactionRepository>,
}

impl GetWalletHistoryUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, transaction_repo: Arc<dyn TransactionRepository>) -> Self {
        Self {
            uow,
            transaction_repo,
        }
    }

    #[tracing::instrument(name = "GetWalletHistoryUseCase::execute", skip(self))]
    pub async fn execute(&self, wallet_id: &str) -> Result<Vec<Transaction>, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), wallet_id).await {
            Ok(transactions) => {
                session.commit().await?;
                Ok(transactions)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }

    /// Solo los movimientos PENDING de la billetera (los que esperan el
    /// veredicto del servicio externo), del más antiguo al más reciente.
    #[tracing::instrument(name = "GetWalletHistoryUseCase::pending", skip(self))]
    pub async fn pending(&self, wallet_id: &str) -> Result<Vec<Transaction>, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run_pending(session.as_mut(), wallet_id).await {
            Ok(transactions) => {
                session.commit().await?;
                Ok(transactions)
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
        wallet_id: &str,
    ) -> Result<Vec<Transaction>, DomainError> {
        let id = WalletId::parse(wallet_id)?;
        self.transaction_repo.find_by_wallet_id(session, id).await
    }

    async fn run_pending(
        &self,
        session: &mut dyn UowSession,
        wallet_id: &str,
    ) -> Result<Vec<Transaction>, DomainError> {
        let id = WalletId::parse(wallet_id)?;
        self.transaction_repo
            .find_pending_by_wallet(session, id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TransactionType;
    use crate::domain::money::{Currency, Money};
    use crate::domain::repository::MockTransactionRepository;
    use crate::infrastructure::memory::MemoryUnitOfWork;

    #[tokio::test]
    async fn test_history_returns_wallet_transactions() {
        let mut mock_transactions = MockTransactionRepository::new();
        let wallet_id = WalletId::new();
        let tx = Transaction::new(
            wallet_id,
            "k".to_string(),
            TransactionType::Deposit,
            Money::parse("5", Currency::Usd).unwrap(),
            None,
            String::new(),
        )
        .unwrap();

        mock_transactions
            .expect_find_by_wallet_id()
            .withf(move |_, id| *id == wallet_id)
            .returning(move |_, _| Ok(vec![tx.clone()]));

        let use_case = GetWalletHistoryUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(mock_transactions),
        );
        let history = use_case.execute(&wallet_id.to_string()).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_view_uses_the_dedicated_lookup() {
        let mut mock_transactions = MockTransactionRepository::new();
        let wallet_id = WalletId::new();
        let tx = Transaction::new(
            wallet_id,
            "k-pending".to_string(),
            TransactionType::Deposit,
            Money::parse("5", Currency::Usd).unwrap(),
            None,
            String::new(),
        )
        .unwrap();

        mock_transactions
            .expect_find_pending_by_wallet()
            .withf(move |_, id| *id == wallet_id)
            .returning(move |_, _| Ok(vec![tx.clone()]));

        let use_case = GetWalletHistoryUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(mock_transactions),
        );
        let pending = use_case.pending(&wallet_id.to_string()).await.unwrap();
        assert_eq!(pending.len(), 1);
    }
}
