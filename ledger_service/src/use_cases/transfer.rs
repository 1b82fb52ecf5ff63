use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::domain::{
    entities::{Transaction, TransactionType, Wallet},
    error::DomainError,
    events::DomainEvent,
    money::Money,
    publisher::EventPublisher,
    repository::{TransactionRepository, WalletRepository},
    types::WalletId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub source_wallet_id: String,
    pub destination_wallet_id: String,
    pub amount: String,
    pub idempotency_key: String,
    pub description: String,
    pub external_reference: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TransferResult {
    pub transaction: Transaction,
    pub source_wallet: Wallet,
    pub destination_wallet: Wallet,
}

/// Caso de Uso: Transferir entre dos billeteras de la misma divisa.
///
/// Ambas actualizaciones de saldo comparten un único Unit-of-Work y por
/// tanto confirman juntas: no existe ningún estado intermedio observable en
/// el que el dinero haya salido de la origen sin entrar a la destino.
pub struct TransferUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl TransferUseCase {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        wallet_repo: Arc<dyn WalletRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            wallet_repo,
            transaction_repo,
            publisher,
        }
    }

    #[tracing::instrument(name = "TransferUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: TransferCommand) -> Result<TransferResult, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), cmd).await {
            Ok(result) => {
                session.commit().await?;
                Ok(result)
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
        cmd: TransferCommand,
    ) -> Result<TransferResult, DomainError> {
        // 1. Idempotency Check: la repetición devuelve la transferencia ya
        //    persistida, sin mover saldos ni emitir eventos.
        if let Some(existing) = self
            .transaction_repo
            .find_by_idempotency_key(session, &cmd.idempotency_key)
            .await?
        {
            info!(
                idempotency_key = %cmd.idempotency_key,
                transaction_id = %existing.id(),
                "idempotent replay, returning stored transfer"
            );
            let source = self.load_wallet(session, existing.wallet_id()).await?;
            let destination_id =
                existing
                    .destination_wallet_id()
                    .ok_or_else(|| DomainError::repository(
                        "stored transfer has no destination wallet",
                    ))?;
            let destination = self.load_wallet(session, destination_id).await?;
            return Ok(TransferResult {
                transaction: existing,
                source_wallet: source,
                destination_wallet: destination,
            });
        }

        // 2. Resolución y reglas estructurales de los extremos.
        let source_id = WalletId::parse(&cmd.source_wallet_id)?;
        let destination_id = WalletId::parse(&cmd.destination_wallet_id)?;
        if source_id == destination_id {
            return Err(DomainError::BusinessRuleViolation(
                "source and destination wallets must differ".to_string(),
            ));
        }

        let mut source = self.load_wallet(session, source_id).await?;
        let mut destination = self.load_wallet(session, destination_id).await?;
        if source.currency() != destination.currency() {
            return Err(DomainError::BusinessRuleViolation(format!(
                "cannot transfer between {} and {} wallets",
                source.currency(),
                destination.currency()
            )));
        }

        let amount = Money::parse(&cmd.amount, source.currency())?;

        // 3. Entidad TRANSFER con destino fijado desde el inicio.
        let mut transaction = Transaction::new(
            source_id,
            cmd.idempotency_key,
            TransactionType::Transfer,
            amount,
            Some(destination_id),
            cmd.description,
        )?;
        if let Some(reference) = cmd.external_reference {
            transaction.set_external_reference(reference)?;
        }
        for (key, value) in cmd.metadata {
            transaction.add_metadata(key, value)?;
        }

        // 4. Mover los fondos y completar la máquina de estados.
        transaction.start_processing()?;
        source.debit(amount)?;
        destination.credit(amount)?;
        transaction.mark_completed()?;

        // 5. Persistir los tres agregados y encolar los cuatro eventos.
        self.transaction_repo.save(session, &transaction).await?;
        self.wallet_repo.save(session, &source).await?;
        self.wallet_repo.save(session, &destination).await?;

        let events = vec![
            DomainEvent::TransactionCreated {
                transaction_id: transaction.id(),
                wallet_id: source_id,
                transaction_type: TransactionType::Transfer,
                amount,
                idempotency_key: transaction.idempotency_key().to_string(),
            },
            DomainEvent::WalletDebited {
                wallet_id: source_id,
                amount,
                transaction_id: transaction.id(),
                balance_after: source.available_balance(),
            },
            DomainEvent::WalletCredited {
                wallet_id: destination_id,
                amount,
                transaction_id: transaction.id(),
                balance_after: destination.available_balance(),
            },
            DomainEvent::TransactionCompleted {
                transaction_id: transaction.id(),
                wallet_id: source_id,
                completed_at: transaction.completed_at().unwrap_or_else(Utc::now),
            },
        ];
        self.publisher.publish_batch(session, events).await?;

        Ok(TransferResult {
            transaction,
            source_wallet: source,
            destination_wallet: destination,
        })
    }

    async fn load_wallet(
        &self,
        session: &mut dyn UowSession,
        wallet_id: WalletId,
    ) -> Result<Wallet, DomainError> {
        self.wallet_repo
            .find_by_id(session, wallet_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "wallet",
                id: wallet_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TransactionStatus;
    use crate::domain::money::Currency;
    use crate::domain::publisher::MockEventPublisher;
    use crate::domain::repository::{MockTransactionRepository, MockWalletRepository};
    use crate::domain::types::UserId;
    use crate::infrastructure::memory::MemoryUnitOfWork;

    fn wallet_with(currency: Currency, balance: &str) -> Wallet {
        let mut wallet = Wallet::new(
            UserId::new(),
            currency,
            Money::zero(currency),
            Money::zero(currency),
        )
        .unwrap();
        let amount = Money::parse(balance, currency).unwrap();
        if amount.is_positive() {
            wallet.credit(amount).unwrap();
        }
        wallet
    }

    fn command(source: &Wallet, destination: &Wallet, amount: &str, key: &str) -> TransferCommand {
        TransferCommand {
            source_wallet_id: source.id().to_string(),
            destination_wallet_id: destination.id().to_string(),
            amount: amount.to_string(),
            idempotency_key: key.to_string(),
            description: "move funds".to_string(),
            external_reference: None,
            metadata: HashMap::new(),
        }
    }

    fn use_case(
        wallets: MockWalletRepository,
        transactions: MockTransactionRepository,
        publisher: MockEventPublisher,
    ) -> TransferUseCase {
        TransferUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(wallets),
            Arc::new(transactions),
            Arc::new(publisher),
        )
    }

    #[tokio::test]
    async fn test_transfer_moves_exactly_the_amount() {
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_transactions = MockTransactionRepository::new();
        let mut mock_publisher = MockEventPublisher::new();

        let source = wallet_with(Currency::Usd, "1000.00");
        let destination = wallet_with(Currency::Usd, "500.00");
        let source_id = source.id();
        let destination_id = destination.id();
        let cmd = command(&source, &destination, "250.00", "k3");

        mock_transactions
            .expect_find_by_idempotency_key()
            .returning(|_, _| Ok(None));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == source_id)
            .times(1)
            .returning(move |_, _| Ok(Some(source.clone())));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == destination_id)
            .times(1)
            .returning(move |_, _| Ok(Some(destination.clone())));
        mock_transactions
            .expect_save()
            .withf(move |_, tx| {
                tx.status() == TransactionStatus::Completed
                    && tx.destination_wallet_id() == Some(destination_id)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mock_wallets
            .expect_save()
            .withf(move |_, w| {
                (w.id() == source_id && w.available_balance().to_string() == "750.00 USD")
                    || (w.id() == destination_id
                        && w.available_balance().to_string() == "750.00 USD")
            })
            .times(2)
            .returning(|_, _| Ok(()));
        mock_publisher
            .expect_publish_batch()
            .withf(|_, events| {
                events.len() == 4
                    && matches!(events[0], DomainEvent::TransactionCreated { .. })
                    && matches!(events[1], DomainEvent::WalletDebited { .. })
                    && matches!(events[2], DomainEvent::WalletCredited { .. })
                    && matches!(events[3], DomainEvent::TransactionCompleted { .. })
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(cmd)
            .await
            .unwrap();
        assert_eq!(
            result.source_wallet.available_balance(),
            Money::parse("750.00", Currency::Usd).unwrap()
        );
        assert_eq!(
            result.destination_wallet.available_balance(),
            Money::parse("750.00", Currency::Usd).unwrap()
        );
        assert_eq!(
            result.transaction.transaction_type(),
            TransactionType::Transfer
        );
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_wallets = MockWalletRepository::new();
        let mock_publisher = MockEventPublisher::new();

        mock_transactions
            .expect_find_by_idempotency_key()
            .returning(|_, _| Ok(None));

        let wallet = wallet_with(Currency::Usd, "100.00");
        let cmd = command(&wallet, &wallet, "10.00", "k4");
        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(cmd)
            .await;
        assert!(result.unwrap_err().is_business_rule_violation());
    }

    #[tokio::test]
    async fn test_cross_currency_transfer_rejected() {
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let source = wallet_with(Currency::Usd, "1000.00");
        let destination = wallet_with(Currency::Eur, "500.00");
        let source_id = source.id();
        let destination_id = destination.id();
        let cmd = command(&source, &destination, "250.00", "k5");

        mock_transactions
            .expect_find_by_idempotency_key()
            .returning(|_, _| Ok(None));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == source_id)
            .returning(move |_, _| Ok(Some(source.clone())));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == destination_id)
            .returning(move |_, _| Ok(Some(destination.clone())));
        // Ningún save ni publish debe ocurrir.

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(cmd)
            .await;
        assert!(result.unwrap_err().is_business_rule_violation());
    }

    #[tokio::test]
    async fn test_transfer_replay_returns_stored_transaction() {
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let source = wallet_with(Currency::Usd, "750.00");
        let destination = wallet_with(Currency::Usd, "750.00");
        let source_id = source.id();
        let destination_id = destination.id();

        let stored = Transaction::new(
            source_id,
            "k3".to_string(),
            TransactionType::Transfer,
            Money::parse("250.00", Currency::Usd).unwrap(),
            Some(destination_id),
            "move funds".to_string(),
        )
        .unwrap();
        let stored_id = stored.id();

        mock_transactions
            .expect_find_by_idempotency_key()
            .times(1)
            .returning(move |_, _| Ok(Some(stored.clone())));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == source_id)
            .returning(move |_, _| Ok(Some(source.clone())));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == destination_id)
            .returning(move |_, _| Ok(Some(destination.clone())));

        let cmd = TransferCommand {
            source_wallet_id: source_id.to_string(),
            destination_wallet_id: destination_id.to_string(),
            amount: "250.00".to_string(),
            idempotency_key: "k3".to_string(),
            description: "move funds".to_string(),
            external_reference: None,
            metadata: HashMap::new(),
        };
        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(cmd)
            .await
            .unwrap();
        assert_eq!(result.transaction.id(), stored_id);
    }

    #[tokio::test]
    async fn test_insufficient_source_funds_abort_the_transfer() {
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let source = wallet_with(Currency::Usd, "100.00");
        let destination = wallet_with(Currency::Usd, "0");
        let source_id = source.id();
        let destination_id = destination.id();
        let cmd = command(&source, &destination, "250.00", "k6");

        mock_transactions
            .expect_find_by_idempotency_key()
            .returning(|_, _| Ok(None));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == source_id)
            .returning(move |_, _| Ok(Some(source.clone())));
        mock_wallets
            .expect_find_by_id()
            .withf(move |_, id| *id == destination_id)
            .returning(move |_, _| Ok(Some(destination.clone())));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(cmd)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InsufficientBalance { .. })
        ));
    }
}
