use std::sync::Arc;
use tracing::info;

use chrono::Utc;

use crate::domain::{
    entities::{Transaction, TransactionStatus, Wallet},
    error::DomainError,
    events::DomainEvent,
    publisher::EventPublisher,
    repository::{TransactionRepository, WalletRepository},
    types::TransactionId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct ProcessTransactionCommand {
    pub transaction_id: String,
    pub success: bool,
    pub failure_reason: Option<String>,
}

/// Caso de Uso: Resolver una transacción cuyo resultado externo llega tarde.
///
/// Para flujos asíncronos: la transacción quedó PENDING/PROCESSING con el
/// saldo ya movido y aquí aterriza el veredicto del servicio externo. En
/// éxito se completa; en fallo se marca FAILED y se **compensa** la billetera
/// aplicando el efecto inverso del tipo exactamente una vez. Un fallo de la
/// compensación aborta el Unit-of-Work completo.
pub struct ProcessTransactionUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl ProcessTransactionUseCase {
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

    #[tracing::instrument(name = "ProcessTransactionUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: ProcessTransactionCommand) -> Result<Transaction, DomainError> {
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
        cmd: ProcessTransactionCommand,
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

        // Reprocesar una transacción ya completada es un no-op idempotente.
        if transaction.status() == TransactionStatus::Completed {
            info!(transaction_id = %transaction.id(), "already completed, nothing to process");
            return Ok(transaction);
        }
        if !matches!(
            transaction.status(),
            TransactionStatus::Pending | TransactionStatus::Processing
        ) {
            return Err(DomainError::InvalidStatusTransition {
                from: transaction.status().to_string(),
                to: if cmd.success {
                    TransactionStatus::Completed.to_string()
                } else {
                    TransactionStatus::Failed.to_string()
                },
            });
        }

        if transaction.status() == TransactionStatus::Pending {
            transaction.start_processing()?;
        }

        let event = if cmd.success {
            transaction.mark_completed()?;
            DomainEvent::TransactionCompleted {
                transaction_id: transaction.id(),
                wallet_id: transaction.wallet_id(),
                completed_at: transaction.completed_at().unwrap_or_else(Utc::now),
            }
        } else {
            let reason = cmd
                .failure_reason
                .unwrap_or_else(|| "external service error".to_string());
            transaction.mark_failed(reason.clone())?;

            // Compensación: revertir el efecto que la creación ya aplicó al
            // saldo. Si la compensación no puede aplicarse, el caso de uso
            // falla y nada de lo anterior queda persistido.
            let mut wallet = self.load_wallet(session, &transaction).await?;
            self.apply_inverse_effect(&transaction, &mut wallet)?;
            self.wallet_repo.save(session, &wallet).await?;

            DomainEvent::TransactionFailed {
                transaction_id: transaction.id(),
                wallet_id: transaction.wallet_id(),
                failure_reason: reason,
                is_retryable: transaction.retry_count() < Transaction::MAX_RETRIES,
            }
        };

        self.transaction_repo.save(session, &transaction).await?;
        self.publisher.publish(session, event).await?;

        Ok(transaction)
    }

    async fn load_wallet(
        &self,
        session: &mut dyn UowSession,
        transaction: &Transaction,
    ) -> Result<Wallet, DomainError> {
        self.wallet_repo
            .find_by_id(session, transaction.wallet_id())
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "wallet",
                id: transaction.wallet_id().to_string(),
            })
    }

    /// DEPOSIT/REFUND/ADJUSTMENT abonaron ⇒ se carga; WITHDRAW/PAYOUT/FEE
    /// cargaron ⇒ se abona. TRANSFER involucra dos billeteras y su reversa
    /// no está implementada.
    fn apply_inverse_effect(
        &self,
        transaction: &Transaction,
        wallet: &mut Wallet,
    ) -> Result<(), DomainError> {
        let amount = transaction.amount();
        if transaction.transaction_type().is_credit() {
            wallet.debit(amount)
        } else if transaction.transaction_type().is_debit() {
            wallet.credit(amount)
        } else {
            Err(DomainError::not_implemented(
                "compensating a transfer across two wallets is not supported",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TransactionType;
    use crate::domain::money::{Currency, Money};
    use crate::domain::publisher::MockEventPublisher;
    use crate::domain::repository::{MockTransactionRepository, MockWalletRepository};
    use crate::domain::types::UserId;
    use crate::infrastructure::memory::MemoryUnitOfWork;

    fn credited_wallet(balance: &str) -> Wallet {
        let mut wallet = Wallet::new(
            UserId::new(),
            Currency::Usd,
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
        )
        .unwrap();
        wallet
            .credit(Money::parse(balance, Currency::Usd).unwrap())
            .unwrap();
        wallet
    }

    fn pending_deposit(wallet: &Wallet, amount: &str) -> Transaction {
        Transaction::new(
            wallet.id(),
            "k-process".to_string(),
            TransactionType::Deposit,
            Money::parse(amount, Currency::Usd).unwrap(),
            None,
            "pending deposit".to_string(),
        )
        .unwrap()
    }

    fn use_case(
        wallets: MockWalletRepository,
        transactions: MockTransactionRepository,
        publisher: MockEventPublisher,
    ) -> ProcessTransactionUseCase {
        ProcessTransactionUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(wallets),
            Arc::new(transactions),
            Arc::new(publisher),
        )
    }

    #[tokio::test]
    async fn test_success_completes_the_transaction() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_wallets = MockWalletRepository::new();
        let mut mock_publisher = MockEventPublisher::new();

        let wallet = credited_wallet("1000.00");
        let tx = pending_deposit(&wallet, "250.00");
        let tx_id = tx.id();

        mock_transactions
            .expect_find_by_id()
            .times(1)
            .returning(move |_, _| Ok(Some(tx.clone())));
        mock_transactions
            .expect_save()
            .withf(|_, tx| tx.status() == TransactionStatus::Completed)
            .times(1)
            .returning(|_, _| Ok(()));
        mock_publisher
            .expect_publish()
            .withf(|_, event| matches!(event, DomainEvent::TransactionCompleted { .. }))
            .times(1)
            .returning(|_, _| Ok(()));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(ProcessTransactionCommand {
                transaction_id: tx_id.to_string(),
                success: true,
                failure_reason: None,
            })
            .await
            .unwrap();
        assert_eq!(result.status(), TransactionStatus::Completed);
        assert!(result.processed_at().is_some());
    }

    #[tokio::test]
    async fn test_failure_compensates_the_wallet_once() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_publisher = MockEventPublisher::new();

        // Escenario S6: el depósito de 250 ya abonó la billetera (1000.00).
        let wallet = credited_wallet("1000.00");
        let tx = pending_deposit(&wallet, "250.00");
        let tx_id = tx.id();

        mock_transactions
            .expect_find_by_id()
            .times(1)
            .returning(move |_, _| Ok(Some(tx.clone())));
        mock_wallets
            .expect_find_by_id()
            .times(1)
            .returning(move |_, _| Ok(Some(wallet.clone())));
        mock_wallets
            .expect_save()
            .withf(|_, w| w.available_balance().to_string() == "750.00 USD")
            .times(1)
            .returning(|_, _| Ok(()));
        mock_transactions
            .expect_save()
            .withf(|_, tx| {
                tx.status() == TransactionStatus::Failed
                    && tx.failure_reason() == Some("gateway")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mock_publisher
            .expect_publish()
            .withf(|_, event| {
                matches!(
                    event,
                    DomainEvent::TransactionFailed { failure_reason, is_retryable: true, .. }
                        if failure_reason == "gateway"
                )
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(ProcessTransactionCommand {
                transaction_id: tx_id.to_string(),
                success: false,
                failure_reason: Some("gateway".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(result.status(), TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_failure_reason_defaults_to_external_service_error() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_publisher = MockEventPublisher::new();

        let wallet = credited_wallet("500.00");
        let mut tx = pending_deposit(&wallet, "100.00");
        tx.start_processing().unwrap();
        let tx_id = tx.id();

        mock_transactions
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(tx.clone())));
        mock_wallets
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(wallet.clone())));
        mock_wallets.expect_save().returning(|_, _| Ok(()));
        mock_transactions
            .expect_save()
            .withf(|_, tx| tx.failure_reason() == Some("external service error"))
            .times(1)
            .returning(|_, _| Ok(()));
        mock_publisher.expect_publish().returning(|_, _| Ok(()));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(ProcessTransactionCommand {
                transaction_id: tx_id.to_string(),
                success: false,
                failure_reason: None,
            })
            .await
            .unwrap();
        assert_eq!(result.status(), TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_withdraw_failure_credits_back() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_publisher = MockEventPublisher::new();

        // El retiro de 100 ya había cargado la billetera hasta 400.
        let wallet = credited_wallet("400.00");
        let tx = Transaction::new(
            wallet.id(),
            "k-withdraw".to_string(),
            TransactionType::Withdraw,
            Money::parse("100.00", Currency::Usd).unwrap(),
            None,
            "cash out".to_string(),
        )
        .unwrap();
        let tx_id = tx.id();

        mock_transactions
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(tx.clone())));
        mock_wallets
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(wallet.clone())));
        mock_wallets
            .expect_save()
            .withf(|_, w| w.available_balance().to_string() == "500.00 USD")
            .times(1)
            .returning(|_, _| Ok(()));
        mock_transactions.expect_save().returning(|_, _| Ok(()));
        mock_publisher.expect_publish().returning(|_, _| Ok(()));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(ProcessTransactionCommand {
                transaction_id: tx_id.to_string(),
                success: false,
                failure_reason: Some("issuer declined".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(result.status(), TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_processing_a_completed_transaction_is_a_noop() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_wallets = MockWalletRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let wallet = credited_wallet("100.00");
        let mut tx = pending_deposit(&wallet, "10.00");
        tx.start_processing().unwrap();
        tx.mark_completed().unwrap();
        let tx_id = tx.id();

        mock_transactions
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(tx.clone())));
        // Sin save ni publish: el no-op no muta ni emite.

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(ProcessTransactionCommand {
                transaction_id: tx_id.to_string(),
                success: true,
                failure_reason: None,
            })
            .await
            .unwrap();
        assert_eq!(result.status(), TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_transaction_cannot_be_processed() {
        let mut mock_transactions = MockTransactionRepository::new();
        let mock_wallets = MockWalletRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let wallet = credited_wallet("100.00");
        let mut tx = pending_deposit(&wallet, "10.00");
        tx.cancel().unwrap();
        let tx_id = tx.id();

        mock_transactions
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(tx.clone())));

        let result = use_case(mock_wallets, mock_transactions, mock_publisher)
            .execute(ProcessTransactionCommand {
                transaction_id: tx_id.to_string(),
                success: true,
                failure_reason: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }
}
