use std::sync::Arc;
use tracing::info;

use crate::domain::{
    entities::{Transaction, TransactionStatus, TransactionType, Wallet},
    error::DomainError,
    events::DomainEvent,
    publisher::EventPublisher,
    repository::{TransactionRepository, WalletRepository},
    types::TransactionId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct CancelTransactionCommand {
    pub transaction_id: String,
    pub reason: String,
}

/// Caso de Uso: Cancelar una transacción abierta.
///
/// Cancelar algo ya cancelado es un no-op idempotente. Una transacción
/// COMPLETED no se cancela (corresponde un reembolso) y una FAILED tampoco
/// tiene nada que cancelar. Si estaba PROCESSING el saldo ya se movió, así
/// que se compensa con el efecto inverso; la reversa de una TRANSFER
/// (dos billeteras) no está implementada y devuelve un error explícito.
pub struct CancelTransactionUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl CancelTransactionUseCase {
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

    #[tracing::instrument(name = "CancelTransactionUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: CancelTransactionCommand) -> Result<Transaction, DomainError> {
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
        cmd: CancelTransactionCommand,
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

        if transaction.status() == TransactionStatus::Cancelled {
            info!(transaction_id = %transaction.id(), "already cancelled, nothing to do");
            return Ok(transaction);
        }
        if transaction.status() == TransactionStatus::Completed {
            return Err(DomainError::BusinessRuleViolation(
                "a completed transaction cannot be cancelled, issue a refund instead".to_string(),
            ));
        }

        info!(
            transaction_id = %transaction.id(),
            caller_reason = %cmd.reason,
            "cancelling transaction"
        );

        let was_processing = transaction.status() == TransactionStatus::Processing;
        transaction.cancel()?;

        // Si ya estaba PROCESSING el efecto sobre el saldo ocurrió: hay que
        // revertirlo dentro de esta misma frontera atómica.
        if was_processing {
            if transaction.transaction_type() == TransactionType::Transfer {
                return Err(DomainError::not_implemented(
                    "cancelling a processing transfer would need compensation on two wallets",
                ));
            }
            let mut wallet = self.load_wallet(session, &transaction).await?;
            let amount = transaction.amount();
            if transaction.transaction_type().is_credit() {
                wallet.debit(amount)?;
            } else {
                wallet.credit(amount)?;
            }
            self.wallet_repo.save(session, &wallet).await?;
        }

        self.transaction_repo.save(session, &transaction).await?;
        self.publisher
            .publish(
                session,
                DomainEvent::TransactionFailed {
                    transaction_id: transaction.id(),
                    wallet_id: transaction.wallet_id(),
                    failure_reason: "transaction cancelled".to_string(),
                    is_retryable: false,
                },
            )
            .await?;

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
}
