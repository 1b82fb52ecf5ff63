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
pub struct CreateTransactionCommand {
    pub wallet_id: String,
    pub idempotency_key: String,
    pub transaction_type: TransactionType,
    pub amount: String,
    pub destination_wallet_id: Option<String>,
    pub description: String,
    pub external_reference: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Transacción confirmada junto con la billetera tal como quedó al cierre
/// de la misma frontera atómica.
#[derive(Debug, Clone)]
pub struct CreateTransactionResult {
    pub transaction: Transaction,
    pub wallet: Wallet,
}

/// Caso de uso central: crear y completar una transacción de una billetera.
///
/// Cubre los tipos de efecto directo (DEPOSIT/REFUND/ADJUSTMENT abonan,
/// WITHDRAW/PAYOUT/FEE cargan); TRANSFER se rechaza aquí y se atiende en el
/// caso de uso de transferencias. El camino es síncrono: la transacción se
/// conduce PENDING → PROCESSING → COMPLETED dentro del mismo Unit-of-Work.
pub struct CreateTransactionUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl CreateTransactionUseCase {
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

    #[tracing::instrument(name = "CreateTransactionUseCase::execute", skip(self))]
    pub async fn execute(
        &self,
        cmd: CreateTransactionCommand,
    ) -> Result<CreateTransactionResult, DomainError> {
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
        cmd: CreateTransactionCommand,
    ) -> Result<CreateTransactionResult, DomainError> {
        // 1. Idempotency Check: si la clave ya fue procesada devolvemos la
        //    transacción persistida sin re-ejecutar efectos ni emitir eventos.
        if let Some(existing) = self
            .transaction_repo
            .find_by_idempotency_key(session, &cmd.idempotency_key)
            .await?
        {
            info!(
                idempotency_key = %cmd.idempotency_key,
                transaction_id = %existing.id(),
                "idempotent replay, returning stored transaction"
            );
            let wallet = self.load_wallet(session, existing.wallet_id()).await?;
            return Ok(CreateTransactionResult {
                transaction: existing,
                wallet,
            });
        }

        // 2. Las transferencias tienen su propia orquestación de dos
        //    billeteras; este caso de uso no las acepta.
        if cmd.transaction_type == TransactionType::Transfer {
            return Err(DomainError::BusinessRuleViolation(
                "transfers must go through the transfer operation".to_string(),
            ));
        }

        // 3. Cargar la billetera y parsear el monto en su divisa.
        let wallet_id = WalletId::parse(&cmd.wallet_id)?;
        let mut wallet = self.load_wallet(session, wallet_id).await?;
        let amount = Money::parse(&cmd.amount, wallet.currency())?;
        let destination = match &cmd.destination_wallet_id {
            Some(raw) => Some(WalletId::parse(raw)?),
            None => None,
        };

        // 4. Construir la entidad y sus anotaciones mientras está PENDING.
        //    Un destino sobre un tipo que no es TRANSFER cae aquí.
        let mut transaction = Transaction::new(
            wallet_id,
            cmd.idempotency_key,
            cmd.transaction_type,
            amount,
            destination,
            cmd.description,
        )?;
        if let Some(reference) = cmd.external_reference {
            transaction.set_external_reference(reference)?;
        }
        for (key, value) in cmd.metadata {
            transaction.add_metadata(key, value)?;
        }

        // 5. Camino síncrono: aplicar el efecto sobre el saldo y conducir la
        //    máquina de estados hasta COMPLETED.
        transaction.start_processing()?;
        let balance_event = if cmd.transaction_type.is_credit() {
            wallet.credit(amount)?;
            DomainEvent::WalletCredited {
                wallet_id,
                amount,
                transaction_id: transaction.id(),
                balance_after: wallet.available_balance(),
            }
        } else {
            wallet.debit(amount)?;
            DomainEvent::WalletDebited {
                wallet_id,
                amount,
                transaction_id: transaction.id(),
                balance_after: wallet.available_balance(),
            }
        };
        transaction.mark_completed()?;

        // 6. Persistir ambos agregados y encolar los eventos dentro de la
        //    misma transacción de almacenamiento.
        self.transaction_repo.save(session, &transaction).await?;
        self.wallet_repo.save(session, &wallet).await?;

        let events = vec![
            DomainEvent::TransactionCreated {
                transaction_id: transaction.id(),
                wallet_id,
                transaction_type: transaction.transaction_type(),
                amount,
                idempotency_key: transaction.idempotency_key().to_string(),
            },
            balance_event,
            DomainEvent::TransactionCompleted {
                transaction_id: transaction.id(),
                wallet_id,
                completed_at: transaction.completed_at().unwrap_or_else(Utc::now),
            },
        ];
        self.publisher.publish_batch(session, events).await?;

        Ok(CreateTransactionResult {
            transaction,
            wallet,
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
