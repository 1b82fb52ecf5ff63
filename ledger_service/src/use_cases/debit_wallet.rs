use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    entities::{TransactionType, Wallet},
    error::DomainError,
    types::TransactionId,
};
use crate::use_cases::create_transaction::{CreateTransactionCommand, CreateTransactionUseCase};

#[derive(Debug, Clone)]
pub struct DebitWalletCommand {
    pub wallet_id: String,
    pub amount: String,
    pub idempotency_key: String,
    pub description: String,
    pub external_reference: Option<String>,
}

/// DTO compuesto que devuelve la operación de cargo.
#[derive(Debug, Clone)]
pub struct DebitWalletResult {
    pub wallet: Wallet,
    pub transaction_id: TransactionId,
    pub message: String,
}

/// Caso de Uso: Cargar contra una billetera.
///
/// Especialización delgada de `CreateTransactionUseCase` fijada al tipo
/// WITHDRAW; hereda idempotencia, atomicidad y eventos del caso de uso base.
pub struct DebitWalletUseCase {
    create_transaction: Arc<CreateTransactionUseCase>,
}

impl DebitWalletUseCase {
    pub fn new(create_transaction: Arc<CreateTransactionUseCase>) -> Self {
        Self { create_transaction }
    }

    #[tracing::instrument(name = "DebitWalletUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: DebitWalletCommand) -> Result<DebitWalletResult, DomainError> {
        let result = self
            .create_transaction
            .execute(CreateTransactionCommand {
                wallet_id: cmd.wallet_id,
                idempotency_key: cmd.idempotency_key,
                transaction_type: TransactionType::Withdraw,
                amount: cmd.amount,
                destination_wallet_id: None,
                description: cmd.description,
                external_reference: cmd.external_reference,
                metadata: HashMap::new(),
            })
            .await?;

        Ok(DebitWalletResult {
            transaction_id: result.transaction.id(),
            wallet: result.wallet,
            message: "wallet debited".to_string(),
        })
    }
}
