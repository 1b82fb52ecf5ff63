use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    entities::{TransactionType, Wallet},
    error::DomainError,
    types::TransactionId,
};
use crate::use_cases::create_transaction::{CreateTransactionCommand, CreateTransactionUseCase};

#[derive(Debug, Clone)]
pub struct CreditWalletCommand {
    pub wallet_id: String,
    pub amount: String,
    pub idempotency_key: String,
    pub description: String,
    pub external_reference: Option<String>,
}

/// DTO compuesto que devuelve la operación de abono.
#[derive(Debug, Clone)]
pub struct CreditWalletResult {
    pub wallet: Wallet,
    pub transaction_id: TransactionId,
    pub message: String,
}

/// Caso de Uso: Abonar a una billetera.
///
/// Especialización delgada de `CreateTransactionUseCase` fijada al tipo
/// DEPOSIT; hereda idempotencia, atomicidad y eventos del caso de uso base.
pub struct CreditWalletUseCase {
    create_transaction: Arc<CreateTransactionUseCase>,
}

impl CreditWalletUseCase {
    pub fn new(create_transaction: Arc<CreateTransactionUseCase>) -> Self {
        Self { create_transaction }
    }

    #[tracing::instrument(name = "CreditWalletUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: CreditWalletCommand) -> Result<CreditWalletResult, DomainError> {
        let result = self
            .create_transaction
            .execute(CreateTransactionCommand {
                wallet_id: cmd.wallet_id,
                idempotency_key: cmd.idempotency_key,
                transaction_type: TransactionType::Deposit,
                amount: cmd.amount,
                destination_wallet_id: None,
                description: cmd.description,
                external_reference: cmd.external_reference,
                metadata: HashMap::new(),
            })
            .await?;

        Ok(CreditWalletResult {
            transaction_id: result.transaction.id(),
            wallet: result.wallet,
            message: "wallet credited".to_string(),
        })
    }
}
