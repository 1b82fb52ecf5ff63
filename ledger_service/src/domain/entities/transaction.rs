use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::error::DomainError;
use crate::domain::money::Money;
use crate::domain::types::{TransactionId, WalletId};

/// Tipo de movimiento. La dirección del efecto sobre el saldo se deriva del
/// tipo: DEPOSIT/REFUND/ADJUSTMENT abonan, WITHDRAW/PAYOUT/FEE cargan y
/// TRANSFER mueve entre dos billeteras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Payout,
    Transfer,
    Fee,
    Refund,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
            Self::Payout => "PAYOUT",
            Self::Transfer => "TRANSFER",
            Self::Fee => "FEE",
            Self::Refund => "REFUND",
            Self::Adjustment => "ADJUSTMENT",
        }
    }

    /// ADJUSTMENT se trata siempre como abono (ver DESIGN.md).
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::Refund | Self::Adjustment)
    }

    pub fn is_debit(&self) -> bool {
        matches!(self, Self::Withdraw | Self::Payout | Self::Fee)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado del ciclo de vida. COMPLETED y CANCELLED son terminales; FAILED
/// solo sale de ahí mediante un retry explícito.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modelo de Entidad: Transaction.
/// Agregado que posee la máquina de estados de un movimiento, su clave de
/// idempotencia y el contador de reintentos.
///
/// # Examples
/// ```
/// use ledger_service::domain::entities::{Transaction, TransactionStatus, TransactionType};
/// use ledger_service::domain::money::{Currency, Money};
/// use ledger_service::domain::types::WalletId;
///
/// let mut tx = Transaction::new(
///     WalletId::new(),
///     "key-1".to_string(),
///     TransactionType::Deposit,
///     Money::parse("10.00", Currency::Usd).unwrap(),
///     None,
///     "top-up".to_string(),
/// )
/// .unwrap();
/// tx.start_processing().unwrap();
/// tx.mark_completed().unwrap();
/// assert_eq!(tx.status(), TransactionStatus::Completed);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    wallet_id: WalletId,
    idempotency_key: String, // Unique
    transaction_type: TransactionType,
    status: TransactionStatus,
    amount: Money,
    destination_wallet_id: Option<WalletId>, // Requerido sii TRANSFER
    external_reference: Option<String>,
    description: String,
    metadata: HashMap<String, String>,
    failure_reason: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Límite de reintentos para transacciones FAILED.
    pub const MAX_RETRIES: i32 = 3;

    pub fn new(
        wallet_id: WalletId,
        idempotency_key: String,
        transaction_type: TransactionType,
        amount: Money,
        destination_wallet_id: Option<WalletId>,
        description: String,
    ) -> Result<Self, DomainError> {
        if idempotency_key.trim().is_empty() {
            return Err(DomainError::Validation(
                "idempotency key cannot be empty".to_string(),
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::Validation(
                "transaction amount must be strictly positive".to_string(),
            ));
        }
        match (transaction_type, destination_wallet_id) {
            (TransactionType::Transfer, None) => {
                return Err(DomainError::Validation(
                    "transfer requires a destination wallet".to_string(),
                ));
            }
            (t, Some(_)) if t != TransactionType::Transfer => {
                return Err(DomainError::Validation(format!(
                    "destination wallet is only valid for transfers, got {t}"
                )));
            }
            _ => {}
        }

        let now = Utc::now();
        Ok(Self {
            id: TransactionId::new(),
            wallet_id,
            idempotency_key,
            transaction_type,
            status: TransactionStatus::Pending,
            amount,
            destination_wallet_id,
            external_reference: None,
            description,
            metadata: HashMap::new(),
            failure_reason: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            processed_at: None,
            completed_at: None,
        })
    }

    /// Reconstruye la entidad desde la persistencia re-validando los
    /// invariantes estructurales (monto positivo, clave, destino).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: TransactionId,
        wallet_id: WalletId,
        idempotency_key: String,
        transaction_type: TransactionType,
        status: TransactionStatus,
        amount: Money,
        destination_wallet_id: Option<WalletId>,
        external_reference: Option<String>,
        description: String,
        metadata: HashMap<String, String>,
        failure_reason: Option<String>,
        retry_count: i32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        processed_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        if idempotency_key.trim().is_empty() {
            return Err(DomainError::Validation(
                "idempotency key cannot be empty".to_string(),
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::Validation(
                "transaction amount must be strictly positive".to_string(),
            ));
        }
        if transaction_type == TransactionType::Transfer && destination_wallet_id.is_none() {
            return Err(DomainError::Validation(
                "transfer requires a destination wallet".to_string(),
            ));
        }
        if retry_count < 0 {
            return Err(DomainError::Validation(format!(
                "retry count cannot be negative: {retry_count}"
            )));
        }

        Ok(Self {
            id,
            wallet_id,
            idempotency_key,
            transaction_type,
            status,
            amount,
            destination_wallet_id,
            external_reference,
            description,
            metadata,
            failure_reason,
            retry_count,
            created_at,
            updated_at,
            processed_at,
            completed_at,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn transition_error(&self, to: TransactionStatus) -> DomainError {
        DomainError::InvalidStatusTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// PENDING → PROCESSING. Fija `processed_at`.
    pub fn start_processing(&mut self) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Pending {
            return Err(self.transition_error(TransactionStatus::Processing));
        }
        self.status = TransactionStatus::Processing;
        self.processed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// PROCESSING → COMPLETED. Fija `completed_at`.
    pub fn mark_completed(&mut self) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Processing {
            return Err(self.transition_error(TransactionStatus::Completed));
        }
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// PROCESSING → FAILED. Registra el motivo.
    pub fn mark_failed(&mut self, reason: String) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Processing {
            return Err(self.transition_error(TransactionStatus::Failed));
        }
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason);
        self.touch();
        Ok(())
    }

    /// {PENDING, PROCESSING} → CANCELLED. Fija `completed_at` como instante
    /// de cierre del ciclo de vida.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Processing
        ) {
            return Err(self.transition_error(TransactionStatus::Cancelled));
        }
        self.status = TransactionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// FAILED → PENDING, solo si quedan reintentos. Incrementa el contador y
    /// limpia el motivo de fallo anterior.
    pub fn retry(&mut self, max_retries: i32) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Failed {
            return Err(self.transition_error(TransactionStatus::Pending));
        }
        if self.retry_count >= max_retries {
            return Err(DomainError::BusinessRuleViolation(format!(
                "transaction {} exhausted its {max_retries} retries",
                self.id
            )));
        }
        self.status = TransactionStatus::Pending;
        self.retry_count += 1;
        self.failure_reason = None;
        self.touch();
        Ok(())
    }

    /// Solo sobre PENDING y solo para TRANSFER.
    pub fn set_destination_wallet(&mut self, destination: WalletId) -> Result<(), DomainError> {
        if self.status != TransactionStatus::Pending {
            return Err(DomainError::BusinessRuleViolation(format!(
                "destination can only change while PENDING, transaction is {}",
                self.status
            )));
        }
        if self.transaction_type != TransactionType::Transfer {
            return Err(DomainError::BusinessRuleViolation(format!(
                "destination wallet is only valid for transfers, got {}",
                self.transaction_type
            )));
        }
        self.destination_wallet_id = Some(destination);
        self.touch();
        Ok(())
    }

    fn ensure_open_for_annotation(&self, what: &str) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Processing
        ) {
            return Err(DomainError::BusinessRuleViolation(format!(
                "{what} can only change while PENDING or PROCESSING, transaction is {}",
                self.status
            )));
        }
        Ok(())
    }

    pub fn set_external_reference(&mut self, reference: String) -> Result<(), DomainError> {
        self.ensure_open_for_annotation("external reference")?;
        self.external_reference = Some(reference);
        self.touch();
        Ok(())
    }

    pub fn add_metadata(&mut self, key: String, value: String) -> Result<(), DomainError> {
        self.ensure_open_for_annotation("metadata")?;
        self.metadata.insert(key, value);
        self.touch();
        Ok(())
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn destination_wallet_id(&self) -> Option<WalletId> {
        self.destination_wallet_id
    }

    pub fn external_reference(&self) -> Option<&str> {
        self.external_reference.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn retry_count(&self) -> i32 {
        self.retry_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}
