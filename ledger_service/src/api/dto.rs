use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::entities::{
    Transaction, TransactionStatus, TransactionType, User, Wallet, WalletStatus,
};
use crate::domain::error::DomainError;
use crate::use_cases::create_transaction::CreateTransactionResult;
use crate::use_cases::credit_wallet::CreditWalletResult;
use crate::use_cases::debit_wallet::DebitWalletResult;
use crate::use_cases::transfer::TransferResult;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetKycStatusRequest {
    pub approved: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub user_id: Uuid,
    pub currency: String,
    pub daily_limit: Option<String>,
    pub monthly_limit: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletStatusRequest {
    pub status: WalletStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletLimitsRequest {
    pub daily_limit: String,
    pub monthly_limit: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationRequest {
    pub amount: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub description: String,
    pub external_reference: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub wallet_id: Uuid,
    pub idempotency_key: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: String,
    pub destination_wallet_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    pub external_reference: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub amount: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub description: String,
    pub external_reference: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTransactionRequest {
    pub success: bool,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransactionRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsParams {
    pub wallet_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListWalletsParams {
    pub user_id: Option<Uuid>,
    pub currency: Option<String>,
    pub status: Option<WalletStatus>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersParams {
    /// Si está presente, resuelve al usuario con ese correo exacto.
    pub email: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct UserWalletsParams {
    /// Si está presente, resuelve la única billetera en esa divisa.
    pub currency: Option<String>,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Coerción determinista del metadata de entrada a `map<string,string>`:
/// identidad para strings, cadena vacía para null y render JSON canónico
/// para el resto (números, booleanos, estructuras).
pub fn coerce_metadata(metadata: Option<HashMap<String, Value>>) -> HashMap<String, String> {
    metadata
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let coerced = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, coerced)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub kyc_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().0,
            username: user.username().to_string(),
            email: user.email().to_string(),
            kyc_status: user.kyc_status().as_str().to_string(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

/// Representación de una billetera en la frontera. Los montos se renderizan
/// como `"<decimal> <code>"` a la escala fija de la divisa.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency_code: String,
    pub wallet_type: String,
    pub status: String,
    pub available_balance: String,
    pub pending_balance: String,
    pub total_balance: String,
    pub daily_limit: String,
    pub monthly_limit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletResponse {
    pub fn from_wallet(wallet: &Wallet) -> Result<Self, DomainError> {
        Ok(Self {
            id: wallet.id().0,
            user_id: wallet.user_id().0,
            currency_code: wallet.currency().code().to_string(),
            wallet_type: wallet.wallet_type().as_str().to_string(),
            status: wallet.status().as_str().to_string(),
            available_balance: wallet.available_balance().to_string(),
            pending_balance: wallet.pending_balance().to_string(),
            total_balance: wallet.total_balance()?.to_string(),
            daily_limit: wallet.daily_limit().to_string(),
            monthly_limit: wallet.monthly_limit().to_string(),
            created_at: wallet.created_at(),
            updated_at: wallet.updated_at(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub idempotency_key: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub status: String,
    pub amount: String,
    pub currency_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_wallet_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    pub description: String,
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id().0,
            wallet_id: tx.wallet_id().0,
            idempotency_key: tx.idempotency_key().to_string(),
            transaction_type: tx.transaction_type().as_str().to_string(),
            status: tx.status().as_str().to_string(),
            amount: tx.amount().to_string(),
            currency_code: tx.amount().currency().code().to_string(),
            destination_wallet_id: tx.destination_wallet_id().map(|id| id.0),
            external_reference: tx.external_reference().map(str::to_string),
            description: tx.description().to_string(),
            metadata: tx.metadata().clone(),
            failure_reason: tx.failure_reason().map(str::to_string),
            retry_count: tx.retry_count(),
            created_at: tx.created_at(),
            updated_at: tx.updated_at(),
            processed_at: tx.processed_at(),
            completed_at: tx.completed_at(),
        }
    }
}

/// DTO compuesto de las operaciones de abono/cargo: snapshot de la
/// billetera, id de la transacción y mensaje.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationResponse {
    pub wallet: WalletResponse,
    pub transaction_id: Uuid,
    pub message: String,
}

impl WalletOperationResponse {
    pub fn from_credit(result: &CreditWalletResult) -> Result<Self, DomainError> {
        Ok(Self {
            wallet: WalletResponse::from_wallet(&result.wallet)?,
            transaction_id: result.transaction_id.0,
            message: result.message.clone(),
        })
    }

    pub fn from_debit(result: &DebitWalletResult) -> Result<Self, DomainError> {
        Ok(Self {
            wallet: WalletResponse::from_wallet(&result.wallet)?,
            transaction_id: result.transaction_id.0,
            message: result.message.clone(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionResponse {
    pub transaction: TransactionResponse,
    pub wallet: WalletResponse,
}

impl CreateTransactionResponse {
    pub fn from_result(result: &CreateTransactionResult) -> Result<Self, DomainError> {
        Ok(Self {
            transaction: TransactionResponse::from(&result.transaction),
            wallet: WalletResponse::from_wallet(&result.wallet)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transaction: TransactionResponse,
    pub source_wallet: WalletResponse,
    pub destination_wallet: WalletResponse,
}

impl TransferResponse {
    pub fn from_result(result: &TransferResult) -> Result<Self, DomainError> {
        Ok(Self {
            transaction: TransactionResponse::from(&result.transaction),
            source_wallet: WalletResponse::from_wallet(&result.source_wallet)?,
            destination_wallet: WalletResponse::from_wallet(&result.destination_wallet)?,
        })
    }
}

/// Página de resultados en la frontera. `totalCount` conserva la semántica
/// de tamaño de página devuelta (ver DESIGN.md).
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<T>,
    pub total_count: i64,
}
