use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

use crate::domain::entities::{
    KycStatus, Transaction, TransactionStatus, TransactionType, User, Wallet, WalletStatus,
};
use crate::domain::error::DomainError;
use crate::domain::money::{Currency, Money};
use crate::domain::types::{TransactionId, UserId, WalletId};

// Modelo de Base de Datos para User (específico de SQLx).
// Representa la tabla 'users' en PostgreSQL.
#[derive(Debug, FromRow)]
pub struct UserModel {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserModel {
    fn from(u: &User) -> Self {
        Self {
            id: u.id(),
            username: u.username().to_string(),
            email: u.email().to_string(),
            kyc_status: u.kyc_status(),
            created_at: u.created_at(),
            updated_at: u.updated_at(),
        }
    }
}

// Conversión Modelo -> Dominio: reconstruye la entidad re-validando lo que
// pudiera haberse corrompido en la base de datos.
impl TryFrom<UserModel> for User {
    type Error = DomainError;

    fn try_from(m: UserModel) -> Result<Self, Self::Error> {
        User::reconstitute(
            m.id,
            m.username,
            m.email,
            m.kyc_status,
            m.created_at,
            m.updated_at,
        )
    }
}

// Modelo de Base de Datos para Wallet. La divisa se almacena como texto y se
// re-valida contra la lista blanca al reconstituir.
#[derive(Debug, FromRow)]
pub struct WalletModel {
    pub id: WalletId,
    pub user_id: UserId,
    pub currency: String,
    pub status: WalletStatus,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletModel {
    fn from(w: &Wallet) -> Self {
        Self {
            id: w.id(),
            user_id: w.user_id(),
            currency: w.currency().code().to_string(),
            status: w.status(),
            available_balance: w.available_balance().amount(),
            pending_balance: w.pending_balance().amount(),
            daily_limit: w.daily_limit().amount(),
            monthly_limit: w.monthly_limit().amount(),
            version: w.version(),
            created_at: w.created_at(),
            updated_at: w.updated_at(),
        }
    }
}

impl TryFrom<WalletModel> for Wallet {
    type Error = DomainError;

    fn try_from(m: WalletModel) -> Result<Self, Self::Error> {
        let currency = Currency::parse(&m.currency)?;
        Wallet::reconstitute(
            m.id,
            m.user_id,
            currency,
            m.status,
            Money::new(m.available_balance, currency)?,
            Money::new(m.pending_balance, currency)?,
            Money::new(m.daily_limit, currency)?,
            Money::new(m.monthly_limit, currency)?,
            m.version,
            m.created_at,
            m.updated_at,
        )
    }
}

// Modelo de Base de Datos para Transaction. El metadata viaja como JSONB.
#[derive(Debug, FromRow)]
pub struct TransactionModel {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub idempotency_key: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub destination_wallet_id: Option<WalletId>,
    pub external_reference: Option<String>,
    pub description: String,
    pub metadata: Json<HashMap<String, String>>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Transaction> for TransactionModel {
    fn from(t: &Transaction) -> Self {
        Self {
            id: t.id(),
            wallet_id: t.wallet_id(),
            idempotency_key: t.idempotency_key().to_string(),
            transaction_type: t.transaction_type(),
            status: t.status(),
            amount: t.amount().amount(),
            currency: t.amount().currency().code().to_string(),
            destination_wallet_id: t.destination_wallet_id(),
            external_reference: t.external_reference().map(str::to_string),
            description: t.description().to_string(),
            metadata: Json(t.metadata().clone()),
            failure_reason: t.failure_reason().map(str::to_string),
            retry_count: t.retry_count(),
            created_at: t.created_at(),
            updated_at: t.updated_at(),
            processed_at: t.processed_at(),
            completed_at: t.completed_at(),
        }
    }
}

impl TryFrom<TransactionModel> for Transaction {
    type Error = DomainError;

    fn try_from(m: TransactionModel) -> Result<Self, Self::Error> {
        let currency = Currency::parse(&m.currency)?;
        Transaction::reconstitute(
            m.id,
            m.wallet_id,
            m.idempotency_key,
            m.transaction_type,
            m.status,
            Money::new(m.amount, currency)?,
            m.destination_wallet_id,
            m.external_reference,
            m.description,
            m.metadata.0,
            m.failure_reason,
            m.retry_count,
            m.created_at,
            m.updated_at,
            m.processed_at,
            m.completed_at,
        )
    }
}
