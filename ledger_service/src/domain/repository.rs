use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::entities::{
    Transaction, TransactionStatus, TransactionType, User, Wallet, WalletStatus,
};
use crate::domain::error::DomainError;
use crate::domain::money::Currency;
use crate::domain::types::{TransactionId, UserId, WalletId};
use crate::domain::uow::UowSession;

/// Ventana de paginación validada en la frontera: offset ≥ 0, límite 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    offset: i64,
    limit: i64,
}

impl PageRequest {
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(offset: i64, limit: i64) -> Result<Self, DomainError> {
        if offset < 0 {
            return Err(DomainError::Validation(format!(
                "offset cannot be negative: {offset}"
            )));
        }
        if !(1..=Self::MAX_LIMIT).contains(&limit) {
            return Err(DomainError::Validation(format!(
                "limit must be between 1 and {}: {limit}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { offset, limit })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

/// Página de resultados. `total_count` es el tamaño de la página devuelta,
/// no la cardinalidad del filtro completo (decisión registrada en DESIGN.md).
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total_count = items.len() as i64;
        Self { items, total_count }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalletFilter {
    pub user_id: Option<UserId>,
    pub currency: Option<Currency>,
    pub status: Option<WalletStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransactionFilter {
    pub wallet_id: Option<WalletId>,
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
}

// Interface (Port) for User persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        id: UserId,
    ) -> Result<Option<User>, DomainError>;

    async fn find_by_email<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        email: &str,
    ) -> Result<Option<User>, DomainError>;

    async fn exists_by_email<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        email: &str,
    ) -> Result<bool, DomainError>;

    async fn save<'a>(&self, session: &'a mut (dyn UowSession + 'a), user: &User) -> Result<(), DomainError>;

    async fn list<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        page: PageRequest,
    ) -> Result<Page<User>, DomainError>;
}

// Interface (Port) for Wallet persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn find_by_id<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        id: WalletId,
    ) -> Result<Option<Wallet>, DomainError>;

    async fn find_by_user_and_currency<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        user_id: UserId,
        currency: Currency,
    ) -> Result<Option<Wallet>, DomainError>;

    async fn find_by_user_id<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        user_id: UserId,
    ) -> Result<Vec<Wallet>, DomainError>;

    async fn exists_by_user_and_currency<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        user_id: UserId,
        currency: Currency,
    ) -> Result<bool, DomainError>;

    async fn list<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        filter: WalletFilter,
        page: PageRequest,
    ) -> Result<Page<Wallet>, DomainError>;

    /// Persiste el agregado con chequeo de optimistic locking: si la versión
    /// en disco difiere de la versión cargada, falla con `Concurrency` y el
    /// Unit-of-Work que la envuelve revierte.
    async fn save<'a>(&self, session: &'a mut (dyn UowSession + 'a), wallet: &Wallet)
        -> Result<(), DomainError>;
}

// Interface (Port) for Transaction persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        id: TransactionId,
    ) -> Result<Option<Transaction>, DomainError>;

    /// Cabeza de todo caso de uso de escritura: permite devolver la
    /// transacción ya persistida cuando la clave de idempotencia se repite.
    async fn find_by_idempotency_key<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        idempotency_key: &str,
    ) -> Result<Option<Transaction>, DomainError>;

    async fn find_by_wallet_id<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, DomainError>;

    async fn find_pending_by_wallet<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, DomainError>;

    async fn find_failed_retryable<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<Transaction>, DomainError>;

    async fn list<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        filter: TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, DomainError>;

    async fn save<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        transaction: &Transaction,
    ) -> Result<(), DomainError>;
}
