//! Backend en memoria del Unit-of-Work y sus repositorios.
//!
//! Implementación completa de los puertos de persistencia y publicación
//! sobre un `MemoryStore` compartido, con la misma semántica observable que
//! el backend de PostgreSQL: chequeo de versión en `save`, unicidad de la
//! clave de idempotencia y escrituras que solo se aplican al confirmar la
//! sesión. Útil para los tests de escenario y para levantar el servicio sin
//! base de datos.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::entities::{Transaction, TransactionStatus, User, Wallet};
use crate::domain::error::DomainError;
use crate::domain::events::{DomainEvent, EventEnvelope};
use crate::domain::money::Currency;
use crate::domain::publisher::EventPublisher;
use crate::domain::repository::{
    Page, PageRequest, TransactionFilter, TransactionRepository, UserRepository, WalletFilter,
    WalletRepository,
};
use crate::domain::types::{TransactionId, UserId, WalletId};
use crate::domain::uow::{UnitOfWork, UowSession};

/// Estado confirmado. Los campos son públicos para que los tests puedan
/// sembrar y auditar escenarios directamente.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub users: HashMap<UserId, User>,
    pub wallets: HashMap<WalletId, Wallet>,
    pub transactions: HashMap<TransactionId, Transaction>,
    pub events: Vec<EventEnvelope>,
}

/// Unit-of-Work sobre un `MemoryStore` compartido.
pub struct MemoryUnitOfWork {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(MemoryStore::default())),
        }
    }

    /// Handle al estado confirmado, para sembrar datos e inspeccionar
    /// resultados desde los tests.
    pub fn store(&self) -> Arc<Mutex<MemoryStore>> {
        Arc::clone(&self.store)
    }
}

impl Default for MemoryUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn UowSession>, DomainError> {
        Ok(Box::new(MemorySession {
            store: Arc::clone(&self.store),
            staged_users: Vec::new(),
            staged_wallets: Vec::new(),
            staged_transactions: Vec::new(),
            staged_events: Vec::new(),
        }))
    }
}

/// Sesión con write-staging: las escrituras se acumulan y solo tocan el
/// `MemoryStore` en `commit`. Descartar la sesión sin confirmar (incluido un
/// panic del cuerpo del caso de uso) no deja ningún efecto.
pub struct MemorySession {
    store: Arc<Mutex<MemoryStore>>,
    staged_users: Vec<User>,
    staged_wallets: Vec<Wallet>,
    staged_transactions: Vec<Transaction>,
    staged_events: Vec<EventEnvelope>,
}

#[async_trait]
impl UowSession for MemorySession {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let MemorySession {
            store,
            staged_users,
            staged_wallets,
            staged_transactions,
            staged_events,
        } = *self;
        let mut store = lock(&store)?;
        for user in staged_users {
            store.users.insert(user.id(), user);
        }
        for wallet in staged_wallets {
            store.wallets.insert(wallet.id(), wallet);
        }
        for transaction in staged_transactions {
            store.transactions.insert(transaction.id(), transaction);
        }
        store.events.extend(staged_events);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

fn lock(store: &Arc<Mutex<MemoryStore>>) -> Result<std::sync::MutexGuard<'_, MemoryStore>, DomainError> {
    store
        .lock()
        .map_err(|_| DomainError::repository("memory store lock poisoned"))
}

fn memory_session<'a>(
    session: &'a mut dyn UowSession,
) -> Result<&'a mut MemorySession, DomainError> {
    session
        .as_any_mut()
        .downcast_mut::<MemorySession>()
        .ok_or_else(|| {
            DomainError::repository("unit-of-work session does not belong to the memory backend")
        })
}

fn paginate<T>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let offset = page.offset() as usize;
    let limit = page.limit() as usize;
    if offset >= items.len() {
        return Page::new(Vec::new());
    }
    let items: Vec<T> = items.drain(offset..).take(limit).collect();
    Page::new(items)
}

/// Repositorio de usuarios en memoria. Sin estado propio: participa en la
/// transacción exclusivamente a través de la sesión recibida.
pub struct MemoryUserRepository;

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self
    }

    fn effective_users(session: &mut MemorySession) -> Result<Vec<User>, DomainError> {
        let mut by_id: HashMap<UserId, User> = lock(&session.store)?.users.clone();
        for staged in &session.staged_users {
            by_id.insert(staged.id(), staged.clone());
        }
        Ok(by_id.into_values().collect())
    }
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(
        &self,
        session: &mut dyn UowSession,
        id: UserId,
    ) -> Result<Option<User>, DomainError> {
        let session = memory_session(session)?;
        Ok(Self::effective_users(session)?
            .into_iter()
            .find(|u| u.id() == id))
    }

    async fn find_by_email(
        &self,
        session: &mut dyn UowSession,
        email: &str,
    ) -> Result<Option<User>, DomainError> {
        let session = memory_session(session)?;
        Ok(Self::effective_users(session)?
            .into_iter()
            .find(|u| u.email() == email))
    }

    async fn exists_by_email(
        &self,
        session: &mut dyn UowSession,
        email: &str,
    ) -> Result<bool, DomainError> {
        Ok(self.find_by_email(session, email).await?.is_some())
    }

    async fn save(&self, session: &mut dyn UowSession, user: &User) -> Result<(), DomainError> {
        let session = memory_session(session)?;
        session.staged_users.push(user.clone());
        Ok(())
    }

    async fn list(
        &self,
        session: &mut dyn UowSession,
        page: PageRequest,
    ) -> Result<Page<User>, DomainError> {
        let session = memory_session(session)?;
        let mut users = Self::effective_users(session)?;
        users.sort_by_key(|u| u.created_at());
        Ok(paginate(users, page))
    }
}

/// Repositorio de billeteras en memoria con optimistic locking real: el
/// `save` compara contra la versión confirmada y falla con `Concurrency`
/// ante una versión obsoleta, igual que el UPDATE condicionado de Postgres.
pub struct MemoryWalletRepository;

impl MemoryWalletRepository {
    pub fn new() -> Self {
        Self
    }

    fn effective_wallets(session: &mut MemorySession) -> Result<Vec<Wallet>, DomainError> {
        let mut by_id: HashMap<WalletId, Wallet> = lock(&session.store)?.wallets.clone();
        for staged in &session.staged_wallets {
            by_id.insert(staged.id(), staged.clone());
        }
        Ok(by_id.into_values().collect())
    }
}

impl Default for MemoryWalletRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletRepository for MemoryWalletRepository {
    async fn find_by_id(
        &self,
        session: &mut dyn UowSession,
        id: WalletId,
    ) -> Result<Option<Wallet>, DomainError> {
        let session = memory_session(session)?;
        Ok(Self::effective_wallets(session)?
            .into_iter()
            .find(|w| w.id() == id))
    }

    async fn find_by_user_and_currency(
        &self,
        session: &mut dyn UowSession,
        user_id: UserId,
        currency: Currency,
    ) -> Result<Option<Wallet>, DomainError> {
        let session = memory_session(session)?;
        Ok(Self::effective_wallets(session)?
            .into_iter()
            .find(|w| w.user_id() == user_id && w.currency() == currency))
    }

    async fn find_by_user_id(
        &self,
        session: &mut dyn UowSession,
        user_id: UserId,
    ) -> Result<Vec<Wallet>, DomainError> {
        let session = memory_session(session)?;
        let mut wallets: Vec<Wallet> = Self::effective_wallets(session)?
            .into_iter()
            .filter(|w| w.user_id() == user_id)
            .collect();
        wallets.sort_by_key(|w| w.created_at());
        Ok(wallets)
    }

    async fn exists_by_user_and_currency(
        &self,
        session: &mut dyn UowSession,
        user_id: UserId,
        currency: Currency,
    ) -> Result<bool, DomainError> {
        Ok(self
            .find_by_user_and_currency(session, user_id, currency)
            .await?
            .is_some())
    }

    async fn list(
        &self,
        session: &mut dyn UowSession,
        filter: WalletFilter,
        page: PageRequest,
    ) -> Result<Page<Wallet>, DomainError> {
        let session = memory_session(session)?;
        let mut wallets: Vec<Wallet> = Self::effective_wallets(session)?
            .into_iter()
            .filter(|w| {
                filter.user_id.is_none_or(|id| w.user_id() == id)
                    && filter.currency.is_none_or(|c| w.currency() == c)
                    && filter.status.is_none_or(|s| w.status() == s)
            })
            .collect();
        wallets.sort_by_key(|w| w.created_at());
        Ok(paginate(wallets, page))
    }

    async fn save(
        &self,
        session: &mut dyn UowSession,
        wallet: &Wallet,
    ) -> Result<(), DomainError> {
        let session = memory_session(session)?;
        {
            let store = lock(&session.store)?;
            match store.wallets.get(&wallet.id()) {
                Some(existing) => {
                    // Misma condición que el UPDATE WHERE version = n - 1.
                    if wallet.version() != existing.version() + 1 {
                        return Err(DomainError::Concurrency {
                            entity: "wallet",
                            id: wallet.id().to_string(),
                        });
                    }
                }
                None => {
                    if wallet.version() != 0 {
                        return Err(DomainError::NotFound {
                            entity: "wallet",
                            id: wallet.id().to_string(),
                        });
                    }
                    let duplicate = store.wallets.values().any(|w| {
                        w.user_id() == wallet.user_id() && w.currency() == wallet.currency()
                    });
                    if duplicate {
                        return Err(DomainError::BusinessRuleViolation(format!(
                            "user {} already has a {} wallet",
                            wallet.user_id(),
                            wallet.currency()
                        )));
                    }
                }
            }
        }
        session.staged_wallets.push(wallet.clone());
        Ok(())
    }
}

/// Repositorio de transacciones en memoria. Reproduce la restricción de
/// unicidad sobre la clave de idempotencia: un duplicado con otro id mapea a
/// `Concurrency`, de modo que el reintento del llamador aterrice en el
/// camino de replay idempotente.
pub struct MemoryTransactionRepository;

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self
    }

    fn effective_transactions(
        session: &mut MemorySession,
    ) -> Result<Vec<Transaction>, DomainError> {
        let mut by_id: HashMap<TransactionId, Transaction> =
            lock(&session.store)?.transactions.clone();
        for staged in &session.staged_transactions {
            by_id.insert(staged.id(), staged.clone());
        }
        Ok(by_id.into_values().collect())
    }
}

impl Default for MemoryTransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepository {
    async fn find_by_id(
        &self,
        session: &mut dyn UowSession,
        id: TransactionId,
    ) -> Result<Option<Transaction>, DomainError> {
        let session = memory_session(session)?;
        Ok(Self::effective_transactions(session)?
            .into_iter()
            .find(|t| t.id() == id))
    }

    async fn find_by_idempotency_key(
        &self,
        session: &mut dyn UowSession,
        idempotency_key: &str,
    ) -> Result<Option<Transaction>, DomainError> {
        let session = memory_session(session)?;
        Ok(Self::effective_transactions(session)?
            .into_iter()
            .find(|t| t.idempotency_key() == idempotency_key))
    }

    async fn find_by_wallet_id(
        &self,
        session: &mut dyn UowSession,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, DomainError> {
        let session = memory_session(session)?;
        let mut transactions: Vec<Transaction> = Self::effective_transactions(session)?
            .into_iter()
            .filter(|t| {
                t.wallet_id() == wallet_id || t.destination_wallet_id() == Some(wallet_id)
            })
            .collect();
        transactions.sort_by_key(|t| std::cmp::Reverse(t.created_at()));
        Ok(transactions)
    }

    async fn find_pending_by_wallet(
        &self,
        session: &mut dyn UowSession,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, DomainError> {
        let session = memory_session(session)?;
        let mut transactions: Vec<Transaction> = Self::effective_transactions(session)?
            .into_iter()
            .filter(|t| t.wallet_id() == wallet_id && t.status() == TransactionStatus::Pending)
            .collect();
        transactions.sort_by_key(|t| t.created_at());
        Ok(transactions)
    }

    async fn find_failed_retryable(
        &self,
        session: &mut dyn UowSession,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<Transaction>, DomainError> {
        let session = memory_session(session)?;
        let mut transactions: Vec<Transaction> = Self::effective_transactions(session)?
            .into_iter()
            .filter(|t| t.status() == TransactionStatus::Failed && t.retry_count() < max_retries)
            .collect();
        transactions.sort_by_key(|t| t.created_at());
        transactions.truncate(limit.max(0) as usize);
        Ok(transactions)
    }

    async fn list(
        &self,
        session: &mut dyn UowSession,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, DomainError> {
        let session = memory_session(session)?;
        let mut transactions: Vec<Transaction> = Self::effective_transactions(session)?
            .into_iter()
            .filter(|t| {
                filter.wallet_id.is_none_or(|id| t.wallet_id() == id)
                    && filter.status.is_none_or(|s| t.status() == s)
                    && filter
                        .transaction_type
                        .is_none_or(|k| t.transaction_type() == k)
            })
            .collect();
        transactions.sort_by_key(|t| std::cmp::Reverse(t.created_at()));
        Ok(paginate(transactions, page))
    }

    async fn save(
        &self,
        session: &mut dyn UowSession,
        transaction: &Transaction,
    ) -> Result<(), DomainError> {
        let session = memory_session(session)?;
        let duplicate_key = Self::effective_transactions(session)?.into_iter().any(|t| {
            t.id() != transaction.id() && t.idempotency_key() == transaction.idempotency_key()
        });
        if duplicate_key {
            return Err(DomainError::Concurrency {
                entity: "transaction",
                id: transaction.id().to_string(),
            });
        }
        session.staged_transactions.push(transaction.clone());
        Ok(())
    }
}

/// Publicador en memoria: encola los sobres en la sesión, así los eventos
/// solo aparecen en `MemoryStore::events` cuando la transacción confirma.
pub struct MemoryEventPublisher;

impl MemoryEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MemoryEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(
        &self,
        session: &mut dyn UowSession,
        event: DomainEvent,
    ) -> Result<(), DomainError> {
        let session = memory_session(session)?;
        session.staged_events.push(EventEnvelope::new(event));
        Ok(())
    }

    async fn publish_batch(
        &self,
        session: &mut dyn UowSession,
        events: Vec<DomainEvent>,
    ) -> Result<(), DomainError> {
        let session = memory_session(session)?;
        session
            .staged_events
            .extend(events.into_iter().map(EventEnvelope::new));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TransactionType;
    use crate::domain::money::Money;

    fn wallet(currency: Currency) -> Wallet {
        Wallet::new(
            UserId::new(),
            currency,
            Money::zero(currency),
            Money::zero(currency),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryWalletRepository::new();
        let w = wallet(Currency::Usd);

        let mut session = uow.begin().await.unwrap();
        repo.save(session.as_mut(), &w).await.unwrap();
        assert!(uow.store().lock().unwrap().wallets.is_empty());

        session.commit().await.unwrap();
        assert!(uow.store().lock().unwrap().wallets.contains_key(&w.id()));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryWalletRepository::new();
        let w = wallet(Currency::Usd);

        let mut session = uow.begin().await.unwrap();
        repo.save(session.as_mut(), &w).await.unwrap();
        session.rollback().await.unwrap();

        assert!(uow.store().lock().unwrap().wallets.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_a_session_discards_staged_writes() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryWalletRepository::new();
        let w = wallet(Currency::Usd);

        {
            let mut session = uow.begin().await.unwrap();
            repo.save(session.as_mut(), &w).await.unwrap();
            // La sesión se descarta sin confirmar.
        }
        assert!(uow.store().lock().unwrap().wallets.is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_save_is_a_concurrency_error() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryWalletRepository::new();
        let mut w = wallet(Currency::Usd);

        let mut session = uow.begin().await.unwrap();
        repo.save(session.as_mut(), &w).await.unwrap();
        session.commit().await.unwrap();

        // Primer escritor gana.
        let mut first = w.clone();
        first
            .credit(Money::parse("10.00", Currency::Usd).unwrap())
            .unwrap();
        let mut session = uow.begin().await.unwrap();
        repo.save(session.as_mut(), &first).await.unwrap();
        session.commit().await.unwrap();

        // Segundo escritor con la versión vieja pierde.
        w.credit(Money::parse("5.00", Currency::Usd).unwrap())
            .unwrap();
        let mut session = uow.begin().await.unwrap();
        let result = repo.save(session.as_mut(), &w).await;
        assert!(result.unwrap_err().is_concurrency_error());
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_maps_to_concurrency() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryTransactionRepository::new();
        let w = wallet(Currency::Usd);

        let first = Transaction::new(
            w.id(),
            "same-key".to_string(),
            TransactionType::Deposit,
            Money::parse("1", Currency::Usd).unwrap(),
            None,
            String::new(),
        )
        .unwrap();
        let second = Transaction::new(
            w.id(),
            "same-key".to_string(),
            TransactionType::Deposit,
            Money::parse("1", Currency::Usd).unwrap(),
            None,
            String::new(),
        )
        .unwrap();

        let mut session = uow.begin().await.unwrap();
        repo.save(session.as_mut(), &first).await.unwrap();
        session.commit().await.unwrap();

        let mut session = uow.begin().await.unwrap();
        let result = repo.save(session.as_mut(), &second).await;
        assert!(result.unwrap_err().is_concurrency_error());
    }

    #[tokio::test]
    async fn test_session_reads_see_own_staged_writes() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryTransactionRepository::new();
        let w = wallet(Currency::Usd);

        let tx = Transaction::new(
            w.id(),
            "k-own".to_string(),
            TransactionType::Deposit,
            Money::parse("1", Currency::Usd).unwrap(),
            None,
            String::new(),
        )
        .unwrap();

        let mut session = uow.begin().await.unwrap();
        repo.save(session.as_mut(), &tx).await.unwrap();
        let found = repo
            .find_by_idempotency_key(session.as_mut(), "k-own")
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.id()), Some(tx.id()));
    }

    #[tokio::test]
    async fn test_foreign_session_is_rejected() {
        struct ForeignSession;

        #[async_trait]
        impl UowSession for ForeignSession {
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
            async fn commit(self: Box<Self>) -> Result<(), DomainError> {
                Ok(())
            }
            async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
                Ok(())
            }
        }

        let repo = MemoryWalletRepository::new();
        let mut foreign = ForeignSession;
        let result = repo.find_by_id(&mut foreign, WalletId::new()).await;
        assert!(matches!(result, Err(DomainError::Repository { .. })));
    }

    #[tokio::test]
    async fn test_events_only_visible_after_commit() {
        let uow = MemoryUnitOfWork::new();
        let publisher = MemoryEventPublisher::new();

        let mut session = uow.begin().await.unwrap();
        publisher
            .publish(
                session.as_mut(),
                DomainEvent::UserKycApproved {
                    user_id: UserId::new(),
                },
            )
            .await
            .unwrap();
        assert!(uow.store().lock().unwrap().events.is_empty());

        session.commit().await.unwrap();
        assert_eq!(uow.store().lock().unwrap().events.len(), 1);
    }

    #[tokio::test]
    async fn test_pagination_clamps_to_available_items() {
        let uow = MemoryUnitOfWork::new();
        let repo = MemoryWalletRepository::new();
        for _ in 0..3 {
            let w = wallet(Currency::Usd);
            let mut session = uow.begin().await.unwrap();
            repo.save(session.as_mut(), &w).await.unwrap();
            session.commit().await.unwrap();
        }

        let mut session = uow.begin().await.unwrap();
        let page = repo
            .list(
                session.as_mut(),
                WalletFilter::default(),
                PageRequest::new(2, 10).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let page = repo
            .list(
                session.as_mut(),
                WalletFilter::default(),
                PageRequest::new(10, 10).unwrap(),
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }
}
