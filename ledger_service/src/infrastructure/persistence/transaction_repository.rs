use async_trait::async_trait;

use crate::domain::entities::Transaction;
use crate::domain::error::DomainError;
use crate::domain::repository::{Page, PageRequest, TransactionFilter, TransactionRepository};
use crate::domain::types::{TransactionId, WalletId};
use crate::domain::uow::UowSession;
use crate::infrastructure::persistence::models::TransactionModel;
use crate::infrastructure::persistence::uow::{pg_conn, repository_error};

/// Repositorio de Transacciones basado en PostgreSQL.
///
/// Consultas SQL parametrizadas directas con `sqlx::query_as` mapeando a
/// `TransactionModel`. La tabla impone la unicidad de `idempotency_key`.
pub struct PostgresTransactionRepository;

impl PostgresTransactionRepository {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostgresTransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn find_by_id(
        &self,
        session: &mut dyn UowSession,
        id: TransactionId,
    ) -> Result<Option<Transaction>, DomainError> {
        let conn = pg_conn(session)?;
        let model_opt = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(repository_error)?;

        model_opt.map(Transaction::try_from).transpose()
    }

    /// Búsqueda por clave de idempotencia, cabeza de todo caso de uso de
    /// escritura: permite devolver la transacción previa sin re-ejecutar.
    async fn find_by_idempotency_key(
        &self,
        session: &mut dyn UowSession,
        idempotency_key: &str,
    ) -> Result<Option<Transaction>, DomainError> {
        let conn = pg_conn(session)?;
        let model_opt = sqlx::query_as::<_, TransactionModel>(
            r#"SELECT * FROM transactions WHERE idempotency_key = $1"#,
        )
        .bind(idempotency_key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(repository_error)?;

        model_opt.map(Transaction::try_from).transpose()
    }

    /// Historial de una billetera como origen o destino, lo más reciente
    /// primero.
    async fn find_by_wallet_id(
        &self,
        session: &mut dyn UowSession,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, TransactionModel>(
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = $1 OR destination_wallet_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        models.into_iter().map(Transaction::try_from).collect()
    }

    async fn find_pending_by_wallet(
        &self,
        session: &mut dyn UowSession,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, TransactionModel>(
            r#"
            SELECT * FROM transactions
            WHERE wallet_id = $1 AND status = 'PENDING'
            ORDER BY created_at ASC
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        models.into_iter().map(Transaction::try_from).collect()
    }

    /// Transacciones FAILED que aún no agotaron sus reintentos, para el
    /// barrido de recuperación.
    async fn find_failed_retryable(
        &self,
        session: &mut dyn UowSession,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<Transaction>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, TransactionModel>(
            r#"
            SELECT * FROM transactions
            WHERE status = 'FAILED' AND retry_count < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(max_retries)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        models.into_iter().map(Transaction::try_from).collect()
    }

    async fn list(
        &self,
        session: &mut dyn UowSession,
        filter: TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, TransactionModel>(
            r#"
            SELECT * FROM transactions
            WHERE ($1::uuid IS NULL OR wallet_id = $1)
              AND ($2::transaction_status IS NULL OR status = $2)
              AND ($3::transaction_type IS NULL OR transaction_type = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(filter.wallet_id)
        .bind(filter.status)
        .bind(filter.transaction_type)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        let transactions = models
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(transactions))
    }

    /// UPSERT por id: el INSERT registra la transacción nueva y el UPDATE
    /// cubre los avances de la máquina de estados. Un conflicto de unicidad
    /// en `idempotency_key` significa que otro escritor ganó la carrera con
    /// la misma clave; se mapea a `Concurrency` para que el reintento del
    /// llamador aterrice en el camino de replay idempotente.
    async fn save(
        &self,
        session: &mut dyn UowSession,
        transaction: &Transaction,
    ) -> Result<(), DomainError> {
        let conn = pg_conn(session)?;
        let model = TransactionModel::from(transaction);

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, wallet_id, idempotency_key, transaction_type, status, amount,
                currency, destination_wallet_id, external_reference, description,
                metadata, failure_reason, retry_count, created_at, updated_at,
                processed_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                destination_wallet_id = EXCLUDED.destination_wallet_id,
                external_reference = EXCLUDED.external_reference,
                metadata = EXCLUDED.metadata,
                failure_reason = EXCLUDED.failure_reason,
                retry_count = EXCLUDED.retry_count,
                updated_at = EXCLUDED.updated_at,
                processed_at = EXCLUDED.processed_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(model.id)
        .bind(model.wallet_id)
        .bind(model.idempotency_key)
        .bind(model.transaction_type)
        .bind(model.status)
        .bind(model.amount)
        .bind(model.currency)
        .bind(model.destination_wallet_id)
        .bind(model.external_reference)
        .bind(model.description)
        .bind(model.metadata)
        .bind(model.failure_reason)
        .bind(model.retry_count)
        .bind(model.created_at)
        .bind(model.updated_at)
        .bind(model.processed_at)
        .bind(model.completed_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return DomainError::Concurrency {
                    entity: "transaction",
                    id: transaction.id().to_string(),
                };
            }
            repository_error(e)
        })?;

        Ok(())
    }
}
