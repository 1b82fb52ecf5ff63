use async_trait::async_trait;

use crate::domain::entities::Wallet;
use crate::domain::error::DomainError;
use crate::domain::money::Currency;
use crate::domain::repository::{Page, PageRequest, WalletFilter, WalletRepository};
use crate::domain::types::{UserId, WalletId};
use crate::domain::uow::UowSession;
use crate::infrastructure::persistence::models::WalletModel;
use crate::infrastructure::persistence::uow::{pg_conn, repository_error};

/// Repositorio de Billeteras basado en PostgreSQL con optimistic locking.
pub struct PostgresWalletRepository;

impl PostgresWalletRepository {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostgresWalletRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletRepository for PostgresWalletRepository {
    async fn find_by_id(
        &self,
        session: &mut dyn UowSession,
        id: WalletId,
    ) -> Result<Option<Wallet>, DomainError> {
        let conn = pg_conn(session)?;
        let model_opt = sqlx::query_as::<_, WalletModel>(
            r#"
            SELECT * FROM wallets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(repository_error)?;

        model_opt.map(Wallet::try_from).transpose()
    }

    async fn find_by_user_and_currency(
        &self,
        session: &mut dyn UowSession,
        user_id: UserId,
        currency: Currency,
    ) -> Result<Option<Wallet>, DomainError> {
        let conn = pg_conn(session)?;
        let model_opt = sqlx::query_as::<_, WalletModel>(
            r#"
            SELECT * FROM wallets
            WHERE user_id = $1 AND currency = $2
            "#,
        )
        .bind(user_id)
        .bind(currency.code())
        .fetch_optional(&mut *conn)
        .await
        .map_err(repository_error)?;

        model_opt.map(Wallet::try_from).transpose()
    }

    async fn find_by_user_id(
        &self,
        session: &mut dyn UowSession,
        user_id: UserId,
    ) -> Result<Vec<Wallet>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, WalletModel>(
            r#"
            SELECT * FROM wallets
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        models.into_iter().map(Wallet::try_from).collect()
    }

    async fn exists_by_user_and_currency(
        &self,
        session: &mut dyn UowSession,
        user_id: UserId,
        currency: Currency,
    ) -> Result<bool, DomainError> {
        let conn = pg_conn(session)?;
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM wallets WHERE user_id = $1 AND currency = $2)"#,
        )
        .bind(user_id)
        .bind(currency.code())
        .fetch_one(&mut *conn)
        .await
        .map_err(repository_error)?;
        Ok(exists)
    }

    async fn list(
        &self,
        session: &mut dyn UowSession,
        filter: WalletFilter,
        page: PageRequest,
    ) -> Result<Page<Wallet>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, WalletModel>(
            r#"
            SELECT * FROM wallets
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR currency = $2)
              AND ($3::wallet_status IS NULL OR status = $3)
            ORDER BY created_at ASC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.currency.map(|c| c.code()))
        .bind(filter.status)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        let wallets = models
            .into_iter()
            .map(Wallet::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(wallets))
    }

    /// Persistencia con chequeo de versión.
    ///
    /// Una billetera recién creada (versión 0) se inserta; una cargada se
    /// actualiza condicionada a que la fila conserve la versión previa a la
    /// mutación. Cero filas afectadas significa que otro escritor confirmó
    /// primero: `Concurrency`, y el llamador reintenta con backoff.
    async fn save(
        &self,
        session: &mut dyn UowSession,
        wallet: &Wallet,
    ) -> Result<(), DomainError> {
        let conn = pg_conn(session)?;
        let model = WalletModel::from(wallet);

        if model.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO wallets (
                    id, user_id, currency, status, available_balance, pending_balance,
                    daily_limit, monthly_limit, version, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(model.id)
            .bind(model.user_id)
            .bind(model.currency)
            .bind(model.status)
            .bind(model.available_balance)
            .bind(model.pending_balance)
            .bind(model.daily_limit)
            .bind(model.monthly_limit)
            .bind(model.version)
            .bind(model.created_at)
            .bind(model.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    return DomainError::BusinessRuleViolation(format!(
                        "user {} already has a {} wallet",
                        wallet.user_id(),
                        wallet.currency()
                    ));
                }
                repository_error(e)
            })?;
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET status = $2,
                available_balance = $3,
                pending_balance = $4,
                daily_limit = $5,
                monthly_limit = $6,
                version = $7,
                updated_at = $8
            WHERE id = $1 AND version = $9
            "#,
        )
        .bind(model.id)
        .bind(model.status)
        .bind(model.available_balance)
        .bind(model.pending_balance)
        .bind(model.daily_limit)
        .bind(model.monthly_limit)
        .bind(model.version)
        .bind(model.updated_at)
        .bind(model.version - 1)
        .execute(&mut *conn)
        .await
        .map_err(repository_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Concurrency {
                entity: "wallet",
                id: wallet.id().to_string(),
            });
        }

        Ok(())
    }
}
