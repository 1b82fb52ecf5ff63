use async_trait::async_trait;

use crate::domain::entities::User;
use crate::domain::error::DomainError;
use crate::domain::repository::{Page, PageRequest, UserRepository};
use crate::domain::types::UserId;
use crate::domain::uow::UowSession;
use crate::infrastructure::persistence::models::UserModel;
use crate::infrastructure::persistence::uow::{pg_conn, repository_error};

/// Repositorio de Usuarios basado en PostgreSQL.
pub struct PostgresUserRepository;

impl PostgresUserRepository {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostgresUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(
        &self,
        session: &mut dyn UowSession,
        id: UserId,
    ) -> Result<Option<User>, DomainError> {
        let conn = pg_conn(session)?;
        let model_opt = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT * FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(repository_error)?;

        model_opt.map(User::try_from).transpose()
    }

    async fn find_by_email(
        &self,
        session: &mut dyn UowSession,
        email: &str,
    ) -> Result<Option<User>, DomainError> {
        let conn = pg_conn(session)?;
        let model_opt = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT * FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(repository_error)?;

        model_opt.map(User::try_from).transpose()
    }

    async fn exists_by_email(
        &self,
        session: &mut dyn UowSession,
        email: &str,
    ) -> Result<bool, DomainError> {
        let conn = pg_conn(session)?;
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)"#)
                .bind(email)
                .fetch_one(&mut *conn)
                .await
                .map_err(repository_error)?;
        Ok(exists)
    }

    /// Inserta o actualiza al usuario (UPSERT por id). Un conflicto de
    /// unicidad en email o username se reporta como violación de regla de
    /// negocio, respaldando el chequeo previo del caso de uso.
    async fn save(&self, session: &mut dyn UowSession, user: &User) -> Result<(), DomainError> {
        let conn = pg_conn(session)?;
        let model = UserModel::from(user);

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, kyc_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                kyc_status = EXCLUDED.kyc_status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(model.id)
        .bind(model.username)
        .bind(model.email)
        .bind(model.kyc_status)
        .bind(model.created_at)
        .bind(model.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return DomainError::BusinessRuleViolation(format!(
                    "a user with email {} or the same username already exists",
                    user.email()
                ));
            }
            repository_error(e)
        })?;

        Ok(())
    }

    async fn list(
        &self,
        session: &mut dyn UowSession,
        page: PageRequest,
    ) -> Result<Page<User>, DomainError> {
        let conn = pg_conn(session)?;
        let models = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT * FROM users
            ORDER BY created_at ASC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&mut *conn)
        .await
        .map_err(repository_error)?;

        let users = models
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(users))
    }
}
