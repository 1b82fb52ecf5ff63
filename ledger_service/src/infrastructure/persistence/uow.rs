use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Postgres};
use std::any::Any;

use crate::domain::error::DomainError;
use crate::domain::uow::{UnitOfWork, UowSession};

/// Unit-of-Work sobre PostgreSQL: cada `begin` abre una transacción del
/// pool y la entrega como sesión.
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn UowSession>, DomainError> {
        let tx = self.pool.begin().await.map_err(repository_error)?;
        Ok(Box::new(PgSession { tx }))
    }
}

/// Sesión que envuelve `sqlx::Transaction`. Si se descarta sin confirmar
/// (error o panic del cuerpo del caso de uso), sqlx revierte al soltar la
/// conexión, lo que cumple el contrato de rollback del puerto.
pub struct PgSession {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UowSession for PgSession {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(repository_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(repository_error)
    }
}

/// Extrae la conexión transaccional de una sesión. Una sesión de otro
/// backend no participa en esta transacción y se rechaza.
pub(crate) fn pg_conn<'a>(
    session: &'a mut dyn UowSession,
) -> Result<&'a mut PgConnection, DomainError> {
    let pg = session
        .as_any_mut()
        .downcast_mut::<PgSession>()
        .ok_or_else(|| {
            DomainError::repository("unit-of-work session does not belong to the Postgres backend")
        })?;
    Ok(&mut *pg.tx)
}

/// Clasifica un fallo de sqlx como transitorio o permanente. Fallos de
/// serialización (40001), deadlocks (40P01) y errores de E/S se reintentan;
/// el resto se considera determinista.
pub(crate) fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

pub(crate) fn repository_error(err: sqlx::Error) -> DomainError {
    DomainError::Repository {
        retryable: is_transient(&err),
        message: err.to_string(),
    }
}
