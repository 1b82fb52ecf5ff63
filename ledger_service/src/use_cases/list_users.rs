use std::sync::Arc;

use crate::domain::{
    entities::User,
    error::DomainError,
    repository::{Page, PageRequest, UserRepository},
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone, Default)]
pub struct ListUsersQuery {
    pub offset: i64,
    pub limit: i64,
}

/// Caso de Uso: Listado paginado de usuarios.
pub struct ListUsersUseCase {
    uow: Arc<dyn UnitOfWork>,
    user_repo: Arc<dyn UserRepository>,
}

impl ListUsersUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { uow, user_repo }
    }

    #[tracing::instrument(name = "ListUsersUseCase::execute", skip(self))]
    pub async fn execute(&self, query: ListUsersQuery) -> Result<Page<User>, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), query).await {
            Ok(page) => {
                session.commit().await?;
                Ok(page)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        session: &mut dyn UowSession,
        query: ListUsersQuery,
    ) -> Result<Page<User>, DomainError> {
        let page = PageRequest::new(query.offset, query.limit)?;
        self.user_repo.list(session, page).await
    }
}
