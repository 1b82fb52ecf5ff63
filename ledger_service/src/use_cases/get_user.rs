use std::sync::Arc;

use crate::domain::{
    entities::User,
    error::DomainError,
    repository::UserRepository,
    types::UserId,
    uow::{UnitOfWork, UowSession},
};

/// Caso de Uso: Consultar un usuario por id o por correo.
pub struct GetUserUseCase {
    uow: Arc<dyn UnitOfWork>,
    user_repo: Arc<dyn UserRepository>,
}

impl GetUserUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { uow, user_repo }
    }

    #[tracing::instrument(name = "GetUserUseCase::by_id", skip(self))]
    pub async fn by_id(&self, user_id: &str) -> Result<User, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run_by_id(session.as_mut(), user_id).await {
            Ok(user) => {
                session.commit().await?;
                Ok(user)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }

    #[tracing::instrument(name = "GetUserUseCase::by_email", skip(self))]
    pub async fn by_email(&self, email: &str) -> Result<User, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run_by_email(session.as_mut(), email).await {
            Ok(user) => {
                session.commit().await?;
                Ok(user)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }

    async fn run_by_id(
        &self,
        session: &mut dyn UowSession,
        user_id: &str,
    ) -> Result<User, DomainError> {
        let id = UserId::parse(user_id)?;
        self.user_repo
            .find_by_id(session, id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })
    }

    async fn run_by_email(
        &self,
        session: &mut dyn UowSession,
        email: &str,
    ) -> Result<User, DomainError> {
        self.user_repo
            .find_by_email(session, email)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "user",
                id: email.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::MockUserRepository;
    use crate::infrastructure::memory::MemoryUnitOfWork;

    #[tokio::test]
    async fn test_by_id_found() {
        let mut mock_users = MockUserRepository::new();
        let user = User::new("gina".to_string(), "gina@example.com".to_string()).unwrap();
        let user_id = user.id();

        mock_users
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(user.clone())));

        let use_case = GetUserUseCase::new(Arc::new(MemoryUnitOfWork::new()), Arc::new(mock_users));
        let found = use_case.by_id(&user_id.to_string()).await.unwrap();
        assert_eq!(found.id(), user_id);
    }

    #[tokio::test]
    async fn test_by_email_not_found() {
        let mut mock_users = MockUserRepository::new();
        mock_users
            .expect_find_by_email()
            .withf(|_, email| email == "ghost@example.com")
            .returning(|_, _| Ok(None));

        let use_case = GetUserUseCase::new(Arc::new(MemoryUnitOfWork::new()), Arc::new(mock_users));
        let result = use_case.by_email("ghost@example.com").await;
        assert!(result.unwrap_err().is_not_found());
    }
}
