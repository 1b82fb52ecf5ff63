use std::sync::Arc;

use crate::domain::{
    entities::User,
    error::DomainError,
    events::DomainEvent,
    publisher::EventPublisher,
    repository::UserRepository,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub username: String,
    pub email: String,
}

/// Caso de Uso: Registrar un nuevo Usuario.
///
/// Rechaza correos duplicados, persiste la entidad y publica `user.created`,
/// todo dentro de una única frontera atómica.
pub struct CreateUserUseCase {
    uow: Arc<dyn UnitOfWork>,
    user_repo: Arc<dyn UserRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl CreateUserUseCase {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        user_repo: Arc<dyn UserRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            user_repo,
            publisher,
        }
    }

    #[tracing::instrument(name = "CreateUserUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: CreateUserCommand) -> Result<User, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), cmd).await {
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

    async fn run(
        &self,
        session: &mut dyn UowSession,
        cmd: CreateUserCommand,
    ) -> Result<User, DomainError> {
        // Valida que no existan duplicados antes de instanciar la entidad.
        if self.user_repo.exists_by_email(session, &cmd.email).await? {
            return Err(DomainError::BusinessRuleViolation(format!(
                "a user with email {} already exists",
                cmd.email
            )));
        }

        let user = User::new(cmd.username, cmd.email)?;
        self.user_repo.save(session, &user).await?;

        self.publisher
            .publish(
                session,
                DomainEvent::UserCreated {
                    user_id: user.id(),
                    email: user.email().to_string(),
                },
            )
            .await?;

        Ok(user)
    }
}
