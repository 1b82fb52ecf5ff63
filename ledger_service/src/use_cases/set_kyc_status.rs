use std::sync::Arc;

use crate::domain::{
    entities::User,
    error::DomainError,
    events::DomainEvent,
    publisher::EventPublisher,
    repository::UserRepository,
    types::UserId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct SetKycStatusCommand {
    pub user_id: String,
    pub approved: bool,
    pub reason: Option<String>,
}

/// Caso de Uso: Resolver la verificación KYC de un usuario.
///
/// El flujo de verificación corre fuera del servicio; aquí solo se registra
/// el veredicto y se publica el evento correspondiente.
pub struct SetKycStatusUseCase {
    uow: Arc<dyn UnitOfWork>,
    user_repo: Arc<dyn UserRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl SetKycStatusUseCase {
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

    #[tracing::instrument(name = "SetKycStatusUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: SetKycStatusCommand) -> Result<User, DomainError> {
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
        cmd: SetKycStatusCommand,
    ) -> Result<User, DomainError> {
        let user_id = UserId::parse(&cmd.user_id)?;
        let mut user = self
            .user_repo
            .find_by_id(session, user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "user",
                id: cmd.user_id.clone(),
            })?;

        let event = if cmd.approved {
            user.approve_kyc();
            DomainEvent::UserKycApproved { user_id: user.id() }
        } else {
            user.reject_kyc();
            DomainEvent::UserKycRejected {
                user_id: user.id(),
                reason: cmd
                    .reason
                    .unwrap_or_else(|| "verification rejected".to_string()),
            }
        };

        self.user_repo.save(session, &user).await?;
        self.publisher.publish(session, event).await?;

        Ok(user)
    }
}
