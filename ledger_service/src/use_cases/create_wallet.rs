use std::sync::Arc;

use crate::domain::{
    entities::Wallet,
    error::DomainError,
    events::DomainEvent,
    money::{Currency, Money},
    publisher::EventPublisher,
    repository::{UserRepository, WalletRepository},
    types::UserId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct CreateWalletCommand {
    pub user_id: String,
    pub currency: String,
    pub daily_limit: Option<String>,
    pub monthly_limit: Option<String>,
}

/// Caso de Uso: Emitir una billetera para un usuario.
///
/// Reglas: el usuario debe existir y tener KYC aprobado, y solo puede haber
/// una billetera por (usuario, divisa). La billetera nace ACTIVE, con saldos
/// en cero y versión 0.
pub struct CreateWalletUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
    user_repo: Arc<dyn UserRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl CreateWalletUseCase {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        wallet_repo: Arc<dyn WalletRepository>,
        user_repo: Arc<dyn UserRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            wallet_repo,
            user_repo,
            publisher,
        }
    }

    #[tracing::instrument(name = "CreateWalletUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: CreateWalletCommand) -> Result<Wallet, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), cmd).await {
            Ok(wallet) => {
                session.commit().await?;
                Ok(wallet)
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
        cmd: CreateWalletCommand,
    ) -> Result<Wallet, DomainError> {
        let user_id = UserId::parse(&cmd.user_id)?;
        let currency = Currency::parse(&cmd.currency)?;

        let user = self
            .user_repo
            .find_by_id(session, user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "user",
                id: cmd.user_id.clone(),
            })?;

        // Única consulta de identidad que hace el núcleo: el predicado KYC.
        if !user.is_kyc_approved() {
            return Err(DomainError::BusinessRuleViolation(format!(
                "user {} is not KYC approved",
                user.id()
            )));
        }

        if self
            .wallet_repo
            .exists_by_user_and_currency(session, user_id, currency)
            .await?
        {
            return Err(DomainError::BusinessRuleViolation(format!(
                "user {user_id} already has a {currency} wallet"
            )));
        }

        let daily_limit = match &cmd.daily_limit {
            Some(raw) => Money::parse(raw, currency)?,
            None => Money::zero(currency),
        };
        let monthly_limit = match &cmd.monthly_limit {
            Some(raw) => Money::parse(raw, currency)?,
            None => Money::zero(currency),
        };

        let wallet = Wallet::new(user_id, currency, daily_limit, monthly_limit)?;
        self.wallet_repo.save(session, &wallet).await?;

        self.publisher
            .publish(
                session,
                DomainEvent::WalletCreated {
                    wallet_id: wallet.id(),
                    user_id,
                    currency,
                },
            )
            .await?;

        Ok(wallet)
    }
}
