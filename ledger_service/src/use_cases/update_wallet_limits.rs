use std::sync::Arc;

use crate::domain::{
    entities::Wallet,
    error::DomainError,
    money::Money,
    repository::WalletRepository,
    types::WalletId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct UpdateWalletLimitsCommand {
    pub wallet_id: String,
    pub daily_limit: String,
    pub monthly_limit: String,
}

/// Caso de Uso: Reemplazar los límites diario y mensual de una billetera.
pub struct UpdateWalletLimitsUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
}

impl UpdateWalletLimitsUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, wallet_repo: Arc<dyn WalletRepository>) -> Self {
        Self { uow, wallet_repo }
    }

    #[tracing::instrument(name = "UpdateWalletLimitsUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: UpdateWalletLimitsCommand) -> Result<Wallet, DomainError> {
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
        cmd: UpdateWalletLimitsCommand,
    ) -> Result<Wallet, DomainError> {
        let wallet_id = WalletId::parse(&cmd.wallet_id)?;
        let mut wallet = self
            .wallet_repo
            .find_by_id(session, wallet_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "wallet",
                id: cmd.wallet_id.clone(),
            })?;

        let daily = Money::parse(&cmd.daily_limit, wallet.currency())?;
        let monthly = Money::parse(&cmd.monthly_limit, wallet.currency())?;
        wallet.update_limits(daily, monthly)?;

        self.wallet_repo.save(session, &wallet).await?;
        Ok(wallet)
    }
}
