use std::sync::Arc;

use crate::domain::{
    entities::Wallet,
    error::DomainError,
    money::Currency,
    repository::WalletRepository,
    types::UserId,
    uow::{UnitOfWork, UowSession},
};

/// Caso de Uso: Listar las billeteras de un usuario, o resolver la única
/// billetera del usuario en una divisa concreta.
pub struct GetUserWalletsUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
}

impl GetUserWalletsUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, wallet_repo: Arc<dyn WalletRepository>) -> Self {
        Self { uow, wallet_repo }
    }

    #[tracing::instrument(name = "GetUserWalletsUseCase::execute", skip(self))]
    pub async fn execute(&self, user_id: &str) -> Result<Vec<Wallet>, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), user_id).await {
            Ok(wallets) => {
                session.commit().await?;
                Ok(wallets)
            }
            Err(err) => {
                let _ = session.rollback().await;
                Err(err)
            }
        }
    }

    /// Billetera del usuario en la divisa dada (a lo sumo existe una).
    #[tracing::instrument(name = "GetUserWalletsUseCase::for_currency", skip(self))]
    pub async fn for_currency(&self, user_id: &str, currency: &str) -> Result<Wallet, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run_for_currency(session.as_mut(), user_id, currency).await {
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
        user_id: &str,
    ) -> Result<Vec<Wallet>, DomainError> {
        let id = UserId::parse(user_id)?;
        self.wallet_repo.find_by_user_id(session, id).await
    }

    async fn run_for_currency(
        &self,
        session: &mut dyn UowSession,
        user_id: &str,
        currency: &str,
    ) -> Result<Wallet, DomainError> {
        let id = UserId::parse(user_id)?;
        let currency = Currency::parse(currency)?;
        self.wallet_repo
            .find_by_user_and_currency(session, id, currency)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "wallet",
                id: format!("{user_id}/{currency}"),
            })
    }
}
