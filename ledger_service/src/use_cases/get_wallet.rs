use std::sync::Arc;

use crate::domain::{
    entities::Wallet,
    error::DomainError,
    repository::WalletRepository,
    types::WalletId,
    uow::{UnitOfWork, UowSession},
};

/// Caso de Uso: Consultar una billetera por su identificador.
pub struct GetWalletUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
}

impl GetWalletUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, wallet_repo: Arc<dyn WalletRepository>) -> Self {
        Self { uow, wallet_repo }
    }

    #[tracing::instrument(name = "GetWalletUseCase::execute", skip(self))]
    pub async fn execute(&self, wallet_id: &str) -> Result<Wallet, DomainError> {
        let mut session = self.uow.begin().await?;
        match self.run(session.as_mut(), wallet_id).await {
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
        wallet_id: &str,
    ) -> Result<Wallet, DomainError> {
        let id = WalletId::parse(wallet_id)?;
        self.wallet_repo
            .find_by_id(session, id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "wallet",
                id: wallet_id.to_string(),
            })
    }
}
