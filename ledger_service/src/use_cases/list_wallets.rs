use std::sync::Arc;

use crate::domain::{
    entities::{Wallet, WalletStatus},
    error::DomainError,
    money::Currency,
    repository::{Page, PageRequest, WalletFilter, WalletRepository},
    types::UserId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone, Default)]
pub struct ListWalletsQuery {
    pub user_id: Option<String>,
    pub currency: Option<String>,
    pub status: Option<WalletStatus>,
    pub offset: i64,
    pub limit: i64,
}

/// Caso de Uso: Listado paginado de billeteras con filtros opcionales.
pub struct ListWalletsUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
}

impl ListWalletsUseCase {
    pub fn new(uow: Arc<dyn UnitOfWork>, wallet_repo: Arc<dyn WalletRepository>) -> Self {
        Self { uow, wallet_repo }
    }

    #[tracing::instrument(name = "ListWalletsUseCase::execute", skip(self))]
    pub async fn execute(&self, query: ListWalletsQuery) -> Result<Page<Wallet>, DomainError> {
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
        query: ListWalletsQuery,
    ) -> Result<Page<Wallet>, DomainError> {
        let page = PageRequest::new(query.offset, query.limit)?;
        let user_id = match &query.user_id {
            Some(raw) => Some(UserId::parse(raw)?),
            None => None,
        };
        let currency = match &query.currency {
            Some(raw) => Some(Currency::parse(raw)?),
            None => None,
        };
        let filter = WalletFilter {
            user_id,
            currency,
            status: query.status,
        };
        self.wallet_repo.list(session, filter, page).await
    }
}
