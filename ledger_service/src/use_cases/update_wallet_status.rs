use std::sync::Arc;

use crate::domain::{
    entities::{Wallet, WalletStatus},
    error::DomainError,
    events::DomainEvent,
    publisher::EventPublisher,
    repository::WalletRepository,
    types::WalletId,
    uow::{UnitOfWork, UowSession},
};

#[derive(Debug, Clone)]
pub struct UpdateWalletStatusCommand {
    pub wallet_id: String,
    pub status: WalletStatus,
    pub reason: Option<String>,
}

/// Caso de Uso: Administrar el estado de una billetera.
///
/// Aplica la tabla de transiciones del agregado; una suspensión publica
/// `wallet.suspended` con el motivo del operador.
pub struct UpdateWalletStatusUseCase {
    uow: Arc<dyn UnitOfWork>,
    wallet_repo: Arc<dyn WalletRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl UpdateWalletStatusUseCase {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        wallet_repo: Arc<dyn WalletRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            uow,
            wallet_repo,
            publisher,
        }
    }

    #[tracing::instrument(name = "UpdateWalletStatusUseCase::execute", skip(self))]
    pub async fn execute(&self, cmd: UpdateWalletStatusCommand) -> Result<Wallet, DomainError> {
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
        cmd: UpdateWalletStatusCommand,
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

        wallet.update_status(cmd.status)?;
        self.wallet_repo.save(session, &wallet).await?;

        if cmd.status == WalletStatus::Suspended {
            self.publisher
                .publish(
                    session,
                    DomainEvent::WalletSuspended {
                        wallet_id,
                        reason: cmd
                            .reason
                            .unwrap_or_else(|| "suspended by operator".to_string()),
                    },
                )
                .await?;
        }

        Ok(wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Currency, Money};
    use crate::domain::publisher::MockEventPublisher;
    use crate::domain::repository::MockWalletRepository;
    use crate::domain::types::UserId;
    use crate::infrastructure::memory::MemoryUnitOfWork;

    fn active_wallet() -> Wallet {
        Wallet::new(
            UserId::new(),
            Currency::Usd,
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_suspension_publishes_event_with_reason() {
        let mut mock_wallets = MockWalletRepository::new();
        let mut mock_publisher = MockEventPublisher::new();

        let wallet = active_wallet();
        let wallet_id = wallet.id();

        mock_wallets
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(wallet.clone())));
        mock_wallets
            .expect_save()
            .withf(|_, w| w.status() == WalletStatus::Suspended)
            .times(1)
            .returning(|_, _| Ok(()));
        mock_publisher
            .expect_publish()
            .withf(|_, event| {
                matches!(
                    event,
                    DomainEvent::WalletSuspended { reason, .. } if reason == "fraud review"
                )
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let use_case = UpdateWalletStatusUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(mock_wallets),
            Arc::new(mock_publisher),
        );

        let updated = use_case
            .execute(UpdateWalletStatusCommand {
                wallet_id: wallet_id.to_string(),
                status: WalletStatus::Suspended,
                reason: Some("fraud review".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(updated.status(), WalletStatus::Suspended);
        assert_eq!(updated.version(), 1);
    }

    #[tokio::test]
    async fn test_closing_does_not_publish_suspension() {
        let mut mock_wallets = MockWalletRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let wallet = active_wallet();
        let wallet_id = wallet.id();

        mock_wallets
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(wallet.clone())));
        mock_wallets.expect_save().times(1).returning(|_, _| Ok(()));
        // Sin expectativa de publish: cerrar no emite wallet.suspended.

        let use_case = UpdateWalletStatusUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(mock_wallets),
            Arc::new(mock_publisher),
        );

        let updated = use_case
            .execute(UpdateWalletStatusCommand {
                wallet_id: wallet_id.to_string(),
                status: WalletStatus::Closed,
                reason: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.status(), WalletStatus::Closed);
    }

    #[tokio::test]
    async fn test_invalid_transition_is_rejected() {
        let mut mock_wallets = MockWalletRepository::new();
        let mock_publisher = MockEventPublisher::new();

        let mut wallet = active_wallet();
        wallet.update_status(WalletStatus::Closed).unwrap();
        let wallet_id = wallet.id();

        mock_wallets
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(wallet.clone())));

        let use_case = UpdateWalletStatusUseCase::new(
            Arc::new(MemoryUnitOfWork::new()),
            Arc::new(mock_wallets),
            Arc::new(mock_publisher),
        );

        let result = use_case
            .execute(UpdateWalletStatusCommand {
                wallet_id: wallet_id.to_string(),
                status: WalletStatus::Active,
                reason: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }
}
