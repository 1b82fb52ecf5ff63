use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::TransactionType;
use crate::domain::money::{Currency, Money};
use crate::domain::types::{TransactionId, UserId, WalletId};

/// Conjunto cerrado de eventos de dominio.
///
/// El despacho es por etiqueta (`name()`), no por subtipado: los consumidores
/// hacen match sobre la variante. Los eventos se publican dentro del
/// Unit-of-Work y solo se vuelven observables cuando este confirma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DomainEvent {
    UserCreated {
        user_id: UserId,
        email: String,
    },
    UserKycApproved {
        user_id: UserId,
    },
    UserKycRejected {
        user_id: UserId,
        reason: String,
    },
    WalletCreated {
        wallet_id: WalletId,
        user_id: UserId,
        currency: Currency,
    },
    WalletCredited {
        wallet_id: WalletId,
        amount: Money,
        transaction_id: TransactionId,
        balance_after: Money,
    },
    WalletDebited {
        wallet_id: WalletId,
        amount: Money,
        transaction_id: TransactionId,
        balance_after: Money,
    },
    WalletSuspended {
        wallet_id: WalletId,
        reason: String,
    },
    TransactionCreated {
        transaction_id: TransactionId,
        wallet_id: WalletId,
        transaction_type: TransactionType,
        amount: Money,
        idempotency_key: String,
    },
    TransactionCompleted {
        transaction_id: TransactionId,
        wallet_id: WalletId,
        completed_at: DateTime<Utc>,
    },
    TransactionFailed {
        transaction_id: TransactionId,
        wallet_id: WalletId,
        failure_reason: String,
        is_retryable: bool,
    },
}

impl DomainEvent {
    /// Etiqueta estable del evento en el transporte.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserCreated { .. } => "user.created",
            Self::UserKycApproved { .. } => "user.kyc.approved",
            Self::UserKycRejected { .. } => "user.kyc.rejected",
            Self::WalletCreated { .. } => "wallet.created",
            Self::WalletCredited { .. } => "wallet.credited",
            Self::WalletDebited { .. } => "wallet.debited",
            Self::WalletSuspended { .. } => "wallet.suspended",
            Self::TransactionCreated { .. } => "transaction.created",
            Self::TransactionCompleted { .. } => "transaction.completed",
            Self::TransactionFailed { .. } => "transaction.failed",
        }
    }

    /// Id del agregado al que pertenece el evento (transacción o billetera
    /// según la familia; usuario para los eventos de identidad).
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            Self::UserCreated { user_id, .. }
            | Self::UserKycApproved { user_id }
            | Self::UserKycRejected { user_id, .. } => user_id.0,
            Self::WalletCreated { wallet_id, .. }
            | Self::WalletCredited { wallet_id, .. }
            | Self::WalletDebited { wallet_id, .. }
            | Self::WalletSuspended { wallet_id, .. } => wallet_id.0,
            Self::TransactionCreated { transaction_id, .. }
            | Self::TransactionCompleted { transaction_id, .. }
            | Self::TransactionFailed { transaction_id, .. } => transaction_id.0,
        }
    }
}

/// Sobre de publicación: cada evento sale con un id único y su instante de
/// ocurrencia, como exige el contrato de entrega at-least-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event,
        }
    }

    pub fn name(&self) -> &'static str {
        self.event.name()
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.event.aggregate_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;

    #[test]
    fn test_event_names_are_stable() {
        let wallet_id = WalletId::new();
        let user_id = UserId::new();
        let tx_id = TransactionId::new();
        let amount = Money::parse("1.00", Currency::Usd).unwrap();

        let cases = [
            (
                DomainEvent::UserCreated {
                    user_id,
                    email: "a@b.com".to_string(),
                },
                "user.created",
            ),
            (DomainEvent::UserKycApproved { user_id }, "user.kyc.approved"),
            (
                DomainEvent::WalletCreated {
                    wallet_id,
                    user_id,
                    currency: Currency::Usd,
                },
                "wallet.created",
            ),
            (
                DomainEvent::WalletCredited {
                    wallet_id,
                    amount,
                    transaction_id: tx_id,
                    balance_after: amount,
                },
                "wallet.credited",
            ),
            (
                DomainEvent::TransactionFailed {
                    transaction_id: tx_id,
                    wallet_id,
                    failure_reason: "x".to_string(),
                    is_retryable: false,
                },
                "transaction.failed",
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(event.name(), expected);
        }
    }

    #[test]
    fn test_aggregate_id_follows_event_family() {
        let wallet_id = WalletId::new();
        let tx_id = TransactionId::new();
        let event = DomainEvent::WalletSuspended {
            wallet_id,
            reason: "fraud review".to_string(),
        };
        assert_eq!(event.aggregate_id(), wallet_id.0);

        let event = DomainEvent::TransactionCompleted {
            transaction_id: tx_id,
            wallet_id,
            completed_at: Utc::now(),
        };
        assert_eq!(event.aggregate_id(), tx_id.0);
    }

    #[test]
    fn test_envelope_assigns_unique_ids() {
        let event = DomainEvent::UserKycApproved {
            user_id: UserId::new(),
        };
        let a = EventEnvelope::new(event.clone());
        let b = EventEnvelope::new(event);
        assert_ne!(a.event_id, b.event_id);
    }
}
