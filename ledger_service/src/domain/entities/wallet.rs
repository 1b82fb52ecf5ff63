use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::domain::error::DomainError;
use crate::domain::money::{Currency, Money};
use crate::domain::types::{UserId, WalletId};

/// Estado operativo de una billetera. CLOSED es terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "wallet_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    Active,
    Suspended,
    Locked,
    Closed,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Locked => "LOCKED",
            Self::Closed => "CLOSED",
        }
    }

    /// Tabla de transiciones permitidas:
    /// ACTIVE → {SUSPENDED, LOCKED, CLOSED}; SUSPENDED → {ACTIVE, CLOSED};
    /// LOCKED → {ACTIVE, CLOSED}; CLOSED no sale de CLOSED.
    pub fn can_transition_to(&self, next: WalletStatus) -> bool {
        use WalletStatus::*;
        matches!(
            (self, next),
            (Active, Suspended)
                | (Active, Locked)
                | (Active, Closed)
                | (Suspended, Active)
                | (Suspended, Closed)
                | (Locked, Active)
                | (Locked, Closed)
        )
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Familia de la billetera, derivada de la divisa (nunca se almacena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletType {
    Fiat,
    Crypto,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fiat => "FIAT",
            Self::Crypto => "CRYPTO",
        }
    }
}

/// Modelo de Entidad: Wallet.
/// Agregado que posee los saldos de un usuario en una divisa fija y aplica
/// los invariantes por billetera, con optimistic locking por `version`.
///
/// # Examples
/// ```
/// use ledger_service::domain::entities::Wallet;
/// use ledger_service::domain::money::{Currency, Money};
/// use ledger_service::domain::types::UserId;
///
/// let mut wallet = Wallet::new(
///     UserId::new(),
///     Currency::Usd,
///     Money::zero(Currency::Usd),
///     Money::zero(Currency::Usd),
/// )
/// .unwrap();
/// wallet.credit(Money::parse("100.00", Currency::Usd).unwrap()).unwrap();
/// assert_eq!(wallet.available_balance().to_string(), "100.00 USD");
/// assert_eq!(wallet.version(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    id: WalletId,
    user_id: UserId, // FK -> User.id
    currency: Currency,
    status: WalletStatus,
    available_balance: Money,
    pending_balance: Money,
    daily_limit: Money,
    monthly_limit: Money,
    version: i32, // Optimistic Locking
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Crea una billetera ACTIVE con saldos en cero y versión 0.
    ///
    /// Los límites deben venir en la divisa de la billetera (use
    /// `Money::zero` para "sin límite").
    pub fn new(
        user_id: UserId,
        currency: Currency,
        daily_limit: Money,
        monthly_limit: Money,
    ) -> Result<Self, DomainError> {
        Self::ensure_wallet_currency(currency, &daily_limit)?;
        Self::ensure_wallet_currency(currency, &monthly_limit)?;

        let now = Utc::now();
        Ok(Self {
            id: WalletId::new(),
            user_id,
            currency,
            status: WalletStatus::Active,
            available_balance: Money::zero(currency),
            pending_balance: Money::zero(currency),
            daily_limit,
            monthly_limit,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstruye una billetera cargada desde la persistencia.
    ///
    /// No re-aplica invariantes que ya se validaron al mutar (una billetera
    /// SUSPENDED con saldo es estado legítimo), pero sí exige que todas las
    /// divisas coincidan y que la versión no sea negativa.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: WalletId,
        user_id: UserId,
        currency: Currency,
        status: WalletStatus,
        available_balance: Money,
        pending_balance: Money,
        daily_limit: Money,
        monthly_limit: Money,
        version: i32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Self::ensure_wallet_currency(currency, &available_balance)?;
        Self::ensure_wallet_currency(currency, &pending_balance)?;
        Self::ensure_wallet_currency(currency, &daily_limit)?;
        Self::ensure_wallet_currency(currency, &monthly_limit)?;
        if version < 0 {
            return Err(DomainError::Validation(format!(
                "wallet version cannot be negative: {version}"
            )));
        }

        Ok(Self {
            id,
            user_id,
            currency,
            status,
            available_balance,
            pending_balance,
            daily_limit,
            monthly_limit,
            version,
            created_at,
            updated_at,
        })
    }

    fn ensure_wallet_currency(currency: Currency, money: &Money) -> Result<(), DomainError> {
        if money.currency() != currency {
            return Err(DomainError::CurrencyMismatch {
                expected: currency.code().to_string(),
                actual: money.currency().code().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_active(&self, operation: &str) -> Result<(), DomainError> {
        if self.status != WalletStatus::Active {
            return Err(DomainError::BusinessRuleViolation(format!(
                "cannot {operation} wallet {} while {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Cada mutación exitosa sube la versión exactamente en uno y refresca
    /// el timestamp de actualización.
    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Abona al saldo disponible. Requiere status ACTIVE y divisa igual.
    pub fn credit(&mut self, amount: Money) -> Result<(), DomainError> {
        Self::ensure_wallet_currency(self.currency, &amount)?;
        self.ensure_active("credit")?;

        self.available_balance = self.available_balance.add(&amount)?;
        self.touch();
        Ok(())
    }

    /// Carga contra el saldo disponible. Requiere status ACTIVE, divisa
    /// igual y fondos suficientes.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        Self::ensure_wallet_currency(self.currency, &amount)?;
        self.ensure_active("debit")?;

        if self.available_balance.compare(&amount)? == Ordering::Less {
            return Err(DomainError::InsufficientBalance {
                wallet_id: self.id.to_string(),
                available: self.available_balance.to_string(),
                requested: amount.to_string(),
            });
        }

        self.available_balance = self.available_balance.subtract(&amount)?;
        self.touch();
        Ok(())
    }

    /// Aplica una transición de estado según la tabla de `WalletStatus`.
    pub fn update_status(&mut self, new_status: WalletStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: new_status.to_string(),
            });
        }
        self.status = new_status;
        self.touch();
        Ok(())
    }

    /// Reemplaza los límites diario y mensual. No permitido en CLOSED.
    pub fn update_limits(&mut self, daily: Money, monthly: Money) -> Result<(), DomainError> {
        if self.status == WalletStatus::Closed {
            return Err(DomainError::BusinessRuleViolation(format!(
                "cannot update limits of closed wallet {}",
                self.id
            )));
        }
        Self::ensure_wallet_currency(self.currency, &daily)?;
        Self::ensure_wallet_currency(self.currency, &monthly)?;

        self.daily_limit = daily;
        self.monthly_limit = monthly;
        self.touch();
        Ok(())
    }

    /// Saldo total derivado (disponible + pendiente); nunca se almacena.
    pub fn total_balance(&self) -> Result<Money, DomainError> {
        self.available_balance.add(&self.pending_balance)
    }

    pub fn wallet_type(&self) -> WalletType {
        if self.currency.is_crypto() {
            WalletType::Crypto
        } else {
            WalletType::Fiat
        }
    }

    pub fn id(&self) -> WalletId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> WalletStatus {
        self.status
    }

    pub fn available_balance(&self) -> Money {
        self.available_balance
    }

    pub fn pending_balance(&self) -> Money {
        self.pending_balance
    }

    pub fn daily_limit(&self) -> Money {
        self.daily_limit
    }

    pub fn monthly_limit(&self) -> Money {
        self.monthly_limit
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn usd_wallet() -> Wallet {
        Wallet::new(
            UserId::new(),
            Currency::Usd,
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
        )
        .unwrap()
    }

    fn usd(raw: &str) -> Money {
        Money::parse(raw, Currency::Usd).unwrap()
    }

    #[test]
    fn test_new_wallet_starts_empty_and_active() {
        let wallet = usd_wallet();
        assert_eq!(wallet.status(), WalletStatus::Active);
        assert!(wallet.available_balance().is_zero());
        assert!(wallet.pending_balance().is_zero());
        assert_eq!(wallet.version(), 0);
        assert_eq!(wallet.wallet_type(), WalletType::Fiat);
    }

    #[test]
    fn test_crypto_wallet_type_derives_from_currency() {
        let wallet = Wallet::new(
            UserId::new(),
            Currency::Btc,
            Money::zero(Currency::Btc),
            Money::zero(Currency::Btc),
        )
        .unwrap();
        assert_eq!(wallet.wallet_type(), WalletType::Crypto);
    }

    #[test]
    fn test_credit_updates_balance_and_version() {
        let mut wallet = usd_wallet();
        wallet.credit(usd("100.50")).unwrap();
        assert_eq!(wallet.available_balance(), usd("100.50"));
        assert_eq!(wallet.version(), 1);

        wallet.credit(usd("0.50")).unwrap();
        assert_eq!(wallet.available_balance(), usd("101.00"));
        assert_eq!(wallet.version(), 2);
    }

    #[test]
    fn test_debit_of_exact_balance_reaches_zero() {
        let mut wallet = usd_wallet();
        wallet.credit(usd("75.25")).unwrap();
        wallet.debit(usd("75.25")).unwrap();
        assert!(wallet.available_balance().is_zero());
    }

    #[test]
    fn test_debit_beyond_balance_is_insufficient() {
        let mut wallet = usd_wallet();
        wallet.credit(usd("100.00")).unwrap();
        let result = wallet.debit(usd("100.01"));
        assert!(matches!(
            result,
            Err(DomainError::InsufficientBalance { .. })
        ));
        // El fallo no muta el agregado.
        assert_eq!(wallet.available_balance(), usd("100.00"));
        assert_eq!(wallet.version(), 1);
    }

    #[test]
    fn test_operations_reject_foreign_currency() {
        let mut wallet = usd_wallet();
        let eur = Money::parse("10.00", Currency::Eur).unwrap();
        assert!(matches!(
            wallet.credit(eur),
            Err(DomainError::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            wallet.debit(eur),
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }

    #[rstest]
    #[case(WalletStatus::Suspended)]
    #[case(WalletStatus::Locked)]
    #[case(WalletStatus::Closed)]
    fn test_credit_and_debit_require_active(#[case] status: WalletStatus) {
        let mut wallet = usd_wallet();
        wallet.credit(usd("50.00")).unwrap();
        wallet.update_status(status).unwrap();

        assert!(matches!(
            wallet.credit(usd("1.00")),
            Err(DomainError::BusinessRuleViolation(_))
        ));
        assert!(matches!(
            wallet.debit(usd("1.00")),
            Err(DomainError::BusinessRuleViolation(_))
        ));
    }

    #[rstest]
    #[case(WalletStatus::Active, WalletStatus::Suspended, true)]
    #[case(WalletStatus::Active, WalletStatus::Locked, true)]
    #[case(WalletStatus::Active, WalletStatus::Closed, true)]
    #[case(WalletStatus::Suspended, WalletStatus::Active, true)]
    #[case(WalletStatus::Suspended, WalletStatus::Closed, true)]
    #[case(WalletStatus::Suspended, WalletStatus::Locked, false)]
    #[case(WalletStatus::Locked, WalletStatus::Active, true)]
    #[case(WalletStatus::Locked, WalletStatus::Closed, true)]
    #[case(WalletStatus::Locked, WalletStatus::Suspended, false)]
    #[case(WalletStatus::Closed, WalletStatus::Active, false)]
    #[case(WalletStatus::Closed, WalletStatus::Suspended, false)]
    #[case(WalletStatus::Active, WalletStatus::Active, false)]
    fn test_status_transition_table(
        #[case] from: WalletStatus,
        #[case] to: WalletStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_closed_wallet_rejects_all_mutation() {
        let mut wallet = usd_wallet();
        wallet.update_status(WalletStatus::Closed).unwrap();

        assert!(wallet.update_status(WalletStatus::Active).is_err());
        assert!(wallet.credit(usd("1.00")).is_err());
        assert!(wallet
            .update_limits(usd("10.00"), usd("100.00"))
            .is_err());
    }

    #[test]
    fn test_update_limits_checks_currency_and_bumps_version() {
        let mut wallet = usd_wallet();
        wallet.update_limits(usd("500.00"), usd("5000.00")).unwrap();
        assert_eq!(wallet.daily_limit(), usd("500.00"));
        assert_eq!(wallet.monthly_limit(), usd("5000.00"));
        assert_eq!(wallet.version(), 1);

        let btc = Money::parse("1", Currency::Btc).unwrap();
        assert!(matches!(
            wallet.update_limits(btc, btc),
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_total_balance_is_derived() {
        let mut wallet = usd_wallet();
        wallet.credit(usd("60.00")).unwrap();
        assert_eq!(wallet.total_balance().unwrap(), usd("60.00"));
    }

    #[test]
    fn test_reconstitute_rejects_mixed_currencies_and_bad_version() {
        let now = Utc::now();
        let eur = Money::zero(Currency::Eur);
        let result = Wallet::reconstitute(
            WalletId::new(),
            UserId::new(),
            Currency::Usd,
            WalletStatus::Active,
            eur,
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
            3,
            now,
            now,
        );
        assert!(matches!(result, Err(DomainError::CurrencyMismatch { .. })));

        let result = Wallet::reconstitute(
            WalletId::new(),
            UserId::new(),
            Currency::Usd,
            WalletStatus::Active,
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
            -1,
            now,
            now,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_reconstitute_keeps_persisted_state_as_is() {
        let now = Utc::now();
        let wallet = Wallet::reconstitute(
            WalletId::new(),
            UserId::new(),
            Currency::Usd,
            WalletStatus::Suspended,
            usd("10.00"),
            usd("5.00"),
            Money::zero(Currency::Usd),
            Money::zero(Currency::Usd),
            7,
            now,
            now,
        )
        .unwrap();
        assert_eq!(wallet.status(), WalletStatus::Suspended);
        assert_eq!(wallet.version(), 7);
        assert_eq!(wallet.total_balance().unwrap(), usd("15.00"));
    }
}
