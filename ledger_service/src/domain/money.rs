use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Divisa soportada por el sistema.
///
/// El conjunto es cerrado: cualquier código fuera de la lista blanca se
/// rechaza en la frontera. La escala decimal queda fijada por la familia
/// (fiat → 2, crypto → 8) y gobierna el render y las unidades menores.
///
/// # Examples
/// ```
/// use ledger_service::domain::money::Currency;
///
/// let currency = Currency::parse(" usd ").unwrap();
/// assert_eq!(currency, Currency::Usd);
/// assert!(currency.is_fiat());
/// assert_eq!(currency.decimal_places(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Btc,
    Eth,
    Usdt,
    Usdc,
}

impl Currency {
    /// Normaliza (trim + mayúsculas) y valida contra la lista blanca.
    pub fn parse(code: &str) -> Result<Self, DomainError> {
        match code.trim().to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "BTC" => Ok(Self::Btc),
            "ETH" => Ok(Self::Eth),
            "USDT" => Ok(Self::Usdt),
            "USDC" => Ok(Self::Usdc),
            other => Err(DomainError::Validation(format!(
                "unsupported currency code: {other}"
            ))),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Usdt => "USDT",
            Self::Usdc => "USDC",
        }
    }

    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::Btc | Self::Eth | Self::Usdt | Self::Usdc)
    }

    pub fn is_fiat(&self) -> bool {
        !self.is_crypto()
    }

    /// Escala fija: centavos para fiat, satoshis (o equivalente) para crypto.
    pub fn decimal_places(&self) -> u32 {
        if self.is_crypto() {
            8
        } else {
            2
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Cantidad monetaria exacta, siempre no negativa, etiquetada con su divisa.
///
/// Un valor negativo es irrepresentable: los constructores lo rechazan y
/// `subtract` falla antes de producirlo. Toda la aritmética exige divisas
/// iguales y devuelve un valor nuevo.
///
/// # Examples
/// ```
/// use ledger_service::domain::money::{Currency, Money};
///
/// let a = Money::parse("250.50", Currency::Usd).unwrap();
/// let b = Money::parse("100.00", Currency::Usd).unwrap();
/// let total = a.add(&b).unwrap();
/// assert_eq!(total.to_string(), "350.50 USD");
/// assert_eq!(total.cents(), 35050);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMoney", into = "RawMoney")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

/// Forma serializada de `Money`; la deserialización pasa por `Money::new`
/// para que el invariante de no-negatividad sobreviva el round-trip.
#[derive(Serialize, Deserialize)]
struct RawMoney {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<RawMoney> for Money {
    type Error = DomainError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, raw.currency)
    }
}

impl From<Money> for RawMoney {
    fn from(money: Money) -> Self {
        Self {
            amount: money.amount,
            currency: money.currency,
        }
    }
}

impl Money {
    /// Construye desde un `Decimal` ya parseado. Rechaza negativos.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, DomainError> {
        if amount.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "money amount cannot be negative: {amount}"
            )));
        }
        Ok(Self { amount, currency })
    }

    /// Construye desde la representación decimal en texto ("250.50").
    pub fn parse(raw: &str, currency: Currency) -> Result<Self, DomainError> {
        let amount = Decimal::from_str(raw.trim())
            .map_err(|_| DomainError::Validation(format!("invalid money amount: {raw}")))?;
        Self::new(amount, currency)
    }

    /// Construye desde unidades mayores enteras (dólares, bitcoins).
    pub fn from_major_units(units: u64, currency: Currency) -> Self {
        Self {
            amount: Decimal::from(units),
            currency,
        }
    }

    /// Construye desde unidades menores (centavos/satoshis) según la escala
    /// de la divisa.
    pub fn from_minor_units(units: u64, currency: Currency) -> Self {
        Self {
            amount: Decimal::from_i128_with_scale(units as i128, currency.decimal_places()),
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    fn ensure_same_currency(&self, other: &Self) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: other.currency.code().to_string(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self, DomainError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| DomainError::Validation("money amount overflow".to_string()))?;
        Ok(Self {
            amount,
            currency: self.currency,
        })
    }

    /// Resta `other`; falla con `InsufficientAmount` si el resultado sería
    /// negativo, manteniendo irrepresentable el dinero negativo.
    pub fn subtract(&self, other: &Self) -> Result<Self, DomainError> {
        self.ensure_same_currency(other)?;
        if self.amount < other.amount {
            return Err(DomainError::InsufficientAmount {
                minuend: self.to_string(),
                subtrahend: other.to_string(),
            });
        }
        Ok(Self {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    /// Multiplica por un factor racional no negativo (comisiones, prorrateos).
    pub fn multiply(&self, factor: Decimal) -> Result<Self, DomainError> {
        if factor.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "multiplication factor cannot be negative: {factor}"
            )));
        }
        let amount = self
            .amount
            .checked_mul(factor)
            .ok_or_else(|| DomainError::Validation("money amount overflow".to_string()))?;
        Ok(Self {
            amount,
            currency: self.currency,
        })
    }

    /// Comparación total entre montos de la misma divisa.
    pub fn compare(&self, other: &Self) -> Result<Ordering, DomainError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Proyección exacta a unidades menores: multiplica por 10^escala y toma
    /// el cociente entero (truncado hacia cero). Opera sobre la mantisa para
    /// que el cálculo sea total incluso cerca de los límites del tipo.
    pub fn cents(&self) -> i128 {
        let mantissa = self.amount.mantissa();
        let scale = self.amount.scale();
        let target = self.currency.decimal_places();
        if scale <= target {
            mantissa * 10i128.pow(target - scale)
        } else {
            mantissa / 10i128.pow(scale - target)
        }
    }
}

impl fmt::Display for Money {
    /// Render determinista `"<decimal> <code>"` a la escala fija de la
    /// divisa. La precisión sobrante (posible tras `multiply`) se trunca
    /// hacia cero, en acuerdo con `cents()`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = self.currency.decimal_places();
        let truncated = self
            .amount
            .round_dp_with_strategy(places, RoundingStrategy::ToZero);
        write!(
            f,
            "{:.*} {}",
            places as usize,
            truncated,
            self.currency.code()
        )
    }
}
