use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::types::UserId;

/// Estado de verificación de identidad del usuario.
///
/// El núcleo transaccional solo consulta el predicado `is_approved`; el flujo
/// de verificación en sí vive fuera de este servicio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "kyc_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Modelo de Entidad: User.
/// Representa a un usuario dentro del sistema, con su identidad básica y el
/// estado KYC que condiciona la emisión de billeteras.
///
/// # Examples
/// ```
/// use ledger_service::domain::entities::User;
///
/// let user = User::new("johndoe".to_string(), "john@example.com".to_string()).unwrap();
/// assert_eq!(user.username(), "johndoe");
/// assert!(!user.is_kyc_approved());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String, // Unique
    email: String,    // Unique
    kyc_status: KycStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Inicializa una nueva instancia válida de `User` con KYC pendiente.
    pub fn new(username: String, email: String) -> Result<Self, DomainError> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(DomainError::Validation(
                "username and email cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: UserId::new(),
            username,
            email,
            kyc_status: KycStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstruye una instancia de `User` desde los datos persistidos.
    /// Constructor cerrado para la capa de persistencia; re-valida lo mínimo
    /// que podría haberse corrompido en la base de datos.
    pub fn reconstitute(
        id: UserId,
        username: String,
        email: String,
        kyc_status: KycStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(DomainError::Validation(
                "username and email cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            username,
            email,
            kyc_status,
            created_at,
            updated_at,
        })
    }

    pub fn approve_kyc(&mut self) {
        self.kyc_status = KycStatus::Approved;
        self.updated_at = Utc::now();
    }

    pub fn reject_kyc(&mut self) {
        self.kyc_status = KycStatus::Rejected;
        self.updated_at = Utc::now();
    }

    /// El único predicado de identidad que el núcleo consulta.
    pub fn is_kyc_approved(&self) -> bool {
        self.kyc_status.is_approved()
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn kyc_status(&self) -> KycStatus {
        self.kyc_status
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

    #[test]
    fn test_new_user_starts_with_pending_kyc() {
        let user = User::new("alice".to_string(), "alice@example.com".to_string()).unwrap();
        assert_eq!(user.kyc_status(), KycStatus::Pending);
        assert!(!user.is_kyc_approved());
    }

    #[test]
    fn test_new_user_rejects_blank_fields() {
        assert!(User::new("".to_string(), "a@b.com".to_string()).is_err());
        assert!(User::new("alice".to_string(), "   ".to_string()).is_err());
    }

    #[test]
    fn test_kyc_approval_flips_the_predicate() {
        let mut user = User::new("bob".to_string(), "bob@example.com".to_string()).unwrap();
        user.approve_kyc();
        assert!(user.is_kyc_approved());

        user.reject_kyc();
        assert!(!user.is_kyc_approved());
        assert_eq!(user.kyc_status(), KycStatus::Rejected);
    }
}
