use thiserror::Error;

/// Taxonomía unificada de errores del dominio.
///
/// Todos los fallos del núcleo transaccional se expresan con este tipo; los
/// predicados de clasificación (`is_*`) permiten a la capa de entrega y a la
/// política de reintentos decidir sin inspeccionar variantes una por una.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Entrada malformada antes de entrar al dominio (UUID inválido, monto
    /// no numérico, enum desconocido). Nunca implica cambio de estado.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Estructuralmente válido pero prohibido por política de negocio
    /// (auto-transferencia, wallet duplicada, cancelar una completada...).
    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("insufficient balance in wallet {wallet_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        wallet_id: String,
        available: String,
        requested: String,
    },

    /// Resta de dinero cuyo resultado sería negativo (nivel valor, no wallet).
    #[error("insufficient amount: cannot subtract {subtrahend} from {minuend}")]
    InsufficientAmount { minuend: String, subtrahend: String },

    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// Conflicto de versión en optimistic locking. Siempre reintentable.
    #[error("concurrent modification of {entity} {id}: stale version")]
    Concurrency { entity: &'static str, id: String },

    #[error("repository error: {message}")]
    Repository { message: String, retryable: bool },

    #[error("event publisher error: {message}")]
    Publisher { message: String, retryable: bool },

    /// Comodín con código estable para fallos que no encajan en la taxonomía.
    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

impl DomainError {
    /// Error de repositorio no reintentable (el caso común).
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::Other {
            code: "NOT_IMPLEMENTED".to_string(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_business_rule_violation(&self) -> bool {
        matches!(self, Self::BusinessRuleViolation(_))
    }

    pub fn is_concurrency_error(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }

    /// Decide si el llamador debe reintentar la operación completa.
    ///
    /// Solo los conflictos de concurrencia y los fallos de infraestructura
    /// marcados explícitamente se consideran transitorios; todo lo demás es
    /// determinista y reintentar no cambiaría el resultado.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Concurrency { .. } => true,
            Self::Repository { retryable, .. } | Self::Publisher { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_is_retryable() {
        let err = DomainError::Concurrency {
            entity: "wallet",
            id: "w-1".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.is_concurrency_error());
    }

    #[test]
    fn test_infrastructure_errors_follow_their_flag() {
        let transient = DomainError::Repository {
            message: "connection reset".to_string(),
            retryable: true,
        };
        let permanent = DomainError::repository("constraint violated");
        assert!(transient.is_retryable());
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_business_failures_are_not_retryable() {
        let errors = [
            DomainError::Validation("bad input".to_string()),
            DomainError::BusinessRuleViolation("self transfer".to_string()),
            DomainError::InvalidStatusTransition {
                from: "COMPLETED".to_string(),
                to: "PROCESSING".to_string(),
            },
            DomainError::InsufficientBalance {
                wallet_id: "w-1".to_string(),
                available: "1.00 USD".to_string(),
                requested: "2.00 USD".to_string(),
            },
            DomainError::CurrencyMismatch {
                expected: "USD".to_string(),
                actual: "EUR".to_string(),
            },
        ];
        for err in errors {
            assert!(!err.is_retryable(), "{err} should not be retryable");
        }
    }

    #[test]
    fn test_classification_predicates() {
        assert!(DomainError::Validation("x".to_string()).is_validation());
        assert!(DomainError::NotFound {
            entity: "user",
            id: "u-1".to_string()
        }
        .is_not_found());
        assert!(DomainError::BusinessRuleViolation("x".to_string()).is_business_rule_violation());
    }
}
