use async_trait::async_trait;
use std::any::Any;

use crate::domain::error::DomainError;

/// Frontera atómica de un caso de uso.
///
/// `begin` abre una transacción de almacenamiento y la entrega como sesión.
/// Los repositorios y el publicador de eventos reciben `&mut dyn UowSession`
/// y participan en esa misma transacción; una sesión de otro backend no
/// participa y debe rechazarse (ver `UowSession::as_any_mut`).
///
/// Contrato de los casos de uso: ejecutar todo el cuerpo con una sesión,
/// confirmar solo si el cuerpo terminó sin error y revertir en cualquier
/// otro caso. Las implementaciones deben revertir también cuando la sesión
/// se descarta sin confirmar (lo que cubre los panics del cuerpo).
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UowSession>, DomainError>;
}

/// Sesión ligada a una transacción de almacenamiento en curso.
#[async_trait]
pub trait UowSession: Send {
    /// Acceso al tipo concreto del backend. Los repositorios hacen downcast
    /// y devuelven un error de repositorio si la sesión es ajena.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
