use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::error::DomainError;
use crate::domain::events::DomainEvent;
use crate::domain::uow::UowSession;

/// Puerto de publicación de eventos de dominio.
///
/// La publicación ocurre dentro del Unit-of-Work: nada es observable aguas
/// abajo hasta que la transacción confirma, y la entrega final es
/// at-least-once (los consumidores deben ser idempotentes).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        event: DomainEvent,
    ) -> Result<(), DomainError>;

    /// Todo-o-nada a nivel de llamada: si algún evento no puede encolarse,
    /// la llamada falla completa y el Unit-of-Work que la envuelve revierte.
    async fn publish_batch<'a>(
        &self,
        session: &'a mut (dyn UowSession + 'a),
        events: Vec<DomainEvent>,
    ) -> Result<(), DomainError>;
}
