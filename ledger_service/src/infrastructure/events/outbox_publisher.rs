use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::events::{DomainEvent, EventEnvelope};
use crate::domain::publisher::EventPublisher;
use crate::domain::uow::UowSession;
use crate::infrastructure::persistence::uow::{is_transient, pg_conn};

/// Publicador de eventos con patrón outbox.
///
/// Cada evento se inserta en la tabla `events` usando la misma transacción
/// del Unit-of-Work: si el caso de uso revierte, la fila desaparece con él y
/// ningún evento es observable. Un proceso aparte drena la tabla hacia el
/// broker; de ahí la garantía at-least-once para los consumidores.
pub struct OutboxEventPublisher;

impl OutboxEventPublisher {
    pub fn new() -> Self {
        Self
    }

    async fn insert(
        &self,
        session: &mut dyn UowSession,
        event: DomainEvent,
    ) -> Result<(), DomainError> {
        let envelope = EventEnvelope::new(event);
        let payload = serde_json::to_value(&envelope.event).map_err(|e| DomainError::Publisher {
            message: format!("event serialization failed: {e}"),
            retryable: false,
        })?;

        let conn = pg_conn(session)?;
        sqlx::query(
            r#"
            INSERT INTO events (id, aggregate_id, name, payload, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(envelope.event_id)
        .bind(envelope.aggregate_id())
        .bind(envelope.name())
        .bind(payload)
        .bind(envelope.occurred_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| DomainError::Publisher {
            retryable: is_transient(&e),
            message: e.to_string(),
        })?;

        Ok(())
    }
}

impl Default for OutboxEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for OutboxEventPublisher {
    async fn publish(
        &self,
        session: &mut dyn UowSession,
        event: DomainEvent,
    ) -> Result<(), DomainError> {
        self.insert(session, event).await
    }

    /// Todo-o-nada a nivel de llamada: el primer fallo corta el lote, el
    /// error sube y el Unit-of-Work revierte también lo ya insertado.
    async fn publish_batch(
        &self,
        session: &mut dyn UowSession,
        events: Vec<DomainEvent>,
    ) -> Result<(), DomainError> {
        for event in events {
            self.insert(session, event).await?;
        }
        Ok(())
    }
}
