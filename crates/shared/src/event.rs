//! Domain event envelope and publisher port
//!
//! Events are fire-and-forget: a failed publish is logged by the caller and
//! never rolls back the state change that triggered it. Delivery is therefore
//! best-effort; consumers (notification and report services) must tolerate
//! missing events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON envelope shared by every domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub version: String,
    pub aggregate_id: String,
    pub tenant_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl DomainEvent {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl ToString,
        tenant_id: impl ToString,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            version: "1.0".to_string(),
            aggregate_id: aggregate_id.to_string(),
            tenant_id: tenant_id.to_string(),
            occurred_at: Utc::now(),
            payload: Map::new(),
        }
    }

    /// Attach a payload field. Values that fail to serialize are dropped;
    /// the envelope itself must never fail to build.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.payload.insert(key.to_string(), v);
        }
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("event transport failed: {0}")]
    Transport(String),
}

/// Fire-and-forget domain event sink
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;

    async fn publish_batch(&self, events: &[DomainEvent]) -> Result<(), PublishError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// Publisher that writes events to the tracing log. Default sink for
/// deployments without a broker.
#[derive(Debug, Default, Clone)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let body = event.to_json()?;
        tracing::debug!(
            event_type = %event.event_type,
            tenant_id = %event.tenant_id,
            %body,
            "domain event published"
        );
        Ok(())
    }
}

/// Publisher that captures events in memory, for tests and local tooling
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: std::sync::Mutex<Vec<DomainEvent>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event types in publish order
    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|_| PublishError::Transport("publisher mutex poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Publisher that fails every publish, for exercising the swallow-and-log path
#[derive(Debug, Default, Clone)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &DomainEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport("publisher unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let event = DomainEvent::new("subscription.created", "sub-1", "tenant-1")
            .with("plan_id", "plan-9")
            .with("trial_days", 7);

        let json: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "subscription.created");
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["aggregate_id"], "sub-1");
        assert_eq!(json["tenant_id"], "tenant-1");
        assert_eq!(json["plan_id"], "plan-9");
        assert_eq!(json["trial_days"], 7);
        assert!(json["occurred_at"].is_string());
    }

    #[tokio::test]
    async fn test_memory_publisher_captures_in_order() {
        let publisher = MemoryPublisher::new();
        publisher
            .publish(&DomainEvent::new("tenant.created", "t1", "t1"))
            .await
            .unwrap();
        publisher
            .publish(&DomainEvent::new("tenant.activated", "t1", "t1"))
            .await
            .unwrap();

        assert_eq!(
            publisher.event_types(),
            vec!["tenant.created", "tenant.activated"]
        );
    }
}
