//! Service layer: orchestration over the stores, event emission included

mod quota;
mod subscription;
mod tenant;

pub use quota::QuotaService;
pub use subscription::SubscriptionService;
pub use tenant::{CreateTenant, TenantService, UpdateTenant};

use advoca_shared::{DomainEvent, EventPublisher};

/// Event publishing never fails a command. Transport problems are logged and
/// the mutation stands.
pub(crate) async fn publish_best_effort(publisher: &dyn EventPublisher, event: DomainEvent) {
    if let Err(e) = publisher.publish(&event).await {
        tracing::warn!(
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            error = %e,
            "failed to publish domain event"
        );
    }
}
