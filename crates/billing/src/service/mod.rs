//! Billing service layer

mod onboarding;
mod payment;

pub use onboarding::{
    is_free_trial, CardDetails, OnboardingRequest, OnboardingResult, OnboardingService,
    OnboardingStage,
};
pub use payment::{CreatePayment, PaymentService, PaymentStats};

use advoca_shared::{DomainEvent, EventPublisher};

/// Event publishing never fails a command; transport problems are logged
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
