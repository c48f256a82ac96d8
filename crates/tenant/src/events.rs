//! Domain event constructors for the tenant side
//!
//! Every mutation that downstream consumers care about gets an event. The
//! envelope shape lives in `advoca_shared::event`; this module only fills in
//! the per-event payloads.

use serde_json::json;

use advoca_shared::DomainEvent;

use crate::quota::QuotaCheck;
use crate::subscription::Subscription;
use crate::tenant::Tenant;

pub fn tenant_created(tenant: &Tenant) -> DomainEvent {
    DomainEvent::new("tenant.created", tenant.id.to_string(), tenant.id)
        .with("name", json!(tenant.name))
        .with("email", json!(tenant.email))
        .with("plan_type", json!(tenant.plan_type.to_string()))
}

pub fn tenant_activated(tenant: &Tenant) -> DomainEvent {
    DomainEvent::new("tenant.activated", tenant.id.to_string(), tenant.id)
}

pub fn tenant_suspended(tenant: &Tenant, reason: &str) -> DomainEvent {
    DomainEvent::new("tenant.suspended", tenant.id.to_string(), tenant.id)
        .with("reason", json!(reason))
}

pub fn tenant_canceled(tenant: &Tenant) -> DomainEvent {
    DomainEvent::new("tenant.canceled", tenant.id.to_string(), tenant.id)
}

pub fn subscription_created(subscription: &Subscription) -> DomainEvent {
    DomainEvent::new(
        "subscription.created",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
    .with("plan_id", json!(subscription.plan_id.to_string()))
    .with("status", json!(subscription.status.to_string()))
    .with(
        "billing_interval",
        json!(subscription.billing_interval.to_string()),
    )
}

pub fn subscription_activated(subscription: &Subscription) -> DomainEvent {
    DomainEvent::new(
        "subscription.activated",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
    .with("plan_id", json!(subscription.plan_id.to_string()))
}

pub fn subscription_canceled(subscription: &Subscription, at_period_end: bool) -> DomainEvent {
    DomainEvent::new(
        "subscription.canceled",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
    .with("at_period_end", json!(at_period_end))
}

pub fn subscription_reactivated(subscription: &Subscription) -> DomainEvent {
    DomainEvent::new(
        "subscription.reactivated",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
}

pub fn subscription_renewed(subscription: &Subscription) -> DomainEvent {
    DomainEvent::new(
        "subscription.renewed",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
    .with(
        "period_start",
        json!(subscription.current_period_start.to_rfc3339()),
    )
    .with(
        "period_end",
        json!(subscription.current_period_end.to_rfc3339()),
    )
}

pub fn subscription_plan_changed(
    subscription: &Subscription,
    old_plan_id: &str,
) -> DomainEvent {
    DomainEvent::new(
        "subscription.plan_changed",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
    .with("old_plan_id", json!(old_plan_id))
    .with("new_plan_id", json!(subscription.plan_id.to_string()))
}

pub fn subscription_past_due(subscription: &Subscription) -> DomainEvent {
    DomainEvent::new(
        "subscription.past_due",
        subscription.id.to_string(),
        subscription.tenant_id,
    )
    .with("payment_failures", json!(subscription.payment_failures))
}

pub fn tenant_updated(tenant: &Tenant) -> DomainEvent {
    DomainEvent::new("tenant.updated", tenant.id.to_string(), tenant.id)
        .with("name", json!(tenant.name))
}

pub fn quota_warning(check: &QuotaCheck, tenant_id: advoca_shared::TenantId) -> DomainEvent {
    DomainEvent::new("tenant.quota_warning", tenant_id.to_string(), tenant_id)
        .with("quota_type", json!(check.kind.to_string()))
        .with("current_usage", json!(check.current))
        .with("limit", json!(check.limit))
        .with("percentage", json!(check.percentage))
        .with("threshold", json!(80))
}

pub fn quota_exceeded(check: &QuotaCheck, tenant_id: advoca_shared::TenantId) -> DomainEvent {
    DomainEvent::new("tenant.quota_exceeded", tenant_id.to_string(), tenant_id)
        .with("quota_type", json!(check.kind.to_string()))
        .with("current_usage", json!(check.current))
        .with("limit", json!(check.limit))
        .with("percentage", json!(check.percentage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use advoca_shared::{BillingInterval, PlanId, TenantId};

    #[test]
    fn test_subscription_created_payload() {
        let sub = Subscription::new(TenantId::new(), PlanId::new(), BillingInterval::Monthly, 15);
        let event = subscription_created(&sub);
        assert_eq!(event.event_type, "subscription.created");
        assert_eq!(event.aggregate_id, sub.id.to_string());
        assert_eq!(event.payload["status"], "trialing");
        assert_eq!(event.payload["billing_interval"], "monthly");
    }

    #[test]
    fn test_quota_exceeded_payload() {
        let tenant_id = TenantId::new();
        let check = QuotaCheck::evaluate(crate::quota::QuotaKind::Users, 5, 5);
        let event = quota_exceeded(&check, tenant_id);
        assert_eq!(event.event_type, "tenant.quota_exceeded");
        assert_eq!(event.payload["quota_type"], "users");
        assert_eq!(event.payload["current_usage"], 5);
    }
}
