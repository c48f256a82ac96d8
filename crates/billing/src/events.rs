//! Domain event constructors for the billing side

use serde_json::json;

use advoca_shared::DomainEvent;

use crate::customer::Customer;
use crate::payment::Payment;

pub fn payment_created(payment: &Payment) -> DomainEvent {
    DomainEvent::new("payment.created", payment.id.to_string(), payment.tenant_id)
        .with("subscription_id", json!(payment.subscription_id.to_string()))
        .with("amount", json!(payment.amount))
        .with("currency", json!(payment.currency))
        .with("method", json!(payment.method.to_string()))
        .with("due_date", json!(payment.due_date.to_rfc3339()))
}

pub fn payment_success(payment: &Payment) -> DomainEvent {
    DomainEvent::new("payment.success", payment.id.to_string(), payment.tenant_id)
        .with("subscription_id", json!(payment.subscription_id.to_string()))
        .with("amount", json!(payment.amount))
        .with("transaction_id", json!(payment.transaction_id))
}

pub fn payment_failed(payment: &Payment) -> DomainEvent {
    DomainEvent::new("payment.failed", payment.id.to_string(), payment.tenant_id)
        .with("subscription_id", json!(payment.subscription_id.to_string()))
        .with("reason", json!(payment.failure_reason))
        .with("retry_count", json!(payment.retry_count))
        .with("will_retry", json!(payment.can_retry()))
        .with(
            "next_retry_at",
            json!(payment.next_retry_at.map(|at| at.to_rfc3339())),
        )
}

pub fn payment_refunded(payment: &Payment) -> DomainEvent {
    DomainEvent::new("payment.refunded", payment.id.to_string(), payment.tenant_id)
        .with("amount", json!(payment.refund_amount))
}

pub fn customer_created(customer: &Customer) -> DomainEvent {
    DomainEvent::new(
        "customer.created",
        customer.id.to_string(),
        customer.tenant_id,
    )
    .with("email", json!(customer.email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentMethod;
    use advoca_shared::{SubscriptionId, TenantId};

    #[test]
    fn test_failed_event_carries_retry_metadata() {
        let mut payment = Payment::new(
            TenantId::new(),
            SubscriptionId::new(),
            9_900,
            "BRL",
            PaymentMethod::CreditCard,
            "Advoca Starter - monthly",
        );
        payment.mark_failed("card declined").unwrap();
        let event = payment_failed(&payment);
        assert_eq!(event.event_type, "payment.failed");
        assert_eq!(event.payload["retry_count"], 1);
        assert_eq!(event.payload["will_retry"], true);
        assert_eq!(event.payload["reason"], "card declined");
    }
}
