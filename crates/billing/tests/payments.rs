//! Payment processing flows against mock gateways

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use advoca_billing::service::CreatePayment;
use advoca_billing::{BillingError, PaymentMethod, PaymentStatus};
use advoca_shared::{BillingInterval, PlanType, SubscriptionId, TenantId, UserId};
use advoca_tenant::service::CreateTenant;

use common::{world, World};

async fn onboarded_subscription(w: &World, method: PaymentMethod) -> (TenantId, SubscriptionId) {
    let tenant = w
        .tenants
        .create_tenant(CreateTenant {
            name: "Teixeira Advocacia".to_string(),
            legal_name: "Teixeira Advocacia Ltda".to_string(),
            document: "11222333000181".to_string(),
            email: "fin@teixeira.adv.br".to_string(),
            phone: "+5531977776666".to_string(),
            plan_type: PlanType::Professional,
            owner_user_id: UserId::new(),
        })
        .await
        .unwrap();

    let mut customer = advoca_billing::Customer::new(
        tenant.id,
        "Teixeira Advocacia Ltda",
        "fin@teixeira.adv.br",
        "11222333000181",
        "+5531977776666",
    );
    if !method.is_crypto() {
        customer.gateway_customer_id = Some(format!("cus_{}", tenant.id));
    }
    use advoca_billing::store::CustomerStore;
    w.customer_store.insert(&customer).await.unwrap();

    let subscription = w
        .subscriptions
        .create_subscription(
            tenant.id,
            w.plan_id(PlanType::Professional),
            BillingInterval::Monthly,
        )
        .await
        .unwrap();
    (tenant.id, subscription.id)
}

#[tokio::test]
async fn fiat_payment_settles_and_activates_subscription() {
    let w = world();
    let (tenant_id, subscription_id) = onboarded_subscription(&w, PaymentMethod::Boleto).await;

    let payment = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::Boleto,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);
    assert!(payment.fiat_payment_id.is_some());
    assert!(payment.invoice_id.is_some());
    assert_eq!(w.fiat.charges.lock().unwrap().len(), 1);

    let payment = w
        .payments
        .process_payment_success(payment.id, Some("txn_42".to_string()))
        .await
        .unwrap();
    assert!(payment.is_successful());

    let subscription = w
        .subscriptions
        .get_subscription(subscription_id)
        .await
        .unwrap();
    assert_eq!(subscription.payment_failures, 0);

    let stats = w.payments.payment_stats(tenant_id).await.unwrap();
    assert_eq!(stats.paid, 1);
    assert_eq!(stats.amount_paid, 29_900);
}

#[tokio::test]
async fn second_settlement_is_rejected() {
    let w = world();
    let (_, subscription_id) = onboarded_subscription(&w, PaymentMethod::Pix).await;

    let payment = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::Pix,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap();

    let first = w
        .payments
        .process_payment_success(payment.id, Some("txn_1".to_string()))
        .await
        .unwrap();
    let err = w
        .payments
        .process_payment_success(payment.id, Some("txn_2".to_string()))
        .await
        .unwrap_err();
    match err {
        BillingError::Conflict(msg) => assert_eq!(msg, "payment is already successful"),
        other => panic!("expected conflict, got {other}"),
    }

    // The first settlement stands untouched
    let stored = w.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(stored.paid_at, first.paid_at);
    assert_eq!(stored.transaction_id.as_deref(), Some("txn_1"));
    let success_events = w
        .publisher
        .event_types()
        .iter()
        .filter(|t| *t == "payment.success")
        .count();
    assert_eq!(success_events, 1);
}

#[tokio::test]
async fn gateway_rejection_marks_payment_failed() {
    let w = world();
    let (tenant_id, subscription_id) = onboarded_subscription(&w, PaymentMethod::CreditCard).await;
    w.fiat.fail_charges.store(true, Ordering::SeqCst);

    let err = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::CreditCard,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::Gateway(_)));

    // The audit row survives the gateway outage
    let payments = w.payments.payments_for_tenant(tenant_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert!(payments[0].next_retry_at.is_some());
}

#[tokio::test]
async fn three_failures_push_subscription_past_due() {
    let w = world();
    let (_, subscription_id) = onboarded_subscription(&w, PaymentMethod::CreditCard).await;
    w.subscriptions
        .activate_subscription(subscription_id)
        .await
        .unwrap();

    let payment = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::CreditCard,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap();

    w.payments
        .process_payment_failure(payment.id, "card declined")
        .await
        .unwrap();
    w.payments
        .process_payment_failure(payment.id, "card declined")
        .await
        .unwrap();
    let failed = w
        .payments
        .process_payment_failure(payment.id, "card declined")
        .await
        .unwrap();
    assert_eq!(failed.retry_count, 3);
    assert!(!failed.can_retry());
    assert!(failed.next_retry_at.is_none());

    let subscription = w
        .subscriptions
        .get_subscription(subscription_id)
        .await
        .unwrap();
    assert_eq!(
        subscription.status,
        advoca_tenant::SubscriptionStatus::PastDue
    );
    assert!(w
        .publisher
        .event_types()
        .contains(&"subscription.past_due".to_string()));
}

#[tokio::test]
async fn retry_sweep_redispatches_due_payments_and_skips_the_ceiling() {
    let w = world();
    let (_, subscription_id) = onboarded_subscription(&w, PaymentMethod::CreditCard).await;
    w.fiat.fail_charges.store(true, Ordering::SeqCst);

    let failed = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::CreditCard,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap_err();
    drop(failed);
    w.fiat.fail_charges.store(false, Ordering::SeqCst);

    use advoca_billing::store::PaymentStore;
    let mut payment = w
        .payments
        .payments_for_subscription(subscription_id)
        .await
        .unwrap()
        .remove(0);

    // Backoff not elapsed yet: nothing is due
    assert_eq!(w.payments.retry_failed_payments().await.unwrap(), 0);

    // Force the backoff into the past
    payment.next_retry_at = Some(Utc::now() - Duration::minutes(1));
    w.payment_store.update(&payment).await.unwrap();
    assert_eq!(w.payments.retry_failed_payments().await.unwrap(), 1);
    let payment = w.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Processing);

    // A payment at the retry ceiling is never picked up again
    let mut exhausted = payment.clone();
    exhausted.status = PaymentStatus::Failed;
    exhausted.retry_count = 3;
    exhausted.next_retry_at = Some(Utc::now() - Duration::minutes(1));
    w.payment_store.update(&exhausted).await.unwrap();
    assert_eq!(w.payments.retry_failed_payments().await.unwrap(), 0);
}

#[tokio::test]
async fn fiat_refund_round_trips_through_the_gateway() {
    let w = world();
    let (_, subscription_id) = onboarded_subscription(&w, PaymentMethod::CreditCard).await;

    let payment = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::CreditCard,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap();
    w.payments
        .process_payment_success(payment.id, None)
        .await
        .unwrap();

    let refunded = w.payments.refund_payment(payment.id, None).await.unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_amount, Some(29_900));
    assert_eq!(w.fiat.refunds.lock().unwrap().len(), 1);
    assert!(w
        .publisher
        .event_types()
        .contains(&"payment.refunded".to_string()));
}

#[tokio::test]
async fn crypto_refund_is_always_rejected() {
    let w = world();
    let (_, subscription_id) = onboarded_subscription(&w, PaymentMethod::Bitcoin).await;

    let payment = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::Bitcoin,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap();
    assert!(payment.crypto_address.is_some());
    assert!(payment.crypto_payment_id.is_some());

    // Even a settled crypto payment cannot be refunded through the gateway
    w.payments
        .process_payment_success(payment.id, None)
        .await
        .unwrap();
    let err = w
        .payments
        .refund_payment(payment.id, None)
        .await
        .unwrap_err();
    match err {
        BillingError::Refund(msg) => {
            assert_eq!(msg, "crypto payments cannot be refunded automatically")
        }
        other => panic!("expected refund rejection, got {other}"),
    }
    assert!(w.fiat.refunds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn payment_requires_usable_subscription() {
    let w = world();
    let (_, subscription_id) = onboarded_subscription(&w, PaymentMethod::Pix).await;
    w.subscriptions
        .cancel_subscription(subscription_id, false)
        .await
        .unwrap();

    let err = w
        .payments
        .create_payment(CreatePayment {
            subscription_id,
            amount: 29_900,
            currency: "BRL".to_string(),
            method: PaymentMethod::Pix,
            description: "Advoca Professional - monthly".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::Validation(_)));
}
