//! Scheduled maintenance sweeps
//!
//! Every job swallows its own errors: a failed sweep is logged and picked up
//! again on the next tick, never crashing the worker.

use tracing::{error, info};

use advoca_billing::service::PaymentService;
use advoca_tenant::{QuotaService, SubscriptionService};

pub async fn reset_daily_quotas(quotas: &QuotaService) {
    match quotas.reset_daily().await {
        Ok(affected) => info!(affected, "daily quota counters reset"),
        Err(e) => error!(error = %e, "daily quota reset failed"),
    }
}

pub async fn reset_monthly_quotas(quotas: &QuotaService) {
    match quotas.reset_monthly().await {
        Ok(affected) => info!(affected, "monthly quota counters reset"),
        Err(e) => error!(error = %e, "monthly quota reset failed"),
    }
}

/// Roll over subscriptions whose billing period has ended. Scheduled
/// cancellations are executed by the renewal call itself. Past-due
/// subscriptions are left to the dunning path; rolling them over here
/// would grant a fresh period without a settled payment.
pub async fn renew_due_subscriptions(subscriptions: &SubscriptionService) {
    let due = match subscriptions.expiring_subscriptions(0).await {
        Ok(due) => due,
        Err(e) => {
            error!(error = %e, "failed to list due subscriptions");
            return;
        }
    };
    let due: Vec<_> = due.into_iter().filter(|s| s.is_active()).collect();
    if due.is_empty() {
        return;
    }
    info!(count = due.len(), "renewing due subscriptions");
    for subscription in due {
        if let Err(e) = subscriptions
            .renew_subscription(subscription.id, subscription.billing_interval)
            .await
        {
            error!(subscription_id = %subscription.id, error = %e, "renewal failed");
        }
    }
}

pub async fn retry_pending_payments(payments: &PaymentService) {
    match payments.retry_failed_payments().await {
        Ok(_) => {}
        Err(e) => error!(error = %e, "payment retry sweep failed"),
    }
}
