//! Maintenance worker
//!
//! Runs the periodic sweeps the billing core needs but no request triggers:
//! quota counter resets, subscription rollover and payment retries.

mod jobs;

use std::sync::Arc;

use anyhow::Context;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

use advoca_billing::asaas::AsaasClient;
use advoca_billing::config::BillingConfig;
use advoca_billing::nowpayments::NowPaymentsClient;
use advoca_billing::postgres::{PgCustomerStore, PgInvoiceStore, PgPaymentStore};
use advoca_billing::service::PaymentService;
use advoca_shared::{EventPublisher, TracingPublisher};
use advoca_tenant::postgres::{PgPlanStore, PgQuotaStore, PgSubscriptionStore, PgTenantStore};
use advoca_tenant::{QuotaService, SubscriptionService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("database connection failed")?;
    info!("connected to database");

    let billing_config = BillingConfig::from_env()?;
    let fiat = Arc::new(AsaasClient::new(&billing_config.asaas));
    let crypto = Arc::new(NowPaymentsClient::new(&billing_config.nowpayments));
    let publisher: Arc<dyn EventPublisher> = Arc::new(TracingPublisher);

    let tenant_store = Arc::new(PgTenantStore::new(pool.clone()));
    let subscription_store = Arc::new(PgSubscriptionStore::new(pool.clone()));
    let quota_store = Arc::new(PgQuotaStore::new(pool.clone()));
    let plan_store = Arc::new(PgPlanStore::new(pool.clone()));

    let quotas = Arc::new(QuotaService::new(
        quota_store,
        tenant_store.clone(),
        subscription_store.clone(),
        plan_store.clone(),
        publisher.clone(),
    ));
    let subscriptions = Arc::new(SubscriptionService::new(
        subscription_store,
        plan_store,
        tenant_store,
        publisher.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        Arc::new(PgPaymentStore::new(pool.clone())),
        Arc::new(PgInvoiceStore::new(pool.clone())),
        Arc::new(PgCustomerStore::new(pool.clone())),
        fiat,
        crypto,
        subscriptions.clone(),
        publisher,
    ));

    let mut scheduler = JobScheduler::new().await?;

    // Daily counters roll over at midnight UTC, monthly on the 1st
    let daily = quotas.clone();
    scheduler
        .add(Job::new_async("0 5 0 * * *", move |_id, _sched| {
            let quotas = daily.clone();
            Box::pin(async move { jobs::reset_daily_quotas(&quotas).await })
        })?)
        .await?;
    let monthly = quotas.clone();
    scheduler
        .add(Job::new_async("0 10 0 1 * *", move |_id, _sched| {
            let quotas = monthly.clone();
            Box::pin(async move { jobs::reset_monthly_quotas(&quotas).await })
        })?)
        .await?;

    // Subscription rollover once an hour
    let renewals = subscriptions.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_id, _sched| {
            let subscriptions = renewals.clone();
            Box::pin(async move { jobs::renew_due_subscriptions(&subscriptions).await })
        })?)
        .await?;

    // Failed payments go back to their gateway every 15 minutes
    let retries = payments.clone();
    scheduler
        .add(Job::new_async("0 */15 * * * *", move |_id, _sched| {
            let payments = retries.clone();
            Box::pin(async move { jobs::retry_pending_payments(&payments).await })
        })?)
        .await?;

    scheduler.start().await?;
    info!("worker started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    scheduler.shutdown().await?;
    Ok(())
}
