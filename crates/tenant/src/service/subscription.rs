//! Subscription ledger operations

use std::sync::Arc;

use tracing::info;

use advoca_shared::{BillingInterval, EventPublisher, PlanId, SubscriptionId, TenantId};

use crate::error::{TenantError, TenantResult};
use crate::events;
use crate::store::{PlanStore, SubscriptionStore, TenantStore};
use crate::subscription::{Subscription, SubscriptionStatus};

use super::publish_best_effort;

pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    plans: Arc<dyn PlanStore>,
    tenants: Arc<dyn TenantStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        plans: Arc<dyn PlanStore>,
        tenants: Arc<dyn TenantStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            plans,
            tenants,
            publisher,
        }
    }

    /// Keep the tenant's plan tier in step with the subscribed plan, so
    /// quota fallbacks stay correct even without a live subscription row.
    async fn reseed_tenant_plan(
        &self,
        tenant_id: TenantId,
        plan_type: advoca_shared::PlanType,
    ) -> TenantResult<()> {
        let mut tenant = match self.tenants.get(tenant_id).await {
            Ok(tenant) => tenant,
            // No tenant row yet; the onboarding flow seeds it afterwards
            Err(TenantError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        if tenant.plan_type != plan_type {
            tenant.plan_type = plan_type;
            tenant.updated_at = chrono::Utc::now();
            self.tenants.update(&tenant).await?;
        }
        Ok(())
    }

    /// Open a subscription for a tenant. A tenant can hold at most one live
    /// subscription, so this fails with a conflict while one exists.
    pub async fn create_subscription(
        &self,
        tenant_id: TenantId,
        plan_id: PlanId,
        billing_interval: BillingInterval,
    ) -> TenantResult<Subscription> {
        if let Some(existing) = self.store.find_live_by_tenant(tenant_id).await? {
            return Err(TenantError::Conflict(format!(
                "tenant already has a live subscription ({})",
                existing.status
            )));
        }

        let plan = self.plans.get(plan_id).await?;
        if !plan.is_active {
            return Err(TenantError::Validation(format!(
                "plan {} is not available",
                plan.name
            )));
        }

        let subscription =
            Subscription::new(tenant_id, plan_id, billing_interval, plan.trial_days);
        self.store.insert(&subscription).await?;
        self.reseed_tenant_plan(tenant_id, plan.plan_type).await?;
        info!(
            subscription_id = %subscription.id,
            tenant_id = %tenant_id,
            plan = %plan.name,
            status = %subscription.status,
            "subscription created"
        );
        publish_best_effort(
            self.publisher.as_ref(),
            events::subscription_created(&subscription),
        )
        .await;
        Ok(subscription)
    }

    pub async fn get_subscription(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        self.store.get(id).await
    }

    pub async fn live_subscription(
        &self,
        tenant_id: TenantId,
    ) -> TenantResult<Option<Subscription>> {
        self.store.find_live_by_tenant(tenant_id).await
    }

    pub async fn list_subscriptions(&self, tenant_id: TenantId) -> TenantResult<Vec<Subscription>> {
        self.store.list_by_tenant(tenant_id).await
    }

    pub async fn activate_subscription(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        let mut subscription = self.store.get(id).await?;
        subscription.activate()?;
        self.store.update(&subscription).await?;
        publish_best_effort(
            self.publisher.as_ref(),
            events::subscription_activated(&subscription),
        )
        .await;
        Ok(subscription)
    }

    /// Cancel a subscription. With `at_period_end` the subscription keeps
    /// running until the current period ends; a trial is always ended
    /// immediately since no period was paid for.
    pub async fn cancel_subscription(
        &self,
        id: SubscriptionId,
        at_period_end: bool,
    ) -> TenantResult<Subscription> {
        let mut subscription = self.store.get(id).await?;
        let deferred = at_period_end && subscription.status != SubscriptionStatus::Trialing;
        if deferred {
            subscription.schedule_cancellation()?;
        } else {
            subscription.cancel()?;
        }
        self.store.update(&subscription).await?;
        info!(
            subscription_id = %subscription.id,
            at_period_end = deferred,
            "subscription canceled"
        );
        publish_best_effort(
            self.publisher.as_ref(),
            events::subscription_canceled(&subscription, deferred),
        )
        .await;
        Ok(subscription)
    }

    pub async fn reactivate_subscription(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        let mut subscription = self.store.get(id).await?;
        subscription.reactivate()?;
        self.store.update(&subscription).await?;
        info!(subscription_id = %subscription.id, "subscription reactivated");
        publish_best_effort(
            self.publisher.as_ref(),
            events::subscription_reactivated(&subscription),
        )
        .await;
        Ok(subscription)
    }

    /// Shift the subscription into its next period. A scheduled cancellation
    /// takes effect here instead of renewing.
    pub async fn renew_subscription(
        &self,
        id: SubscriptionId,
        billing_interval: BillingInterval,
    ) -> TenantResult<Subscription> {
        let mut subscription = self.store.get(id).await?;
        if subscription.cancel_at_period_end {
            subscription.cancel()?;
            self.store.update(&subscription).await?;
            publish_best_effort(
                self.publisher.as_ref(),
                events::subscription_canceled(&subscription, true),
            )
            .await;
            return Ok(subscription);
        }
        subscription.renew(billing_interval)?;
        self.store.update(&subscription).await?;
        info!(
            subscription_id = %subscription.id,
            period_end = %subscription.current_period_end,
            "subscription renewed"
        );
        publish_best_effort(
            self.publisher.as_ref(),
            events::subscription_renewed(&subscription),
        )
        .await;
        Ok(subscription)
    }

    /// Move the subscription to another active plan. No prorating: the new
    /// price applies from the next renewal.
    pub async fn change_plan(
        &self,
        id: SubscriptionId,
        new_plan_id: PlanId,
    ) -> TenantResult<Subscription> {
        let plan = self.plans.get(new_plan_id).await?;
        if !plan.is_active {
            return Err(TenantError::Validation(format!(
                "plan {} is not available",
                plan.name
            )));
        }
        let mut subscription = self.store.get(id).await?;
        let old_plan_id = subscription.plan_id.to_string();
        subscription.change_plan(new_plan_id)?;
        self.store.update(&subscription).await?;
        self.reseed_tenant_plan(subscription.tenant_id, plan.plan_type)
            .await?;
        info!(
            subscription_id = %subscription.id,
            old_plan_id = %old_plan_id,
            new_plan_id = %new_plan_id,
            "subscription plan changed"
        );
        publish_best_effort(
            self.publisher.as_ref(),
            events::subscription_plan_changed(&subscription, &old_plan_id),
        )
        .await;
        Ok(subscription)
    }

    /// Record a failed payment attempt against the subscription. Crossing the
    /// failure threshold drops it to PastDue and emits an event.
    pub async fn record_payment_failure(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        let mut subscription = self.store.get(id).await?;
        let was_past_due = subscription.status == SubscriptionStatus::PastDue;
        subscription.mark_payment_failed();
        self.store.update(&subscription).await?;
        if subscription.status == SubscriptionStatus::PastDue && !was_past_due {
            publish_best_effort(
                self.publisher.as_ref(),
                events::subscription_past_due(&subscription),
            )
            .await;
        }
        Ok(subscription)
    }

    /// Record a successful payment: failures reset and the subscription is
    /// restored to Active where the transition table allows it.
    pub async fn record_payment_success(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        let mut subscription = self.store.get(id).await?;
        let was_active = subscription.status == SubscriptionStatus::Active;
        subscription.mark_payment_success();
        self.store.update(&subscription).await?;
        if subscription.status == SubscriptionStatus::Active && !was_active {
            publish_best_effort(
                self.publisher.as_ref(),
                events::subscription_activated(&subscription),
            )
            .await;
        }
        Ok(subscription)
    }

    /// Live subscriptions whose period ends within `days` days
    pub async fn expiring_subscriptions(&self, days: i64) -> TenantResult<Vec<Subscription>> {
        self.store.list_expiring(days).await
    }
}
