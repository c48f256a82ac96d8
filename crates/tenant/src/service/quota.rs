//! Quota enforcement
//!
//! Consumption goes through the store's atomic increment so concurrent
//! consumers cannot jointly overshoot a limit. Checks without consumption
//! stay advisory.

use std::sync::Arc;

use tracing::{debug, info};

use advoca_shared::{EventPublisher, TenantId};

use crate::error::{TenantError, TenantResult};
use crate::events;
use crate::quota::{QuotaCheck, QuotaKind, QuotaLimit, QuotaUsage};
use crate::store::{PlanStore, QuotaStore, SubscriptionStore, TenantStore};

use super::publish_best_effort;

pub struct QuotaService {
    quotas: Arc<dyn QuotaStore>,
    tenants: Arc<dyn TenantStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    plans: Arc<dyn PlanStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl QuotaService {
    pub fn new(
        quotas: Arc<dyn QuotaStore>,
        tenants: Arc<dyn TenantStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        plans: Arc<dyn PlanStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            quotas,
            tenants,
            subscriptions,
            plans,
            publisher,
        }
    }

    /// The limits in force for a tenant: the live subscription's plan when
    /// one exists, otherwise the defaults of the tenant's plan tier.
    pub async fn effective_limits(&self, tenant_id: TenantId) -> TenantResult<QuotaLimit> {
        if let Some(subscription) = self.subscriptions.find_live_by_tenant(tenant_id).await? {
            let plan = self.plans.get(subscription.plan_id).await?;
            return Ok(QuotaLimit::from_plan(&plan.quotas));
        }
        let tenant = self.tenants.get(tenant_id).await?;
        Ok(QuotaLimit::from_plan(&tenant.plan_type.default_quotas()))
    }

    /// Advisory check: evaluates current usage without reserving anything
    pub async fn check_quota(
        &self,
        tenant_id: TenantId,
        kind: QuotaKind,
    ) -> TenantResult<QuotaCheck> {
        let limits = self.effective_limits(tenant_id).await?;
        let usage = self.quotas.ensure(tenant_id).await?;
        Ok(usage.check(kind, &limits))
    }

    /// Evaluate every quota dimension at once
    pub async fn check_all(&self, tenant_id: TenantId) -> TenantResult<Vec<QuotaCheck>> {
        let limits = self.effective_limits(tenant_id).await?;
        let usage = self.quotas.ensure(tenant_id).await?;
        Ok(QuotaKind::ALL
            .iter()
            .map(|&kind| usage.check(kind, &limits))
            .collect())
    }

    /// Consume `amount` units of a quota, or fail with `QuotaExceeded` if
    /// the limit does not allow it. Emits a warning event when consumption
    /// lands in the warning band and an exceeded event on rejection.
    pub async fn consume(
        &self,
        tenant_id: TenantId,
        kind: QuotaKind,
        amount: i64,
    ) -> TenantResult<QuotaCheck> {
        let limits = self.effective_limits(tenant_id).await?;
        let limit = limits.limit_for(kind);

        match self.quotas.try_increment(tenant_id, kind, amount, limit).await? {
            Some(usage) => {
                let check = usage.check(kind, &limits);
                debug!(
                    tenant_id = %tenant_id,
                    quota = %kind,
                    current = check.current,
                    limit = check.limit,
                    "quota consumed"
                );
                if check.is_warning {
                    publish_best_effort(
                        self.publisher.as_ref(),
                        events::quota_warning(&check, tenant_id),
                    )
                    .await;
                }
                Ok(check)
            }
            None => {
                let usage = self.quotas.ensure(tenant_id).await?;
                let check = usage.check(kind, &limits);
                info!(
                    tenant_id = %tenant_id,
                    quota = %kind,
                    current = check.current,
                    limit = check.limit,
                    "quota exceeded"
                );
                publish_best_effort(
                    self.publisher.as_ref(),
                    events::quota_exceeded(&check, tenant_id),
                )
                .await;
                Err(TenantError::QuotaExceeded {
                    quota_type: kind.to_string(),
                    current: check.current,
                    limit: check.limit,
                })
            }
        }
    }

    /// Release previously consumed units. Counters floor at zero.
    pub async fn release(
        &self,
        tenant_id: TenantId,
        kind: QuotaKind,
        amount: i64,
    ) -> TenantResult<QuotaUsage> {
        let mut usage = self.quotas.ensure(tenant_id).await?;
        usage.decrement(kind, amount)?;
        self.quotas.update(&usage).await?;
        Ok(usage)
    }

    /// Replace the storage reading with a fresh measurement in GB
    pub async fn record_storage(&self, tenant_id: TenantId, used_gb: f64) -> TenantResult<QuotaCheck> {
        let limits = self.effective_limits(tenant_id).await?;
        let mut usage = self.quotas.ensure(tenant_id).await?;
        usage.update_storage_gb(used_gb)?;
        self.quotas.update(&usage).await?;
        let check = usage.check(QuotaKind::Storage, &limits);
        if check.is_exceeded {
            publish_best_effort(
                self.publisher.as_ref(),
                events::quota_exceeded(&check, tenant_id),
            )
            .await;
        } else if check.is_warning {
            publish_best_effort(
                self.publisher.as_ref(),
                events::quota_warning(&check, tenant_id),
            )
            .await;
        }
        Ok(check)
    }

    pub async fn usage(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage> {
        self.quotas.ensure(tenant_id).await
    }

    /// Midnight sweep: zero the daily counters for every tenant
    pub async fn reset_daily(&self) -> TenantResult<u64> {
        let count = self.quotas.reset_daily_counters().await?;
        info!(tenants = count, "daily quota counters reset");
        Ok(count)
    }

    /// First-of-month sweep: zero the monthly counters for every tenant
    pub async fn reset_monthly(&self) -> TenantResult<u64> {
        let count = self.quotas.reset_monthly_counters().await?;
        info!(tenants = count, "monthly quota counters reset");
        Ok(count)
    }
}
