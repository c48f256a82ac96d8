//! In-memory store implementations
//!
//! Mutex-wrapped maps, shared between unit tests and the integration suites.
//! `try_increment` holds the map lock across the check and the write, which
//! gives the same atomicity the SQL conditional update provides.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use advoca_shared::{Plan, PlanId, SubscriptionId, TenantId};

use crate::error::{TenantError, TenantResult};
use crate::quota::{QuotaKind, QuotaUsage};
use crate::store::{PlanStore, QuotaStore, SubscriptionStore, TenantStore};
use crate::subscription::Subscription;
use crate::tenant::Tenant;

fn lock_poisoned() -> TenantError {
    TenantError::Database("store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryTenantStore {
    tenants: Mutex<HashMap<TenantId, Tenant>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn insert(&self, tenant: &Tenant) -> TenantResult<()> {
        let mut tenants = self.tenants.lock().map_err(|_| lock_poisoned())?;
        if tenants.contains_key(&tenant.id) {
            return Err(TenantError::Conflict(format!(
                "tenant {} already exists",
                tenant.id
            )));
        }
        tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> TenantResult<()> {
        let mut tenants = self.tenants.lock().map_err(|_| lock_poisoned())?;
        if !tenants.contains_key(&tenant.id) {
            return Err(TenantError::NotFound(format!("tenant {}", tenant.id)));
        }
        tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn get(&self, id: TenantId) -> TenantResult<Tenant> {
        let tenants = self.tenants.lock().map_err(|_| lock_poisoned())?;
        tenants
            .get(&id)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(format!("tenant {}", id)))
    }

    async fn find_by_document(&self, document: &str) -> TenantResult<Option<Tenant>> {
        let tenants = self.tenants.lock().map_err(|_| lock_poisoned())?;
        Ok(tenants
            .values()
            .find(|t| !t.document.is_empty() && t.document == document)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> TenantResult<Option<Tenant>> {
        let tenants = self.tenants.lock().map_err(|_| lock_poisoned())?;
        Ok(tenants
            .values()
            .find(|t| t.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> TenantResult<()> {
        let mut subs = self.subscriptions.lock().map_err(|_| lock_poisoned())?;
        if subs.contains_key(&subscription.id) {
            return Err(TenantError::Conflict(format!(
                "subscription {} already exists",
                subscription.id
            )));
        }
        subs.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> TenantResult<()> {
        let mut subs = self.subscriptions.lock().map_err(|_| lock_poisoned())?;
        if !subs.contains_key(&subscription.id) {
            return Err(TenantError::NotFound(format!(
                "subscription {}",
                subscription.id
            )));
        }
        subs.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        let subs = self.subscriptions.lock().map_err(|_| lock_poisoned())?;
        subs.get(&id)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(format!("subscription {}", id)))
    }

    async fn find_live_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> TenantResult<Option<Subscription>> {
        let subs = self.subscriptions.lock().map_err(|_| lock_poisoned())?;
        Ok(subs
            .values()
            .find(|s| s.tenant_id == tenant_id && s.is_live())
            .cloned())
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> TenantResult<Vec<Subscription>> {
        let subs = self.subscriptions.lock().map_err(|_| lock_poisoned())?;
        let mut result: Vec<_> = subs
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by_key(|s| s.created_at);
        Ok(result)
    }

    async fn list_expiring(&self, days: i64) -> TenantResult<Vec<Subscription>> {
        let cutoff = Utc::now() + Duration::days(days);
        let subs = self.subscriptions.lock().map_err(|_| lock_poisoned())?;
        Ok(subs
            .values()
            .filter(|s| s.is_live() && s.current_period_end <= cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryQuotaStore {
    usage: Mutex<HashMap<TenantId, QuotaUsage>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn ensure(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage> {
        let mut usage = self.usage.lock().map_err(|_| lock_poisoned())?;
        Ok(usage
            .entry(tenant_id)
            .or_insert_with(|| QuotaUsage::new(tenant_id))
            .clone())
    }

    async fn get(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage> {
        let usage = self.usage.lock().map_err(|_| lock_poisoned())?;
        usage
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(format!("quota usage for tenant {}", tenant_id)))
    }

    async fn update(&self, updated: &QuotaUsage) -> TenantResult<()> {
        let mut usage = self.usage.lock().map_err(|_| lock_poisoned())?;
        usage.insert(updated.tenant_id, updated.clone());
        Ok(())
    }

    async fn try_increment(
        &self,
        tenant_id: TenantId,
        kind: QuotaKind,
        amount: i64,
        limit: i64,
    ) -> TenantResult<Option<QuotaUsage>> {
        if amount < 0 {
            return Err(TenantError::NegativeUsage);
        }
        let mut usage = self.usage.lock().map_err(|_| lock_poisoned())?;
        let entry = usage
            .entry(tenant_id)
            .or_insert_with(|| QuotaUsage::new(tenant_id));
        if limit > 0 && entry.current(kind) + amount > limit {
            return Ok(None);
        }
        entry.increment(kind, amount)?;
        Ok(Some(entry.clone()))
    }

    async fn reset_daily_counters(&self) -> TenantResult<u64> {
        let mut usage = self.usage.lock().map_err(|_| lock_poisoned())?;
        for entry in usage.values_mut() {
            entry.reset_daily();
        }
        Ok(usage.len() as u64)
    }

    async fn reset_monthly_counters(&self) -> TenantResult<u64> {
        let mut usage = self.usage.lock().map_err(|_| lock_poisoned())?;
        for entry in usage.values_mut() {
            entry.reset_monthly();
        }
        Ok(usage.len() as u64)
    }
}

/// Plan catalog held in memory, seeded with the default plans
pub struct MemoryPlanStore {
    plans: Mutex<HashMap<PlanId, Plan>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_plans() -> Self {
        let plans = advoca_shared::default_plans()
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        Self {
            plans: Mutex::new(plans),
        }
    }

    pub fn insert(&self, plan: Plan) -> TenantResult<()> {
        let mut plans = self.plans.lock().map_err(|_| lock_poisoned())?;
        plans.insert(plan.id, plan);
        Ok(())
    }
}

impl Default for MemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn get(&self, id: PlanId) -> TenantResult<Plan> {
        let plans = self.plans.lock().map_err(|_| lock_poisoned())?;
        plans
            .get(&id)
            .cloned()
            .ok_or_else(|| TenantError::NotFound(format!("plan {}", id)))
    }

    async fn list_active(&self) -> TenantResult<Vec<Plan>> {
        let plans = self.plans.lock().map_err(|_| lock_poisoned())?;
        let mut result: Vec<_> = plans.values().filter(|p| p.is_active).cloned().collect();
        result.sort_by_key(|p| p.price_monthly);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_increment_stops_at_limit() {
        let store = MemoryQuotaStore::new();
        let tenant_id = TenantId::new();

        for _ in 0..2 {
            let updated = store
                .try_increment(tenant_id, QuotaKind::Users, 1, 2)
                .await
                .unwrap();
            assert!(updated.is_some());
        }
        let blocked = store
            .try_increment(tenant_id, QuotaKind::Users, 1, 2)
            .await
            .unwrap();
        assert!(blocked.is_none());
        assert_eq!(store.get(tenant_id).await.unwrap().users, 2);
    }

    #[tokio::test]
    async fn test_try_increment_unlimited() {
        let store = MemoryQuotaStore::new();
        let tenant_id = TenantId::new();
        let updated = store
            .try_increment(tenant_id, QuotaKind::Processes, 10_000, 0)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().processes, 10_000);
    }

    #[tokio::test]
    async fn test_find_live_skips_canceled() {
        let store = MemorySubscriptionStore::new();
        let tenant_id = TenantId::new();
        let mut sub = Subscription::new(
            tenant_id,
            PlanId::new(),
            advoca_shared::BillingInterval::Monthly,
            0,
        );
        store.insert(&sub).await.unwrap();
        assert!(store.find_live_by_tenant(tenant_id).await.unwrap().is_some());

        sub.cancel().unwrap();
        store.update(&sub).await.unwrap();
        assert!(store.find_live_by_tenant(tenant_id).await.unwrap().is_none());
    }
}
