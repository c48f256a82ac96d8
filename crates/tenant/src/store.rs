//! Persistence ports for the tenant crate
//!
//! Services depend on these traits, never on a concrete backend. The
//! in-memory implementations in `memory` back the test suites; the Postgres
//! implementations in `postgres` back production.

use async_trait::async_trait;

use advoca_shared::{Plan, PlanId, SubscriptionId, TenantId};

use crate::error::TenantResult;
use crate::quota::{QuotaKind, QuotaUsage};
use crate::subscription::Subscription;
use crate::tenant::Tenant;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert(&self, tenant: &Tenant) -> TenantResult<()>;
    async fn update(&self, tenant: &Tenant) -> TenantResult<()>;
    async fn get(&self, id: TenantId) -> TenantResult<Tenant>;
    async fn find_by_document(&self, document: &str) -> TenantResult<Option<Tenant>>;
    async fn find_by_email(&self, email: &str) -> TenantResult<Option<Tenant>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(&self, subscription: &Subscription) -> TenantResult<()>;
    async fn update(&self, subscription: &Subscription) -> TenantResult<()>;
    async fn get(&self, id: SubscriptionId) -> TenantResult<Subscription>;
    /// The tenant's live subscription, if any. Live means trialing, active,
    /// or past due.
    async fn find_live_by_tenant(&self, tenant_id: TenantId) -> TenantResult<Option<Subscription>>;
    async fn list_by_tenant(&self, tenant_id: TenantId) -> TenantResult<Vec<Subscription>>;
    /// Live subscriptions whose period ends within `days` days, for the
    /// renewal sweep.
    async fn list_expiring(&self, days: i64) -> TenantResult<Vec<Subscription>>;
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn ensure(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage>;
    async fn get(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage>;
    async fn update(&self, usage: &QuotaUsage) -> TenantResult<()>;
    /// Atomically add `amount` to a counter only while the post-increment
    /// value stays at or below `limit` (a non-positive limit is unlimited).
    /// Returns the updated usage on success, or `None` when the increment
    /// would go over the limit. This is the race-free path for concurrent
    /// consumers; `get` + `can_increment` remains advisory.
    async fn try_increment(
        &self,
        tenant_id: TenantId,
        kind: QuotaKind,
        amount: i64,
        limit: i64,
    ) -> TenantResult<Option<QuotaUsage>>;
    async fn reset_daily_counters(&self) -> TenantResult<u64>;
    async fn reset_monthly_counters(&self) -> TenantResult<u64>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get(&self, id: PlanId) -> TenantResult<Plan>;
    async fn list_active(&self) -> TenantResult<Vec<Plan>>;
}
