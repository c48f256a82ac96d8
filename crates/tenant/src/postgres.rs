//! Postgres-backed store implementations
//!
//! Enums are stored as text and parsed on the way out. Quota increments use a
//! single conditional UPDATE so concurrent consumers cannot race past a
//! limit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use advoca_shared::{Plan, PlanId, PlanType, SubscriptionId, TenantId};

use crate::error::{TenantError, TenantResult};
use crate::quota::{QuotaKind, QuotaUsage};
use crate::store::{PlanStore, QuotaStore, SubscriptionStore, TenantStore};
use crate::subscription::Subscription;
use crate::tenant::Tenant;

fn parse_field<T>(value: &str, field: &str) -> TenantResult<T>
where
    T: std::str::FromStr,
{
    value
        .parse()
        .map_err(|_| TenantError::Database(format!("invalid {} value: {}", field, value)))
}

pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn tenant_from_row(row: &PgRow) -> TenantResult<Tenant> {
    let status: String = row.try_get("status")?;
    let plan_type: String = row.try_get("plan_type")?;
    Ok(Tenant {
        id: TenantId::from(row.try_get::<uuid::Uuid, _>("id")?),
        name: row.try_get("name")?,
        legal_name: row.try_get("legal_name")?,
        document: row.try_get("document")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status: parse_field(&status, "tenant status")?,
        plan_type: parse_field(&plan_type, "plan type")?,
        owner_user_id: advoca_shared::UserId::from(row.try_get::<uuid::Uuid, _>("owner_user_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        activated_at: row.try_get("activated_at")?,
        suspended_at: row.try_get("suspended_at")?,
    })
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn insert(&self, tenant: &Tenant) -> TenantResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (
                id, name, legal_name, document, email, phone, status,
                plan_type, owner_user_id, created_at, updated_at,
                activated_at, suspended_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tenant.id.0)
        .bind(&tenant.name)
        .bind(&tenant.legal_name)
        .bind(&tenant.document)
        .bind(&tenant.email)
        .bind(&tenant.phone)
        .bind(tenant.status.to_string())
        .bind(tenant.plan_type.to_string())
        .bind(tenant.owner_user_id.0)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .bind(tenant.activated_at)
        .bind(tenant.suspended_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> TenantResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET name = $2, legal_name = $3, document = $4, email = $5,
                phone = $6, status = $7, plan_type = $8, updated_at = $9,
                activated_at = $10, suspended_at = $11
            WHERE id = $1
            "#,
        )
        .bind(tenant.id.0)
        .bind(&tenant.name)
        .bind(&tenant.legal_name)
        .bind(&tenant.document)
        .bind(&tenant.email)
        .bind(&tenant.phone)
        .bind(tenant.status.to_string())
        .bind(tenant.plan_type.to_string())
        .bind(tenant.updated_at)
        .bind(tenant.activated_at)
        .bind(tenant.suspended_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(TenantError::NotFound(format!("tenant {}", tenant.id)));
        }
        Ok(())
    }

    async fn get(&self, id: TenantId) -> TenantResult<Tenant> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = $1")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        tenant_from_row(&row)
    }

    async fn find_by_document(&self, document: &str) -> TenantResult<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE document = $1 AND document <> ''")
            .bind(document)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> TenantResult<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }
}

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn subscription_from_row(row: &PgRow) -> TenantResult<Subscription> {
    let status: String = row.try_get("status")?;
    let interval: String = row.try_get("billing_interval")?;
    Ok(Subscription {
        id: SubscriptionId::from(row.try_get::<uuid::Uuid, _>("id")?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id")?),
        plan_id: PlanId::from(row.try_get::<uuid::Uuid, _>("plan_id")?),
        status: parse_field(&status, "subscription status")?,
        billing_interval: parse_field(&interval, "billing interval")?,
        current_period_start: row.try_get("current_period_start")?,
        current_period_end: row.try_get("current_period_end")?,
        cancel_at_period_end: row.try_get("cancel_at_period_end")?,
        trial_start: row.try_get("trial_start")?,
        trial_end: row.try_get("trial_end")?,
        payment_failures: row.try_get("payment_failures")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        canceled_at: row.try_get("canceled_at")?,
    })
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> TenantResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, tenant_id, plan_id, status, billing_interval,
                current_period_start, current_period_end, cancel_at_period_end,
                trial_start, trial_end, payment_failures,
                created_at, updated_at, canceled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(subscription.id.0)
        .bind(subscription.tenant_id.0)
        .bind(subscription.plan_id.0)
        .bind(subscription.status.to_string())
        .bind(subscription.billing_interval.to_string())
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.trial_start)
        .bind(subscription.trial_end)
        .bind(subscription.payment_failures)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .bind(subscription.canceled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> TenantResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan_id = $2, status = $3, billing_interval = $4,
                current_period_start = $5, current_period_end = $6,
                cancel_at_period_end = $7, payment_failures = $8,
                updated_at = $9, canceled_at = $10
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.0)
        .bind(subscription.plan_id.0)
        .bind(subscription.status.to_string())
        .bind(subscription.billing_interval.to_string())
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.payment_failures)
        .bind(subscription.updated_at)
        .bind(subscription.canceled_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(TenantError::NotFound(format!(
                "subscription {}",
                subscription.id
            )));
        }
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> TenantResult<Subscription> {
        let row = sqlx::query("SELECT * FROM subscriptions WHERE id = $1")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        subscription_from_row(&row)
    }

    async fn find_live_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> TenantResult<Option<Subscription>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM subscriptions
            WHERE tenant_id = $1 AND status IN ('trialing', 'active', 'past_due')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> TenantResult<Vec<Subscription>> {
        let rows = sqlx::query(
            "SELECT * FROM subscriptions WHERE tenant_id = $1 ORDER BY created_at ASC",
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscription_from_row).collect()
    }

    async fn list_expiring(&self, days: i64) -> TenantResult<Vec<Subscription>> {
        let cutoff: DateTime<Utc> = Utc::now() + chrono::Duration::days(days);
        let rows = sqlx::query(
            r#"
            SELECT * FROM subscriptions
            WHERE status IN ('trialing', 'active', 'past_due')
              AND current_period_end <= $1
            ORDER BY current_period_end ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscription_from_row).collect()
    }
}

pub struct PgQuotaStore {
    pool: PgPool,
}

impl PgQuotaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn column(kind: QuotaKind) -> &'static str {
        match kind {
            QuotaKind::Processes => "processes",
            QuotaKind::Users => "users",
            QuotaKind::Clients => "clients",
            QuotaKind::DatajudDaily => "datajud_daily",
            QuotaKind::AiMonthly => "ai_monthly",
            QuotaKind::Storage => "storage_centi_gb",
            QuotaKind::Webhooks => "webhooks",
            QuotaKind::ApiDaily => "api_daily",
        }
    }
}

fn usage_from_row(row: &PgRow) -> TenantResult<QuotaUsage> {
    Ok(QuotaUsage {
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id")?),
        processes: row.try_get("processes")?,
        users: row.try_get("users")?,
        clients: row.try_get("clients")?,
        datajud_daily: row.try_get("datajud_daily")?,
        datajud_monthly: row.try_get("datajud_monthly")?,
        ai_monthly: row.try_get("ai_monthly")?,
        storage_centi_gb: row.try_get("storage_centi_gb")?,
        webhooks: row.try_get("webhooks")?,
        api_daily: row.try_get("api_daily")?,
        api_monthly: row.try_get("api_monthly")?,
        daily_reset_at: row.try_get("daily_reset_at")?,
        monthly_reset_at: row.try_get("monthly_reset_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl QuotaStore for PgQuotaStore {
    async fn ensure(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage> {
        let row = sqlx::query(
            r#"
            INSERT INTO quota_usage (tenant_id)
            VALUES ($1)
            ON CONFLICT (tenant_id) DO UPDATE SET tenant_id = EXCLUDED.tenant_id
            RETURNING *
            "#,
        )
        .bind(tenant_id.0)
        .fetch_one(&self.pool)
        .await?;
        usage_from_row(&row)
    }

    async fn get(&self, tenant_id: TenantId) -> TenantResult<QuotaUsage> {
        let row = sqlx::query("SELECT * FROM quota_usage WHERE tenant_id = $1")
            .bind(tenant_id.0)
            .fetch_one(&self.pool)
            .await?;
        usage_from_row(&row)
    }

    async fn update(&self, usage: &QuotaUsage) -> TenantResult<()> {
        sqlx::query(
            r#"
            UPDATE quota_usage
            SET processes = $2, users = $3, clients = $4,
                datajud_daily = $5, datajud_monthly = $6, ai_monthly = $7,
                storage_centi_gb = $8, webhooks = $9,
                api_daily = $10, api_monthly = $11,
                daily_reset_at = $12, monthly_reset_at = $13, updated_at = $14
            WHERE tenant_id = $1
            "#,
        )
        .bind(usage.tenant_id.0)
        .bind(usage.processes)
        .bind(usage.users)
        .bind(usage.clients)
        .bind(usage.datajud_daily)
        .bind(usage.datajud_monthly)
        .bind(usage.ai_monthly)
        .bind(usage.storage_centi_gb)
        .bind(usage.webhooks)
        .bind(usage.api_daily)
        .bind(usage.api_monthly)
        .bind(usage.daily_reset_at)
        .bind(usage.monthly_reset_at)
        .bind(usage.updated_at)
        .execute(&self.pool)
        .await?;
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
        self.ensure(tenant_id).await?;
        let column = Self::column(kind);
        // Daily counters carry their monthly roll-up in the same statement
        let rollup = match kind {
            QuotaKind::DatajudDaily => ", datajud_monthly = datajud_monthly + $2",
            QuotaKind::ApiDaily => ", api_monthly = api_monthly + $2",
            _ => "",
        };
        let sql = format!(
            r#"
            UPDATE quota_usage
            SET {column} = {column} + $2{rollup}, updated_at = now()
            WHERE tenant_id = $1 AND ($3 <= 0 OR {column} + $2 <= $3)
            RETURNING *
            "#,
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.0)
            .bind(amount)
            .bind(limit)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(usage_from_row).transpose()
    }

    async fn reset_daily_counters(&self) -> TenantResult<u64> {
        let result = sqlx::query(
            "UPDATE quota_usage SET datajud_daily = 0, api_daily = 0, daily_reset_at = now()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn reset_monthly_counters(&self) -> TenantResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE quota_usage
            SET datajud_monthly = 0, ai_monthly = 0, api_monthly = 0,
                monthly_reset_at = now()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn plan_from_row(row: &PgRow) -> TenantResult<Plan> {
    let plan_type: String = row.try_get("plan_type")?;
    let plan_type: PlanType = parse_field(&plan_type, "plan type")?;
    let features: serde_json::Value = row.try_get("features")?;
    let quotas: serde_json::Value = row.try_get("quotas")?;
    Ok(Plan {
        id: PlanId::from(row.try_get::<uuid::Uuid, _>("id")?),
        name: row.try_get("name")?,
        plan_type,
        description: row.try_get("description")?,
        price_monthly: row.try_get("price_monthly")?,
        price_yearly: row.try_get("price_yearly")?,
        currency: row.try_get("currency")?,
        trial_days: row.try_get("trial_days")?,
        features: serde_json::from_value(features)
            .map_err(|e| TenantError::Database(format!("invalid plan features: {}", e)))?,
        quotas: serde_json::from_value(quotas)
            .map_err(|e| TenantError::Database(format!("invalid plan quotas: {}", e)))?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn get(&self, id: PlanId) -> TenantResult<Plan> {
        let row = sqlx::query("SELECT * FROM plans WHERE id = $1")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        plan_from_row(&row)
    }

    async fn list_active(&self) -> TenantResult<Vec<Plan>> {
        let rows =
            sqlx::query("SELECT * FROM plans WHERE is_active = true ORDER BY price_monthly ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(plan_from_row).collect()
    }
}
