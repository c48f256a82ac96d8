//! Tenant lifecycle operations

use std::sync::Arc;

use tracing::info;

use advoca_shared::{EventPublisher, PlanType, TenantId, UserId};

use crate::error::{TenantError, TenantResult};
use crate::events;
use crate::store::{QuotaStore, TenantStore};
use crate::tenant::Tenant;

use super::publish_best_effort;

/// Input for opening a tenant account
#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub name: String,
    pub legal_name: String,
    pub document: String,
    pub email: String,
    pub phone: String,
    pub plan_type: PlanType,
    pub owner_user_id: UserId,
}

/// Partial update of tenant contact data; `None` fields stay untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub legal_name: Option<String>,
    pub phone: Option<String>,
}

pub struct TenantService {
    store: Arc<dyn TenantStore>,
    quotas: Arc<dyn QuotaStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl TenantService {
    pub fn new(
        store: Arc<dyn TenantStore>,
        quotas: Arc<dyn QuotaStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            quotas,
            publisher,
        }
    }

    /// Create a tenant in Pending status. Document and email must be unique
    /// across tenants.
    pub async fn create_tenant(&self, input: CreateTenant) -> TenantResult<Tenant> {
        let mut tenant = Tenant::new(input.name, input.email, input.plan_type, input.owner_user_id);
        tenant.legal_name = input.legal_name;
        tenant.document = input.document;
        tenant.phone = input.phone;
        tenant.validate()?;

        if !tenant.document.is_empty()
            && self.store.find_by_document(&tenant.document).await?.is_some()
        {
            return Err(TenantError::Conflict(
                "a tenant with this document already exists".to_string(),
            ));
        }
        if self.store.find_by_email(&tenant.email).await?.is_some() {
            return Err(TenantError::Conflict(
                "a tenant with this email already exists".to_string(),
            ));
        }

        self.store.insert(&tenant).await?;
        // Zeroed usage row up front, so quota checks never miss
        self.quotas.ensure(tenant.id).await?;
        info!(tenant_id = %tenant.id, plan_type = %tenant.plan_type, "tenant created");
        publish_best_effort(self.publisher.as_ref(), events::tenant_created(&tenant)).await;
        Ok(tenant)
    }

    pub async fn get_tenant(&self, id: TenantId) -> TenantResult<Tenant> {
        self.store.get(id).await
    }

    pub async fn update_tenant(&self, id: TenantId, update: UpdateTenant) -> TenantResult<Tenant> {
        let mut tenant = self.store.get(id).await?;
        if let Some(name) = update.name {
            tenant.name = name;
            tenant.validate_name()?;
        }
        if let Some(legal_name) = update.legal_name {
            tenant.legal_name = legal_name;
        }
        if let Some(phone) = update.phone {
            tenant.phone = phone;
        }
        tenant.updated_at = chrono::Utc::now();
        self.store.update(&tenant).await?;
        publish_best_effort(self.publisher.as_ref(), events::tenant_updated(&tenant)).await;
        Ok(tenant)
    }

    pub async fn activate_tenant(&self, id: TenantId) -> TenantResult<Tenant> {
        let mut tenant = self.store.get(id).await?;
        tenant.activate()?;
        self.store.update(&tenant).await?;
        info!(tenant_id = %tenant.id, "tenant activated");
        publish_best_effort(self.publisher.as_ref(), events::tenant_activated(&tenant)).await;
        Ok(tenant)
    }

    pub async fn suspend_tenant(&self, id: TenantId, reason: &str) -> TenantResult<Tenant> {
        let mut tenant = self.store.get(id).await?;
        tenant.suspend()?;
        self.store.update(&tenant).await?;
        info!(tenant_id = %tenant.id, reason, "tenant suspended");
        publish_best_effort(
            self.publisher.as_ref(),
            events::tenant_suspended(&tenant, reason),
        )
        .await;
        Ok(tenant)
    }

    pub async fn cancel_tenant(&self, id: TenantId) -> TenantResult<Tenant> {
        let mut tenant = self.store.get(id).await?;
        tenant.cancel()?;
        self.store.update(&tenant).await?;
        info!(tenant_id = %tenant.id, "tenant canceled");
        publish_best_effort(self.publisher.as_ref(), events::tenant_canceled(&tenant)).await;
        Ok(tenant)
    }
}
