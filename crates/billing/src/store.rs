//! Persistence ports for the billing crate

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use advoca_shared::{CustomerId, InvoiceId, PaymentId, SubscriptionId, TenantId};

use crate::customer::Customer;
use crate::error::BillingResult;
use crate::invoice::Invoice;
use crate::payment::Payment;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: &Payment) -> BillingResult<()>;
    async fn update(&self, payment: &Payment) -> BillingResult<()>;
    async fn get(&self, id: PaymentId) -> BillingResult<Payment>;
    async fn list_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> BillingResult<Vec<Payment>>;
    async fn list_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Payment>>;
    /// Failed payments whose backoff has elapsed and that still have
    /// retries left.
    async fn list_retry_due(&self, now: DateTime<Utc>) -> BillingResult<Vec<Payment>>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert(&self, customer: &Customer) -> BillingResult<()>;
    async fn update(&self, customer: &Customer) -> BillingResult<()>;
    async fn get(&self, id: CustomerId) -> BillingResult<Customer>;
    async fn find_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Option<Customer>>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> BillingResult<()>;
    async fn update(&self, invoice: &Invoice) -> BillingResult<()>;
    async fn get(&self, id: InvoiceId) -> BillingResult<Invoice>;
    async fn list_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Invoice>>;
}
