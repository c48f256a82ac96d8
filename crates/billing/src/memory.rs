//! In-memory billing stores, shared by the test suites

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use advoca_shared::{CustomerId, InvoiceId, PaymentId, SubscriptionId, TenantId};

use crate::customer::Customer;
use crate::error::{BillingError, BillingResult};
use crate::invoice::Invoice;
use crate::payment::Payment;
use crate::store::{CustomerStore, InvoiceStore, PaymentStore};

fn lock_poisoned() -> BillingError {
    BillingError::Database("store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryPaymentStore {
    payments: Mutex<HashMap<PaymentId, Payment>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> BillingResult<()> {
        let mut payments = self.payments.lock().map_err(|_| lock_poisoned())?;
        if payments.contains_key(&payment.id) {
            return Err(BillingError::Conflict(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> BillingResult<()> {
        let mut payments = self.payments.lock().map_err(|_| lock_poisoned())?;
        if !payments.contains_key(&payment.id) {
            return Err(BillingError::NotFound(format!("payment {}", payment.id)));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> BillingResult<Payment> {
        let payments = self.payments.lock().map_err(|_| lock_poisoned())?;
        payments
            .get(&id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(format!("payment {}", id)))
    }

    async fn list_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> BillingResult<Vec<Payment>> {
        let payments = self.payments.lock().map_err(|_| lock_poisoned())?;
        let mut result: Vec<_> = payments
            .values()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Payment>> {
        let payments = self.payments.lock().map_err(|_| lock_poisoned())?;
        let mut result: Vec<_> = payments
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }

    async fn list_retry_due(&self, now: DateTime<Utc>) -> BillingResult<Vec<Payment>> {
        let payments = self.payments.lock().map_err(|_| lock_poisoned())?;
        Ok(payments
            .values()
            .filter(|p| p.is_retry_due(now))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryCustomerStore {
    customers: Mutex<HashMap<CustomerId, Customer>>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn insert(&self, customer: &Customer) -> BillingResult<()> {
        let mut customers = self.customers.lock().map_err(|_| lock_poisoned())?;
        if customers
            .values()
            .any(|c| c.tenant_id == customer.tenant_id)
        {
            return Err(BillingError::Conflict(format!(
                "tenant {} already has a billing customer",
                customer.tenant_id
            )));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update(&self, customer: &Customer) -> BillingResult<()> {
        let mut customers = self.customers.lock().map_err(|_| lock_poisoned())?;
        if !customers.contains_key(&customer.id) {
            return Err(BillingError::NotFound(format!("customer {}", customer.id)));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get(&self, id: CustomerId) -> BillingResult<Customer> {
        let customers = self.customers.lock().map_err(|_| lock_poisoned())?;
        customers
            .get(&id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(format!("customer {}", id)))
    }

    async fn find_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Option<Customer>> {
        let customers = self.customers.lock().map_err(|_| lock_poisoned())?;
        Ok(customers
            .values()
            .find(|c| c.tenant_id == tenant_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryInvoiceStore {
    invoices: Mutex<HashMap<InvoiceId, Invoice>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn insert(&self, invoice: &Invoice) -> BillingResult<()> {
        let mut invoices = self.invoices.lock().map_err(|_| lock_poisoned())?;
        if invoices.contains_key(&invoice.id) {
            return Err(BillingError::Conflict(format!(
                "invoice {} already exists",
                invoice.id
            )));
        }
        invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update(&self, invoice: &Invoice) -> BillingResult<()> {
        let mut invoices = self.invoices.lock().map_err(|_| lock_poisoned())?;
        if !invoices.contains_key(&invoice.id) {
            return Err(BillingError::NotFound(format!("invoice {}", invoice.id)));
        }
        invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn get(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let invoices = self.invoices.lock().map_err(|_| lock_poisoned())?;
        invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(format!("invoice {}", id)))
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Invoice>> {
        let invoices = self.invoices.lock().map_err(|_| lock_poisoned())?;
        let mut result: Vec<_> = invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by_key(|i| i.created_at);
        Ok(result)
    }
}
