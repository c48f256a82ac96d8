//! Shared fixture: in-memory stores wired to mock gateways

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use advoca_billing::customer::Customer;
use advoca_billing::error::{BillingError, BillingResult};
use advoca_billing::gateway::{
    Charge, ChargeRequest, CryptoCharge, CryptoChargeRequest, CryptoGateway, FiatGateway,
};
use advoca_billing::memory::{MemoryCustomerStore, MemoryInvoiceStore, MemoryPaymentStore};
use advoca_billing::service::{OnboardingService, PaymentService};
use advoca_shared::{
    default_plans, EventPublisher, MemoryPublisher, Plan, PlanId, PlanType,
};
use advoca_tenant::memory::{
    MemoryPlanStore, MemoryQuotaStore, MemorySubscriptionStore, MemoryTenantStore,
};
use advoca_tenant::{SubscriptionService, TenantService};

#[derive(Default)]
pub struct MockFiatGateway {
    pub fail_charges: AtomicBool,
    pub fail_customers: AtomicBool,
    pub charges: Mutex<Vec<ChargeRequest>>,
    pub refunds: Mutex<Vec<(String, i64)>>,
}

#[async_trait]
impl FiatGateway for MockFiatGateway {
    async fn create_customer(&self, customer: &Customer) -> BillingResult<String> {
        if self.fail_customers.load(Ordering::SeqCst) {
            return Err(BillingError::Gateway("customer rejected".to_string()));
        }
        Ok(format!("cus_{}", customer.tenant_id))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> BillingResult<Charge> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(BillingError::Gateway("charge rejected".to_string()));
        }
        self.charges.lock().unwrap().push(request.clone());
        Ok(Charge {
            id: format!("pay_{}", request.external_reference),
            status: "PENDING".to_string(),
            invoice_url: Some("https://gateway.test/i/1".to_string()),
            bank_slip_url: (request.billing_type == "BOLETO")
                .then(|| "https://gateway.test/b/1".to_string()),
        })
    }

    async fn refund_charge(&self, charge_id: &str, amount: i64) -> BillingResult<()> {
        self.refunds
            .lock()
            .unwrap()
            .push((charge_id.to_string(), amount));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCryptoGateway {
    pub fail_charges: AtomicBool,
    pub charges: Mutex<Vec<CryptoChargeRequest>>,
}

#[async_trait]
impl CryptoGateway for MockCryptoGateway {
    async fn create_payment(&self, request: &CryptoChargeRequest) -> BillingResult<CryptoCharge> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(BillingError::Gateway("crypto charge rejected".to_string()));
        }
        self.charges.lock().unwrap().push(request.clone());
        Ok(CryptoCharge {
            payment_id: format!("np_{}", request.order_id),
            pay_address: "bc1qtestaddress".to_string(),
            pay_amount: 0.0005,
            exchange_rate: Some(598_000.0),
        })
    }

    async fn payment_status(&self, _payment_id: &str) -> BillingResult<String> {
        Ok("waiting".to_string())
    }
}

pub struct World {
    pub tenants: Arc<TenantService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub payments: Arc<PaymentService>,
    pub onboarding: OnboardingService,
    pub publisher: Arc<MemoryPublisher>,
    pub fiat: Arc<MockFiatGateway>,
    pub crypto: Arc<MockCryptoGateway>,
    pub payment_store: Arc<MemoryPaymentStore>,
    pub customer_store: Arc<MemoryCustomerStore>,
    pub plan_store: Arc<MemoryPlanStore>,
    pub catalog: Vec<Plan>,
}

impl World {
    pub fn plan_id(&self, plan_type: PlanType) -> PlanId {
        self.catalog
            .iter()
            .find(|p| p.plan_type == plan_type)
            .map(|p| p.id)
            .unwrap()
    }
}

pub fn world() -> World {
    let publisher = Arc::new(MemoryPublisher::new());
    let catalog = default_plans();

    let plan_store = Arc::new(MemoryPlanStore::new());
    for plan in &catalog {
        plan_store.insert(plan.clone()).unwrap();
    }

    let tenant_store = Arc::new(MemoryTenantStore::new());
    let quota_store = Arc::new(MemoryQuotaStore::new());
    let subscription_store = Arc::new(MemorySubscriptionStore::new());
    let payment_store = Arc::new(MemoryPaymentStore::new());
    let customer_store = Arc::new(MemoryCustomerStore::new());
    let invoice_store = Arc::new(MemoryInvoiceStore::new());

    let fiat = Arc::new(MockFiatGateway::default());
    let crypto = Arc::new(MockCryptoGateway::default());

    let tenants = Arc::new(TenantService::new(
        tenant_store.clone(),
        quota_store,
        publisher.clone() as Arc<dyn EventPublisher>,
    ));
    let subscriptions = Arc::new(SubscriptionService::new(
        subscription_store,
        plan_store.clone(),
        tenant_store,
        publisher.clone() as Arc<dyn EventPublisher>,
    ));
    let payments = Arc::new(PaymentService::new(
        payment_store.clone(),
        invoice_store.clone(),
        customer_store.clone(),
        fiat.clone(),
        crypto.clone(),
        subscriptions.clone(),
        publisher.clone() as Arc<dyn EventPublisher>,
    ));
    let onboarding = OnboardingService::new(
        tenants.clone(),
        subscriptions.clone(),
        payments.clone(),
        plan_store.clone(),
        customer_store.clone(),
        invoice_store,
        fiat.clone(),
        publisher.clone() as Arc<dyn EventPublisher>,
    );

    World {
        tenants,
        subscriptions,
        payments,
        onboarding,
        publisher,
        fiat,
        crypto,
        payment_store,
        customer_store,
        plan_store,
        catalog,
    }
}
