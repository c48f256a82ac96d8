//! Onboarding orchestration
//!
//! A strictly sequential flow: tenant, billing customer, subscription, first
//! payment. There is no compensation; when a later stage fails the earlier
//! records stay and the result reports the partial progress, so the flow can
//! be resumed or cleaned up manually.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use advoca_shared::{
    BillingInterval, CustomerId, EventPublisher, PaymentId, Plan, PlanId, SubscriptionId,
    TenantId, UserId,
};
use advoca_tenant::service::CreateTenant;
use advoca_tenant::store::PlanStore;
use advoca_tenant::{SubscriptionService, SubscriptionStatus, TenantService, TenantStatus};

use crate::customer::{validate_document, Address, Customer};
use crate::error::{BillingError, BillingResult};
use crate::events;
use crate::gateway::FiatGateway;
use crate::payment::PaymentMethod;
use crate::service::payment::{CreatePayment, PaymentService};
use crate::store::{CustomerStore, InvoiceStore};

use super::publish_best_effort;

/// A plan is a free trial only when it has trial days AND costs nothing
/// monthly. A priced plan with trial days still gets its first payment
/// raised immediately, while the subscription is Trialing.
pub fn is_free_trial(plan: &Plan) -> bool {
    plan.trial_days > 0 && plan.price_monthly == 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub holder_name: String,
    pub number: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvv: String,
}

#[derive(Debug, Clone)]
pub struct OnboardingRequest {
    pub firm_name: String,
    pub legal_name: String,
    /// CPF or CNPJ
    pub document: String,
    pub email: String,
    pub phone: String,
    pub owner_user_id: UserId,
    pub plan_id: PlanId,
    pub billing_interval: BillingInterval,
    pub payment_method: PaymentMethod,
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
    pub card: Option<CardDetails>,
    pub address: Option<Address>,
}

/// Outcome of an onboarding attempt. Carries whatever was created even when
/// a later stage failed.
#[derive(Debug, Clone, Default)]
pub struct OnboardingResult {
    pub success: bool,
    pub message: String,
    pub tenant_id: Option<TenantId>,
    pub customer_id: Option<CustomerId>,
    pub subscription_id: Option<SubscriptionId>,
    pub payment_id: Option<PaymentId>,
    pub trial_end: Option<DateTime<Utc>>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub payment_url: Option<String>,
    pub bank_slip_url: Option<String>,
    pub crypto_address: Option<String>,
    pub crypto_amount: Option<f64>,
}

impl OnboardingResult {
    fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.message = message.into();
        self
    }
}

/// Where a tenant stands in the onboarding funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStage {
    NotStarted,
    InTrial,
    AwaitingPayment,
    Completed,
    Canceled,
}

pub struct OnboardingService {
    tenants: Arc<TenantService>,
    subscriptions: Arc<SubscriptionService>,
    payments: Arc<PaymentService>,
    plans: Arc<dyn PlanStore>,
    customers: Arc<dyn CustomerStore>,
    invoices: Arc<dyn InvoiceStore>,
    fiat: Arc<dyn FiatGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl OnboardingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenants: Arc<TenantService>,
        subscriptions: Arc<SubscriptionService>,
        payments: Arc<PaymentService>,
        plans: Arc<dyn PlanStore>,
        customers: Arc<dyn CustomerStore>,
        invoices: Arc<dyn InvoiceStore>,
        fiat: Arc<dyn FiatGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            tenants,
            subscriptions,
            payments,
            plans,
            customers,
            invoices,
            fiat,
            publisher,
        }
    }

    /// Run the onboarding flow. Validation errors fail fast with no side
    /// effects; once the tenant exists, stage failures are reported in the
    /// result with the ids created so far.
    pub async fn start_onboarding(
        &self,
        request: OnboardingRequest,
    ) -> BillingResult<OnboardingResult> {
        self.validate(&request)?;

        let plan = self.plans.get(request.plan_id).await.map_err(BillingError::from)?;
        if !plan.is_active {
            return Err(BillingError::Validation(format!(
                "plan {} is not available",
                plan.name
            )));
        }

        let tenant = self
            .tenants
            .create_tenant(CreateTenant {
                name: request.firm_name.clone(),
                legal_name: request.legal_name.clone(),
                document: request.document.clone(),
                email: request.email.clone(),
                phone: request.phone.clone(),
                plan_type: plan.plan_type,
                owner_user_id: request.owner_user_id,
            })
            .await?;

        let mut result = OnboardingResult {
            tenant_id: Some(tenant.id),
            ..Default::default()
        };

        // Billing customer; fiat methods also register at the gateway
        let mut customer = Customer::new(
            tenant.id,
            if request.legal_name.is_empty() {
                request.firm_name.clone()
            } else {
                request.legal_name.clone()
            },
            request.email.clone(),
            request.document.clone(),
            request.phone.clone(),
        );
        customer.address = request.address.clone();
        if let Err(e) = customer.validate() {
            return Ok(result.failed(e.to_string()));
        }
        if !request.payment_method.is_crypto() {
            match self.fiat.create_customer(&customer).await {
                Ok(gateway_id) => customer.gateway_customer_id = Some(gateway_id),
                Err(e) => {
                    warn!(tenant_id = %tenant.id, error = %e, "gateway customer creation failed");
                    return Ok(result.failed(e.to_string()));
                }
            }
        }
        if let Err(e) = self.customers.insert(&customer).await {
            return Ok(result.failed(e.to_string()));
        }
        result.customer_id = Some(customer.id);
        publish_best_effort(self.publisher.as_ref(), events::customer_created(&customer)).await;

        let subscription = match self
            .subscriptions
            .create_subscription(tenant.id, plan.id, request.billing_interval)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => return Ok(result.failed(e.to_string())),
        };
        result.subscription_id = Some(subscription.id);
        result.trial_end = subscription.trial_end;
        result.next_billing_date = Some(subscription.current_period_end);

        if is_free_trial(&plan) {
            // Nothing to charge; the tenant can start working right away
            if let Err(e) = self.tenants.activate_tenant(tenant.id).await {
                return Ok(result.failed(e.to_string()));
            }
            result.success = true;
            result.message = "free trial started".to_string();
            info!(tenant_id = %tenant.id, plan = %plan.name, "onboarding completed (free trial)");
            return Ok(result);
        }

        let payment = match self
            .payments
            .create_payment(CreatePayment {
                subscription_id: subscription.id,
                amount: plan.price(request.billing_interval),
                currency: plan.currency.clone(),
                method: request.payment_method,
                description: format!("{} - {}", plan.name, request.billing_interval),
            })
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                return Ok(result.failed(format!("first payment failed: {}", e)));
            }
        };
        result.payment_id = Some(payment.id);
        result.crypto_address = payment.crypto_address.clone();
        result.crypto_amount = payment.crypto_amount;
        if let Some(invoice_id) = payment.invoice_id {
            if let Ok(invoice) = self.invoices.get(invoice_id).await {
                result.payment_url = invoice.invoice_url;
                result.bank_slip_url = invoice.bank_slip_url;
            }
        }

        result.success = true;
        result.message = if subscription.status == SubscriptionStatus::Trialing {
            "trial started; first payment pending".to_string()
        } else {
            "onboarding completed; first payment pending".to_string()
        };
        info!(
            tenant_id = %tenant.id,
            subscription_id = %subscription.id,
            payment_id = %payment.id,
            "onboarding completed"
        );
        Ok(result)
    }

    /// Finish onboarding after the first payment settles: the pending
    /// tenant becomes active. Idempotent for already-active tenants.
    pub async fn complete_onboarding(&self, tenant_id: TenantId) -> BillingResult<()> {
        let tenant = self.tenants.get_tenant(tenant_id).await?;
        if tenant.status == TenantStatus::Active {
            return Ok(());
        }
        let subscription = self
            .subscriptions
            .live_subscription(tenant_id)
            .await?
            .ok_or_else(|| {
                BillingError::Conflict("tenant has no live subscription".to_string())
            })?;
        if !subscription.is_active() {
            return Err(BillingError::Conflict(format!(
                "subscription is not active (status: {})",
                subscription.status
            )));
        }
        self.tenants.activate_tenant(tenant_id).await?;
        info!(tenant_id = %tenant_id, "onboarding finalized");
        Ok(())
    }

    /// Funnel stage derived from tenant and subscription state
    pub async fn onboarding_status(&self, tenant_id: TenantId) -> BillingResult<OnboardingStage> {
        let tenant = match self.tenants.get_tenant(tenant_id).await {
            Ok(tenant) => tenant,
            Err(advoca_tenant::TenantError::NotFound(_)) => return Ok(OnboardingStage::NotStarted),
            Err(e) => return Err(e.into()),
        };
        if tenant.status == TenantStatus::Canceled {
            return Ok(OnboardingStage::Canceled);
        }
        let subscription = self.subscriptions.live_subscription(tenant_id).await?;
        Ok(match subscription {
            None => OnboardingStage::NotStarted,
            Some(s) => match s.status {
                SubscriptionStatus::Trialing => OnboardingStage::InTrial,
                SubscriptionStatus::Active if tenant.status == TenantStatus::Active => {
                    OnboardingStage::Completed
                }
                SubscriptionStatus::Active | SubscriptionStatus::PastDue => {
                    OnboardingStage::AwaitingPayment
                }
                _ => OnboardingStage::Canceled,
            },
        })
    }

    /// CPF/CNPJ shape check exposed for pre-submit validation
    pub fn validate_document(&self, document: &str) -> BillingResult<String> {
        validate_document(document)
    }

    pub async fn available_plans(&self) -> BillingResult<Vec<Plan>> {
        Ok(self.plans.list_active().await?)
    }

    fn validate(&self, request: &OnboardingRequest) -> BillingResult<()> {
        if request.firm_name.trim().is_empty() {
            return Err(BillingError::Validation("firm name is required".to_string()));
        }
        if !request.email.contains('@') {
            return Err(BillingError::Validation(format!(
                "invalid email: {}",
                request.email
            )));
        }
        validate_document(&request.document)?;
        if !request.terms_accepted {
            return Err(BillingError::Validation(
                "terms of service must be accepted".to_string(),
            ));
        }
        if !request.privacy_accepted {
            return Err(BillingError::Validation(
                "privacy policy must be accepted".to_string(),
            ));
        }
        if matches!(
            request.payment_method,
            PaymentMethod::CreditCard | PaymentMethod::DebitCard
        ) {
            let card = request.card.as_ref().ok_or_else(|| {
                BillingError::Validation("card details are required for card payments".to_string())
            })?;
            if card.holder_name.trim().is_empty()
                || card.number.trim().is_empty()
                || card.cvv.trim().is_empty()
            {
                return Err(BillingError::Validation(
                    "card details are incomplete".to_string(),
                ));
            }
        }
        if request.payment_method == PaymentMethod::Boleto && request.address.is_none() {
            return Err(BillingError::Validation(
                "billing address is required for boleto".to_string(),
            ));
        }
        Ok(())
    }
}
