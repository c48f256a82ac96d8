//! Payment orchestration
//!
//! Payments are persisted before the gateway is called, so a gateway outage
//! leaves an auditable Failed row instead of nothing. Crypto methods route
//! to the crypto gateway, everything else to the fiat gateway.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use advoca_shared::{EventPublisher, PaymentId, SubscriptionId, TenantId};
use advoca_tenant::SubscriptionService;

use crate::customer::Customer;
use crate::error::{BillingError, BillingResult};
use crate::events;
use crate::gateway::{ChargeRequest, CryptoChargeRequest, CryptoGateway, FiatGateway};
use crate::invoice::Invoice;
use crate::payment::{Payment, PaymentMethod};
use crate::store::{CustomerStore, InvoiceStore, PaymentStore};

use super::publish_best_effort;

/// Input for raising a charge against a subscription
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub subscription_id: SubscriptionId,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub description: String,
}

/// Aggregate payment figures for a tenant
#[derive(Debug, Clone, Default)]
pub struct PaymentStats {
    pub total: usize,
    pub paid: usize,
    pub failed: usize,
    pub refunded: usize,
    /// Sum of settled amounts, minor units
    pub amount_paid: i64,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    invoices: Arc<dyn InvoiceStore>,
    customers: Arc<dyn CustomerStore>,
    fiat: Arc<dyn FiatGateway>,
    crypto: Arc<dyn CryptoGateway>,
    subscriptions: Arc<SubscriptionService>,
    publisher: Arc<dyn EventPublisher>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        invoices: Arc<dyn InvoiceStore>,
        customers: Arc<dyn CustomerStore>,
        fiat: Arc<dyn FiatGateway>,
        crypto: Arc<dyn CryptoGateway>,
        subscriptions: Arc<SubscriptionService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            payments,
            invoices,
            customers,
            fiat,
            crypto,
            subscriptions,
            publisher,
        }
    }

    /// Raise a charge for a subscription. The subscription must be usable
    /// (trialing counts). The payment row is written first; if the gateway
    /// rejects the charge the row is marked Failed and the error returned.
    pub async fn create_payment(&self, input: CreatePayment) -> BillingResult<Payment> {
        let subscription = self
            .subscriptions
            .get_subscription(input.subscription_id)
            .await?;
        if !subscription.is_active() {
            return Err(BillingError::Validation(format!(
                "subscription is not active (status: {})",
                subscription.status
            )));
        }
        if input.amount <= 0 {
            return Err(BillingError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }

        let customer = self
            .customers
            .find_by_tenant(subscription.tenant_id)
            .await?
            .ok_or_else(|| {
                BillingError::NotFound(format!(
                    "billing customer for tenant {}",
                    subscription.tenant_id
                ))
            })?;

        let mut payment = Payment::new(
            subscription.tenant_id,
            subscription.id,
            input.amount,
            input.currency,
            input.method,
            input.description,
        );
        self.payments.insert(&payment).await?;

        if let Err(e) = self.dispatch(&mut payment, &customer).await {
            let mark = payment.mark_failed(e.to_string());
            if mark.is_ok() {
                self.payments.update(&payment).await?;
            }
            return Err(e);
        }
        self.payments.update(&payment).await?;

        info!(
            payment_id = %payment.id,
            subscription_id = %payment.subscription_id,
            amount = payment.amount,
            method = %payment.method,
            "payment created"
        );
        publish_best_effort(self.publisher.as_ref(), events::payment_created(&payment)).await;
        Ok(payment)
    }

    /// Hand the payment to its gateway and record the references
    async fn dispatch(&self, payment: &mut Payment, customer: &Customer) -> BillingResult<()> {
        if payment.method.is_crypto() {
            let pay_currency = payment.method.crypto_currency().ok_or_else(|| {
                BillingError::Validation(format!("{} is not a crypto method", payment.method))
            })?;
            let charge = self
                .crypto
                .create_payment(&CryptoChargeRequest {
                    price_amount: payment.amount as f64 / 100.0,
                    price_currency: payment.currency.to_lowercase(),
                    pay_currency: pay_currency.to_string(),
                    order_id: payment.id.to_string(),
                    description: payment.description.clone(),
                    customer_email: customer.email.clone(),
                })
                .await?;
            payment.crypto_payment_id = Some(charge.payment_id);
            payment.crypto_address = Some(charge.pay_address);
            payment.crypto_amount = Some(charge.pay_amount);
            payment.exchange_rate = charge.exchange_rate;
            payment.mark_processing()?;
        } else {
            let customer_ref = customer.gateway_customer_id.clone().ok_or_else(|| {
                BillingError::Validation(format!(
                    "customer {} is not registered with the fiat gateway",
                    customer.id
                ))
            })?;
            let charge = self
                .fiat
                .create_charge(&ChargeRequest {
                    customer_ref,
                    billing_type: payment.method.billing_type().to_string(),
                    value: payment.amount,
                    due_date: payment.due_date,
                    description: payment.description.clone(),
                    external_reference: payment.id.to_string(),
                })
                .await?;
            payment.fiat_payment_id = Some(charge.id);
            payment.mark_processing()?;

            let mut invoice = Invoice::new(
                payment.tenant_id,
                payment.subscription_id,
                payment.amount,
                payment.currency.clone(),
                payment.description.clone(),
                payment.due_date,
            );
            invoice.invoice_url = charge.invoice_url;
            invoice.bank_slip_url = charge.bank_slip_url;
            self.invoices.insert(&invoice).await?;
            payment.invoice_id = Some(invoice.id);
        }
        Ok(())
    }

    /// Settle a payment, typically from a gateway webhook. A payment can
    /// only be settled once; a second call is rejected.
    pub async fn process_payment_success(
        &self,
        id: PaymentId,
        transaction_id: Option<String>,
    ) -> BillingResult<Payment> {
        let mut payment = self.payments.get(id).await?;
        if payment.is_successful() {
            return Err(BillingError::Conflict(
                "payment is already successful".to_string(),
            ));
        }
        payment.mark_paid(transaction_id)?;
        self.payments.update(&payment).await?;

        self.subscriptions
            .record_payment_success(payment.subscription_id)
            .await?;

        if let Some(invoice_id) = payment.invoice_id {
            // Invoice settlement is bookkeeping; the payment stands either way
            match self.invoices.get(invoice_id).await {
                Ok(mut invoice) => {
                    if invoice.mark_paid().is_ok() {
                        if let Err(e) = self.invoices.update(&invoice).await {
                            warn!(invoice_id = %invoice_id, error = %e, "failed to settle invoice");
                        }
                    }
                }
                Err(e) => warn!(invoice_id = %invoice_id, error = %e, "invoice lookup failed"),
            }
        }

        info!(payment_id = %payment.id, "payment settled");
        publish_best_effort(self.publisher.as_ref(), events::payment_success(&payment)).await;
        Ok(payment)
    }

    /// Record a declined or expired charge. Schedules a retry while the
    /// ceiling allows and pushes the subscription toward PastDue.
    pub async fn process_payment_failure(
        &self,
        id: PaymentId,
        reason: &str,
    ) -> BillingResult<Payment> {
        let mut payment = self.payments.get(id).await?;
        payment.mark_failed(reason)?;
        self.payments.update(&payment).await?;

        self.subscriptions
            .record_payment_failure(payment.subscription_id)
            .await?;

        info!(
            payment_id = %payment.id,
            retry_count = payment.retry_count,
            will_retry = payment.can_retry(),
            reason,
            "payment failed"
        );
        publish_best_effort(self.publisher.as_ref(), events::payment_failed(&payment)).await;
        Ok(payment)
    }

    /// Sweep failed payments whose backoff has elapsed and send them back to
    /// their gateway. Best effort: one payment's gateway error re-marks that
    /// payment Failed and the sweep moves on.
    pub async fn retry_failed_payments(&self) -> BillingResult<usize> {
        let due = self.payments.list_retry_due(Utc::now()).await?;
        let mut retried = 0;
        for mut payment in due {
            let customer = match self.customers.find_by_tenant(payment.tenant_id).await? {
                Some(customer) => customer,
                None => {
                    warn!(payment_id = %payment.id, "no billing customer; skipping retry");
                    continue;
                }
            };
            if payment.mark_processing().is_err() {
                continue;
            }
            match self.dispatch(&mut payment, &customer).await {
                Ok(()) => {
                    self.payments.update(&payment).await?;
                    retried += 1;
                }
                Err(e) => {
                    warn!(payment_id = %payment.id, error = %e, "retry dispatch failed");
                    if payment.mark_failed(e.to_string()).is_ok() {
                        self.payments.update(&payment).await?;
                    }
                }
            }
        }
        if retried > 0 {
            info!(retried, "failed payments re-dispatched");
        }
        Ok(retried)
    }

    /// Refund a settled payment. Crypto payments are never refunded through
    /// the gateway; they require a manual operation.
    pub async fn refund_payment(
        &self,
        id: PaymentId,
        amount: Option<i64>,
    ) -> BillingResult<Payment> {
        let mut payment = self.payments.get(id).await?;
        if payment.method.is_crypto() {
            return Err(BillingError::Refund(
                "crypto payments cannot be refunded automatically".to_string(),
            ));
        }
        if !payment.is_successful() {
            return Err(BillingError::Validation(
                "only successful payments can be refunded".to_string(),
            ));
        }
        let charge_id = payment.fiat_payment_id.clone().ok_or_else(|| {
            BillingError::Validation("payment has no gateway charge to refund".to_string())
        })?;
        let amount = amount.unwrap_or(payment.amount);
        if amount <= 0 || amount > payment.amount {
            return Err(BillingError::Validation(
                "refund amount must be positive and at most the paid amount".to_string(),
            ));
        }

        self.fiat.refund_charge(&charge_id, amount).await?;
        payment.mark_refunded(amount)?;
        self.payments.update(&payment).await?;

        info!(payment_id = %payment.id, amount, "payment refunded");
        publish_best_effort(self.publisher.as_ref(), events::payment_refunded(&payment)).await;
        Ok(payment)
    }

    pub async fn get_payment(&self, id: PaymentId) -> BillingResult<Payment> {
        self.payments.get(id).await
    }

    pub async fn payments_for_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> BillingResult<Vec<Payment>> {
        self.payments.list_by_subscription(subscription_id).await
    }

    pub async fn payments_for_tenant(&self, tenant_id: TenantId) -> BillingResult<Vec<Payment>> {
        self.payments.list_by_tenant(tenant_id).await
    }

    pub async fn payment_stats(&self, tenant_id: TenantId) -> BillingResult<PaymentStats> {
        let payments = self.payments.list_by_tenant(tenant_id).await?;
        let mut stats = PaymentStats {
            total: payments.len(),
            ..Default::default()
        };
        for payment in &payments {
            match payment.status {
                crate::payment::PaymentStatus::Paid => {
                    stats.paid += 1;
                    stats.amount_paid += payment.amount;
                }
                crate::payment::PaymentStatus::Failed => stats.failed += 1,
                crate::payment::PaymentStatus::Refunded => stats.refunded += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}
