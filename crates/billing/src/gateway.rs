//! Gateway ports
//!
//! Two independent processors: a Brazilian fiat gateway (boleto, pix, cards)
//! and a crypto processor. Services talk to these traits; the HTTP clients
//! live in `asaas` and `nowpayments`, mocks live with the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::customer::Customer;
use crate::error::BillingResult;

/// Charge to raise at the fiat gateway
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    /// Gateway-side customer reference
    pub customer_ref: String,
    /// CREDIT_CARD / DEBIT_CARD / PIX / BOLETO
    pub billing_type: String,
    /// Minor units
    pub value: i64,
    pub due_date: DateTime<Utc>,
    pub description: String,
    /// Our payment id, echoed back in webhooks
    pub external_reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub status: String,
    pub invoice_url: Option<String>,
    pub bank_slip_url: Option<String>,
}

#[async_trait]
pub trait FiatGateway: Send + Sync {
    /// Register the customer and return the gateway's reference for it
    async fn create_customer(&self, customer: &Customer) -> BillingResult<String>;
    async fn create_charge(&self, request: &ChargeRequest) -> BillingResult<Charge>;
    async fn refund_charge(&self, charge_id: &str, amount: i64) -> BillingResult<()>;
}

/// Crypto charge: priced in fiat, paid in the chosen coin
#[derive(Debug, Clone, Serialize)]
pub struct CryptoChargeRequest {
    /// Fiat price in major units
    pub price_amount: f64,
    pub price_currency: String,
    /// Coin ticker (btc, eth, ...)
    pub pay_currency: String,
    pub order_id: String,
    pub description: String,
    pub customer_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoCharge {
    pub payment_id: String,
    pub pay_address: String,
    /// Amount due in the pay currency
    pub pay_amount: f64,
    pub exchange_rate: Option<f64>,
}

#[async_trait]
pub trait CryptoGateway: Send + Sync {
    async fn create_payment(&self, request: &CryptoChargeRequest) -> BillingResult<CryptoCharge>;
    /// Gateway-side status string (waiting, confirming, finished, failed...)
    async fn payment_status(&self, payment_id: &str) -> BillingResult<String>;
}
