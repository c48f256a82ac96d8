//! Billing configuration from environment variables

use std::env;

use crate::error::{BillingError, BillingResult};

const ASAAS_SANDBOX_URL: &str = "https://sandbox.asaas.com/api";
const NOWPAYMENTS_URL: &str = "https://api.nowpayments.io";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    /// Webhook URL the gateway notifies on status changes, when configured
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub asaas: GatewayConfig,
    pub nowpayments: GatewayConfig,
    pub currency: String,
}

impl BillingConfig {
    /// Loads configuration from the environment. `.env` files are honored
    /// when present.
    pub fn from_env() -> BillingResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            asaas: GatewayConfig {
                api_key: require("ASAAS_API_KEY")?,
                base_url: env::var("ASAAS_BASE_URL")
                    .unwrap_or_else(|_| ASAAS_SANDBOX_URL.to_string()),
                callback_url: env::var("ASAAS_WEBHOOK_URL").ok(),
            },
            nowpayments: GatewayConfig {
                api_key: require("NOWPAYMENTS_API_KEY")?,
                base_url: env::var("NOWPAYMENTS_BASE_URL")
                    .unwrap_or_else(|_| NOWPAYMENTS_URL.to_string()),
                callback_url: env::var("NOWPAYMENTS_IPN_URL").ok(),
            },
            currency: env::var("BILLING_CURRENCY").unwrap_or_else(|_| "BRL".to_string()),
        })
    }
}

fn require(name: &str) -> BillingResult<String> {
    env::var(name).map_err(|_| BillingError::Config(format!("{} must be set", name)))
}
