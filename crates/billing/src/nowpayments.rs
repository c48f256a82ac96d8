//! NOWPayments-style crypto gateway client
//!
//! REST API with an `x-api-key` header. Charges are priced in fiat and paid
//! in the selected coin at the gateway's exchange rate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{CryptoCharge, CryptoChargeRequest, CryptoGateway};

pub struct NowPaymentsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    ipn_callback_url: Option<String>,
}

impl NowPaymentsClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            ipn_callback_url: config.callback_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct WirePaymentRequest<'a> {
    price_amount: f64,
    price_currency: &'a str,
    pay_currency: &'a str,
    order_id: &'a str,
    order_description: &'a str,
    customer_email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipn_callback_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct WirePaymentResponse {
    payment_id: serde_json::Value,
    pay_address: String,
    pay_amount: f64,
    #[serde(default)]
    exchange_rate: Option<f64>,
}

#[derive(Deserialize)]
struct WireStatusResponse {
    payment_status: String,
}

#[async_trait]
impl CryptoGateway for NowPaymentsClient {
    async fn create_payment(&self, request: &CryptoChargeRequest) -> BillingResult<CryptoCharge> {
        debug!(
            order_id = %request.order_id,
            pay_currency = %request.pay_currency,
            "creating crypto payment"
        );
        let body = WirePaymentRequest {
            price_amount: request.price_amount,
            price_currency: &request.price_currency,
            pay_currency: &request.pay_currency,
            order_id: &request.order_id,
            order_description: &request.description,
            customer_email: &request.customer_email,
            ipn_callback_url: self.ipn_callback_url.as_deref(),
        };
        let response = self
            .http
            .post(self.url("/v1/payment"))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Gateway(format!(
                "nowpayments returned {}: {}",
                status, body
            )));
        }
        let created: WirePaymentResponse = response.json().await?;
        Ok(CryptoCharge {
            // Numeric in some API versions, string in others
            payment_id: match created.payment_id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            pay_address: created.pay_address,
            pay_amount: created.pay_amount,
            exchange_rate: created.exchange_rate,
        })
    }

    async fn payment_status(&self, payment_id: &str) -> BillingResult<String> {
        let response = self
            .http
            .get(self.url(&format!("/v1/payment/{}", payment_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Gateway(format!(
                "nowpayments returned {}: {}",
                status, body
            )));
        }
        let parsed: WireStatusResponse = response.json().await?;
        Ok(parsed.payment_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_request_shape() {
        let body = WirePaymentRequest {
            price_amount: 299.0,
            price_currency: "brl",
            pay_currency: "btc",
            order_id: "pay-1",
            order_description: "Advoca Professional - monthly",
            customer_email: "contato@barbosalima.adv.br",
            ipn_callback_url: Some("https://billing.advoca.app/webhooks/nowpayments"),
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&body).unwrap()).unwrap();
        assert_eq!(json["price_amount"], 299.0);
        assert_eq!(json["pay_currency"], "btc");
        assert_eq!(json["customer_email"], "contato@barbosalima.adv.br");
        assert_eq!(
            json["ipn_callback_url"],
            "https://billing.advoca.app/webhooks/nowpayments"
        );

        // The callback key is omitted entirely when not configured
        let body = WirePaymentRequest {
            ipn_callback_url: None,
            ..body
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&body).unwrap()).unwrap();
        assert!(json.get("ipn_callback_url").is_none());
    }
}
