//! Asaas-style fiat gateway client
//!
//! REST API with an `access_token` header. Values go over the wire in major
//! units (reais), due dates as `YYYY-MM-DD`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::customer::Customer;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{Charge, ChargeRequest, FiatGateway};

pub struct AsaasClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AsaasClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> BillingResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Gateway(format!(
                "asaas returned {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }
}

#[derive(Serialize)]
struct WireCustomer<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(rename = "cpfCnpj")]
    cpf_cnpj: &'a str,
    #[serde(rename = "mobilePhone")]
    mobile_phone: &'a str,
    #[serde(rename = "externalReference")]
    external_reference: String,
}

#[derive(Deserialize)]
struct WireCustomerResponse {
    id: String,
}

#[derive(Serialize)]
struct WireCharge<'a> {
    customer: &'a str,
    #[serde(rename = "billingType")]
    billing_type: &'a str,
    /// Major units
    value: f64,
    #[serde(rename = "dueDate")]
    due_date: String,
    description: &'a str,
    #[serde(rename = "externalReference")]
    external_reference: &'a str,
}

#[derive(Deserialize)]
struct WireChargeResponse {
    id: String,
    status: String,
    #[serde(rename = "invoiceUrl")]
    invoice_url: Option<String>,
    #[serde(rename = "bankSlipUrl")]
    bank_slip_url: Option<String>,
}

#[derive(Serialize)]
struct WireRefund {
    /// Major units
    value: f64,
}

#[async_trait]
impl FiatGateway for AsaasClient {
    async fn create_customer(&self, customer: &Customer) -> BillingResult<String> {
        debug!(tenant_id = %customer.tenant_id, "creating asaas customer");
        let body = WireCustomer {
            name: &customer.name,
            email: &customer.email,
            cpf_cnpj: &customer.document,
            mobile_phone: &customer.phone,
            external_reference: customer.tenant_id.to_string(),
        };
        let response = self
            .http
            .post(self.url("/v3/customers"))
            .header("access_token", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let created: WireCustomerResponse = Self::check(response).await?;
        Ok(created.id)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> BillingResult<Charge> {
        debug!(
            external_reference = %request.external_reference,
            billing_type = %request.billing_type,
            "creating asaas charge"
        );
        let body = WireCharge {
            customer: &request.customer_ref,
            billing_type: &request.billing_type,
            value: request.value as f64 / 100.0,
            due_date: request.due_date.format("%Y-%m-%d").to_string(),
            description: &request.description,
            external_reference: &request.external_reference,
        };
        let response = self
            .http
            .post(self.url("/v3/payments"))
            .header("access_token", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let charge: WireChargeResponse = Self::check(response).await?;
        Ok(Charge {
            id: charge.id,
            status: charge.status,
            invoice_url: charge.invoice_url,
            bank_slip_url: charge.bank_slip_url,
        })
    }

    async fn refund_charge(&self, charge_id: &str, amount: i64) -> BillingResult<()> {
        debug!(charge_id, amount, "refunding asaas charge");
        let response = self
            .http
            .post(self.url(&format!("/v3/payments/{}/refund", charge_id)))
            .header("access_token", &self.api_key)
            .json(&WireRefund {
                value: amount as f64 / 100.0,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Gateway(format!(
                "asaas refund returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}
