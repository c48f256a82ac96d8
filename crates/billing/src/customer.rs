//! Billing customer profile
//!
//! One customer per tenant, carrying the data the fiat gateway needs. The
//! document is a CPF (11 digits) or CNPJ (14 digits); only the shape is
//! validated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use advoca_shared::{CustomerId, TenantId};

use crate::error::{BillingError, BillingResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub document: String,
    pub phone: String,
    pub address: Option<Address>,
    /// Customer reference at the fiat gateway
    pub gateway_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Customer {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        email: impl Into<String>,
        document: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::new(),
            tenant_id,
            name: name.into(),
            email: email.into(),
            document: document.into(),
            phone: phone.into(),
            address: None,
            gateway_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalizes the document to digits and checks the CPF/CNPJ shape
    pub fn validate(&mut self) -> BillingResult<()> {
        if self.name.trim().is_empty() {
            return Err(BillingError::Validation(
                "customer name is required".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(BillingError::Validation(format!(
                "invalid email: {}",
                self.email
            )));
        }
        self.document = validate_document(&self.document)?;
        Ok(())
    }
}

/// CPF (11 digits) or CNPJ (14 digits), not all the same digit. Returns the
/// normalized digits-only form. Check-digit arithmetic is left to the
/// gateway.
pub fn validate_document(document: &str) -> BillingResult<String> {
    let digits: String = document.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 11 && digits.len() != 14 {
        return Err(BillingError::Validation(
            "document must be a CPF (11 digits) or CNPJ (14 digits)".to_string(),
        ));
    }
    let first = digits.chars().next();
    if digits.chars().all(|c| Some(c) == first) {
        return Err(BillingError::Validation("invalid document".to_string()));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shapes() {
        assert_eq!(
            validate_document("123.456.789-09").unwrap(),
            "12345678909"
        );
        assert_eq!(
            validate_document("11.222.333/0001-81").unwrap(),
            "11222333000181"
        );
        assert!(validate_document("123").is_err());
        assert!(validate_document("11111111111").is_err());
        assert!(validate_document("00000000000000").is_err());
    }

    #[test]
    fn test_customer_validation() {
        let mut c = Customer::new(
            TenantId::new(),
            "Silva Advogados",
            "financeiro@silva.adv.br",
            "11.222.333/0001-81",
            "+5511999990000",
        );
        c.validate().unwrap();
        assert_eq!(c.document, "11222333000181");

        c.email = "not-an-email".to_string();
        assert!(c.validate().is_err());
    }
}
