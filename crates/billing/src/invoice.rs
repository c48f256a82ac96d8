//! Invoices mirror charges raised at the gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use advoca_shared::{InvoiceId, SubscriptionId, TenantId};

use crate::error::{BillingError, BillingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Void,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Paid => write!(f, "paid"),
            Self::Void => write!(f, "void"),
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "paid" => Ok(Self::Paid),
            "void" => Ok(Self::Void),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub subscription_id: SubscriptionId,
    pub amount: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Hosted payment page at the gateway
    pub invoice_url: Option<String>,
    pub bank_slip_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        amount: i64,
        currency: impl Into<String>,
        description: impl Into<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InvoiceId::new(),
            tenant_id,
            subscription_id,
            amount,
            currency: currency.into(),
            status: InvoiceStatus::Open,
            description: description.into(),
            due_date,
            paid_at: None,
            invoice_url: None,
            bank_slip_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_paid(&mut self) -> BillingResult<()> {
        if self.status != InvoiceStatus::Open {
            return Err(BillingError::InvalidTransition {
                entity: "invoice",
                from: self.status.to_string(),
                to: InvoiceStatus::Paid.to_string(),
            });
        }
        let now = Utc::now();
        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn void(&mut self) -> BillingResult<()> {
        if self.status != InvoiceStatus::Open {
            return Err(BillingError::InvalidTransition {
                entity: "invoice",
                from: self.status.to_string(),
                to: InvoiceStatus::Void.to_string(),
            });
        }
        self.status = InvoiceStatus::Void;
        self.updated_at = Utc::now();
        Ok(())
    }
}
