//! Payment aggregate
//!
//! Amounts are in minor units (centavos). Fiat methods settle through the
//! Asaas-style gateway, crypto methods through the NOWPayments-style one.
//! A failed payment can be retried up to three times with quadratic backoff
//! (retries^2 hours, capped at 24h).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use advoca_shared::{InvoiceId, PaymentId, SubscriptionId, TenantId};

use crate::error::{BillingError, BillingResult};

pub const MAX_RETRIES: i32 = 3;

/// How the tenant pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
    Boleto,
    Bitcoin,
    Ethereum,
    Solana,
    Xrp,
    Xlm,
    Cardano,
}

impl PaymentMethod {
    pub fn is_crypto(&self) -> bool {
        matches!(
            self,
            Self::Bitcoin | Self::Ethereum | Self::Solana | Self::Xrp | Self::Xlm | Self::Cardano
        )
    }

    /// Ticker the crypto gateway expects as the pay currency
    pub fn crypto_currency(&self) -> Option<&'static str> {
        match self {
            Self::Bitcoin => Some("btc"),
            Self::Ethereum => Some("eth"),
            Self::Solana => Some("sol"),
            Self::Xrp => Some("xrp"),
            Self::Xlm => Some("xlm"),
            Self::Cardano => Some("ada"),
            _ => None,
        }
    }

    /// Billing type the fiat gateway expects; everything unknown bills as
    /// boleto.
    pub fn billing_type(&self) -> &'static str {
        match self {
            Self::CreditCard => "CREDIT_CARD",
            Self::DebitCard => "DEBIT_CARD",
            Self::Pix => "PIX",
            _ => "BOLETO",
        }
    }

    /// Days of slack before the charge is due: boleto clears slowly, pix
    /// within a day, everything else is immediate.
    pub fn due_in_days(&self) -> i64 {
        match self {
            Self::Boleto => 7,
            Self::Pix => 1,
            _ => 0,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::Pix => "pix",
            Self::Boleto => "boleto",
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
            Self::Xrp => "xrp",
            Self::Xlm => "xlm",
            Self::Cardano => "cardano",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "pix" => Ok(Self::Pix),
            "boleto" => Ok(Self::Boleto),
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "solana" | "sol" => Ok(Self::Solana),
            "xrp" => Ok(Self::Xrp),
            "xlm" => Ok(Self::Xlm),
            "cardano" | "ada" => Ok(Self::Cardano),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub subscription_id: SubscriptionId,
    pub invoice_id: Option<InvoiceId>,
    /// Minor units (centavos)
    pub amount: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub description: String,
    pub fiat_payment_id: Option<String>,
    pub crypto_payment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub crypto_address: Option<String>,
    pub crypto_amount: Option<f64>,
    pub crypto_tx_hash: Option<String>,
    pub exchange_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        amount: i64,
        currency: impl Into<String>,
        method: PaymentMethod,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            tenant_id,
            subscription_id,
            invoice_id: None,
            amount,
            currency: currency.into(),
            method,
            status: PaymentStatus::Pending,
            description: description.into(),
            fiat_payment_id: None,
            crypto_payment_id: None,
            transaction_id: None,
            due_date: now + Duration::days(method.due_in_days()),
            paid_at: None,
            retry_count: 0,
            next_retry_at: None,
            failure_reason: None,
            refunded_at: None,
            refund_amount: None,
            crypto_address: None,
            crypto_amount: None,
            crypto_tx_hash: None,
            exchange_rate: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_RETRIES
    }

    /// Failed payments become retryable once their backoff has elapsed
    pub fn is_retry_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Failed
            && self.can_retry()
            && self.next_retry_at.is_some_and(|at| at <= now)
    }

    /// Quadratic backoff: 1h, 4h, 9h... capped at 24h
    pub fn retry_delay(retry_count: i32) -> Duration {
        let hours = i64::from(retry_count).pow(2).min(24);
        Duration::hours(hours)
    }

    pub fn mark_processing(&mut self) -> BillingResult<()> {
        match self.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Failed if self.can_retry() => {}
            _ => return Err(self.invalid_transition(PaymentStatus::Processing)),
        }
        self.status = PaymentStatus::Processing;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_paid(&mut self, transaction_id: Option<String>) -> BillingResult<()> {
        if !matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        ) {
            return Err(self.invalid_transition(PaymentStatus::Paid));
        }
        let now = Utc::now();
        self.status = PaymentStatus::Paid;
        self.paid_at = Some(now);
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.next_retry_at = None;
        self.failure_reason = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> BillingResult<()> {
        if matches!(self.status, PaymentStatus::Paid | PaymentStatus::Refunded) {
            return Err(self.invalid_transition(PaymentStatus::Failed));
        }
        let now = Utc::now();
        self.status = PaymentStatus::Failed;
        self.retry_count += 1;
        self.failure_reason = Some(reason.into());
        self.next_retry_at = if self.can_retry() {
            Some(now + Self::retry_delay(self.retry_count))
        } else {
            None
        };
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_refunded(&mut self, amount: i64) -> BillingResult<()> {
        if self.status != PaymentStatus::Paid {
            return Err(self.invalid_transition(PaymentStatus::Refunded));
        }
        let now = Utc::now();
        self.status = PaymentStatus::Refunded;
        self.refunded_at = Some(now);
        self.refund_amount = Some(amount);
        self.updated_at = now;
        Ok(())
    }

    fn invalid_transition(&self, to: PaymentStatus) -> BillingError {
        BillingError::InvalidTransition {
            entity: "payment",
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(method: PaymentMethod) -> Payment {
        Payment::new(
            TenantId::new(),
            SubscriptionId::new(),
            29_900,
            "BRL",
            method,
            "Advoca Professional - monthly",
        )
    }

    #[test]
    fn test_due_date_by_method() {
        let now = Utc::now();
        let boleto = payment(PaymentMethod::Boleto);
        assert_eq!((boleto.due_date - now).num_days(), 7);
        let pix = payment(PaymentMethod::Pix);
        assert_eq!((pix.due_date - now).num_days(), 1);
        let card = payment(PaymentMethod::CreditCard);
        assert_eq!((card.due_date - now).num_days(), 0);
        let btc = payment(PaymentMethod::Bitcoin);
        assert_eq!((btc.due_date - now).num_days(), 0);
    }

    #[test]
    fn test_billing_type_mapping() {
        assert_eq!(PaymentMethod::CreditCard.billing_type(), "CREDIT_CARD");
        assert_eq!(PaymentMethod::DebitCard.billing_type(), "DEBIT_CARD");
        assert_eq!(PaymentMethod::Pix.billing_type(), "PIX");
        assert_eq!(PaymentMethod::Boleto.billing_type(), "BOLETO");
        // Crypto never reaches the fiat gateway; mapping falls back to boleto
        assert_eq!(PaymentMethod::Bitcoin.billing_type(), "BOLETO");
    }

    #[test]
    fn test_crypto_detection() {
        assert!(PaymentMethod::Bitcoin.is_crypto());
        assert!(PaymentMethod::Cardano.is_crypto());
        assert!(!PaymentMethod::Pix.is_crypto());
        assert_eq!(PaymentMethod::Ethereum.crypto_currency(), Some("eth"));
        assert_eq!(PaymentMethod::Boleto.crypto_currency(), None);
    }

    #[test]
    fn test_retry_backoff_is_quadratic_and_capped() {
        assert_eq!(Payment::retry_delay(1), Duration::hours(1));
        assert_eq!(Payment::retry_delay(2), Duration::hours(4));
        assert_eq!(Payment::retry_delay(3), Duration::hours(9));
        assert_eq!(Payment::retry_delay(5), Duration::hours(24));
    }

    #[test]
    fn test_failure_schedules_retry_until_ceiling() {
        let mut p = payment(PaymentMethod::CreditCard);
        p.mark_failed("card declined").unwrap();
        assert_eq!(p.retry_count, 1);
        assert!(p.next_retry_at.is_some());
        assert!(p.can_retry());

        p.mark_processing().unwrap();
        p.mark_failed("card declined").unwrap();
        p.mark_processing().unwrap();
        p.mark_failed("card declined").unwrap();
        assert_eq!(p.retry_count, 3);
        assert!(!p.can_retry());
        assert!(p.next_retry_at.is_none());
        // Retry ceiling reached: no more processing attempts
        assert!(p.mark_processing().is_err());
    }

    #[test]
    fn test_paid_payment_cannot_fail_or_pay_again() {
        let mut p = payment(PaymentMethod::Pix);
        p.mark_paid(Some("txn_1".to_string())).unwrap();
        assert!(p.is_successful());
        assert!(p.mark_paid(None).is_err());
        assert!(p.mark_failed("late webhook").is_err());
    }

    #[test]
    fn test_refund_requires_paid() {
        let mut p = payment(PaymentMethod::CreditCard);
        assert!(p.mark_refunded(29_900).is_err());
        p.mark_paid(None).unwrap();
        p.mark_refunded(29_900).unwrap();
        assert_eq!(p.status, PaymentStatus::Refunded);
        assert_eq!(p.refund_amount, Some(29_900));
    }

    #[test]
    fn test_retry_due_needs_elapsed_backoff() {
        let mut p = payment(PaymentMethod::CreditCard);
        p.mark_failed("gateway timeout").unwrap();
        assert!(!p.is_retry_due(Utc::now()));
        assert!(p.is_retry_due(Utc::now() + Duration::hours(2)));
    }
}
