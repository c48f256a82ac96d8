//! Common types used across Advoca

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

macro_rules! id_wrapper {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_wrapper!(
    /// Tenant (customer organization) ID
    TenantId
);
id_wrapper!(
    /// Subscription ID
    SubscriptionId
);
id_wrapper!(
    /// Plan ID
    PlanId
);
id_wrapper!(
    /// Payment ID
    PaymentId
);
id_wrapper!(
    /// Billing customer ID
    CustomerId
);
id_wrapper!(
    /// Invoice ID
    InvoiceId
);
id_wrapper!(
    /// User ID
    UserId
);

// =============================================================================
// Billing interval
// =============================================================================

/// Billing interval for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl Default for BillingInterval {
    fn default() -> Self {
        Self::Monthly
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Invalid billing interval: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trips_through_serde() {
        let id = TenantId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        // Transparent wrapper: serializes as a bare UUID string
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    #[test]
    fn test_billing_interval_parse() {
        assert_eq!(
            "monthly".parse::<BillingInterval>().unwrap(),
            BillingInterval::Monthly
        );
        assert_eq!(
            "YEARLY".parse::<BillingInterval>().unwrap(),
            BillingInterval::Yearly
        );
        assert!("weekly".parse::<BillingInterval>().is_err());
    }
}
