//! Plan catalog
//!
//! Plans are immutable reference data: a priced bundle of feature flags and
//! quota ceilings. Changing a subscription's plan means re-pointing its
//! `plan_id`, never mutating the plan itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BillingInterval, PlanId};

/// Plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Starter,
    Professional,
    Business,
    Enterprise,
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starter => write!(f, "starter"),
            Self::Professional => write!(f, "professional"),
            Self::Business => write!(f, "business"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "professional" => Ok(Self::Professional),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Invalid plan type: {}", s)),
        }
    }
}

/// Capability flags bundled with a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeatures {
    pub whatsapp_enabled: bool,
    pub ai_enabled: bool,
    pub advanced_ai: bool,
    pub jurisprudence_enabled: bool,
    pub white_label_enabled: bool,
    pub custom_integrations: bool,
    pub priority_support: bool,
    pub custom_reports: bool,
    pub api_access: bool,
    pub webhooks_enabled: bool,
}

/// Numeric ceilings bundled with a plan; values <= 0 mean unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanQuotas {
    pub max_processes: i32,
    pub max_users: i32,
    pub max_clients: i32,
    pub datajud_queries_daily: i32,
    pub ai_queries_monthly: i32,
    pub storage_gb: i32,
    pub max_webhooks: i32,
    pub max_api_calls_daily: i32,
}

/// A subscription plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub plan_type: PlanType,
    pub description: String,
    /// Prices in minor currency units (centavos)
    pub price_monthly: i64,
    pub price_yearly: i64,
    pub currency: String,
    pub trial_days: i32,
    pub features: PlanFeatures,
    pub quotas: PlanQuotas,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Price for a billing interval, in minor units
    pub fn price(&self, interval: BillingInterval) -> i64 {
        match interval {
            BillingInterval::Monthly => self.price_monthly,
            BillingInterval::Yearly => self.price_yearly,
        }
    }

    /// Price formatted in major units (reais)
    pub fn price_formatted(&self, interval: BillingInterval) -> f64 {
        self.price(interval) as f64 / 100.0
    }
}

impl PlanType {
    /// Default quota ceilings per tier (-1 = unlimited)
    pub fn default_quotas(&self) -> PlanQuotas {
        match self {
            Self::Starter => PlanQuotas {
                max_processes: 50,
                max_users: 2,
                max_clients: 20,
                datajud_queries_daily: 100,
                ai_queries_monthly: 10,
                storage_gb: 1,
                max_webhooks: 3,
                max_api_calls_daily: 1000,
            },
            Self::Professional => PlanQuotas {
                max_processes: 200,
                max_users: 5,
                max_clients: 100,
                datajud_queries_daily: 500,
                ai_queries_monthly: 50,
                storage_gb: 5,
                max_webhooks: 10,
                max_api_calls_daily: 5000,
            },
            Self::Business => PlanQuotas {
                max_processes: 500,
                max_users: 15,
                max_clients: 500,
                datajud_queries_daily: 2000,
                ai_queries_monthly: 200,
                storage_gb: 20,
                max_webhooks: 25,
                max_api_calls_daily: 15000,
            },
            Self::Enterprise => PlanQuotas {
                max_processes: -1,
                max_users: -1,
                max_clients: -1,
                datajud_queries_daily: 10000,
                ai_queries_monthly: -1,
                storage_gb: 100,
                max_webhooks: -1,
                max_api_calls_daily: -1,
            },
        }
    }

    /// Default feature flags per tier
    pub fn default_features(&self) -> PlanFeatures {
        match self {
            Self::Starter => PlanFeatures {
                whatsapp_enabled: true,
                ..PlanFeatures::default()
            },
            Self::Professional => PlanFeatures {
                whatsapp_enabled: true,
                ai_enabled: true,
                custom_reports: true,
                api_access: true,
                webhooks_enabled: true,
                ..PlanFeatures::default()
            },
            Self::Business => PlanFeatures {
                whatsapp_enabled: true,
                ai_enabled: true,
                advanced_ai: true,
                jurisprudence_enabled: true,
                custom_integrations: true,
                priority_support: true,
                custom_reports: true,
                api_access: true,
                webhooks_enabled: true,
                ..PlanFeatures::default()
            },
            Self::Enterprise => PlanFeatures {
                whatsapp_enabled: true,
                ai_enabled: true,
                advanced_ai: true,
                jurisprudence_enabled: true,
                white_label_enabled: true,
                custom_integrations: true,
                priority_support: true,
                custom_reports: true,
                api_access: true,
                webhooks_enabled: true,
            },
        }
    }

    /// Default monthly price per tier, in minor units
    pub fn default_price_monthly(&self) -> i64 {
        match self {
            Self::Starter => 9_900,
            Self::Professional => 29_900,
            Self::Business => 69_900,
            Self::Enterprise => 199_900,
        }
    }

    /// Default trial length per tier, in days
    pub fn default_trial_days(&self) -> i32 {
        match self {
            Self::Enterprise => 30,
            _ => 15,
        }
    }
}

/// The seed plan catalog (yearly price = 10x monthly, i.e. two months free)
pub fn default_plans() -> Vec<Plan> {
    let now = Utc::now();
    [
        (PlanType::Starter, "Starter", "Ideal para advogados autônomos"),
        (
            PlanType::Professional,
            "Professional",
            "Para pequenos escritórios",
        ),
        (PlanType::Business, "Business", "Para escritórios médios"),
        (
            PlanType::Enterprise,
            "Enterprise",
            "Para grandes escritórios",
        ),
    ]
    .into_iter()
    .map(|(plan_type, name, description)| Plan {
        id: PlanId::new(),
        name: name.to_string(),
        plan_type,
        description: description.to_string(),
        price_monthly: plan_type.default_price_monthly(),
        price_yearly: plan_type.default_price_monthly() * 10,
        currency: "BRL".to_string(),
        trial_days: plan_type.default_trial_days(),
        features: plan_type.default_features(),
        quotas: plan_type.default_quotas(),
        is_active: true,
        created_at: now,
        updated_at: now,
    })
    .collect()
}
