//! Per-tenant quota accounting
//!
//! Usage counters are tracked against the effective plan limits. A limit of
//! zero or below means unlimited. A quota is exceeded once usage reaches the
//! limit, so the check gates the increment that would go over; checks at 80%
//! or more of the limit carry a warning flag.
//!
//! Storage is tracked in hundredths of a GB so fractional gigabytes survive
//! integer counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use advoca_shared::{PlanQuotas, TenantId};

use crate::error::{TenantError, TenantResult};

/// Fraction of the limit at which a check starts warning
const WARNING_THRESHOLD_PCT: f64 = 80.0;

/// The quota dimensions a tenant consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Processes,
    Users,
    Clients,
    DatajudDaily,
    AiMonthly,
    Storage,
    Webhooks,
    ApiDaily,
}

impl QuotaKind {
    pub const ALL: [QuotaKind; 8] = [
        QuotaKind::Processes,
        QuotaKind::Users,
        QuotaKind::Clients,
        QuotaKind::DatajudDaily,
        QuotaKind::AiMonthly,
        QuotaKind::Storage,
        QuotaKind::Webhooks,
        QuotaKind::ApiDaily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processes => "processes",
            Self::Users => "users",
            Self::Clients => "clients",
            Self::DatajudDaily => "datajud_daily",
            Self::AiMonthly => "ai_monthly",
            Self::Storage => "storage",
            Self::Webhooks => "webhooks",
            Self::ApiDaily => "api_daily",
        }
    }

    /// Daily counters reset at midnight UTC
    pub fn is_daily(&self) -> bool {
        matches!(self, Self::DatajudDaily | Self::ApiDaily)
    }
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QuotaKind {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processes" => Ok(Self::Processes),
            "users" => Ok(Self::Users),
            "clients" => Ok(Self::Clients),
            "datajud_daily" => Ok(Self::DatajudDaily),
            "ai_monthly" => Ok(Self::AiMonthly),
            "storage" => Ok(Self::Storage),
            "webhooks" => Ok(Self::Webhooks),
            "api_daily" => Ok(Self::ApiDaily),
            _ => Err(TenantError::UnknownQuotaType(s.to_string())),
        }
    }
}

/// The effective limits for a tenant, derived from its plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaLimit {
    pub max_processes: i32,
    pub max_users: i32,
    pub max_clients: i32,
    pub datajud_queries_daily: i32,
    pub ai_queries_monthly: i32,
    /// Hundredths of a GB
    pub storage_centi_gb: i64,
    pub max_webhooks: i32,
    pub max_api_calls_daily: i32,
}

impl QuotaLimit {
    pub fn from_plan(quotas: &PlanQuotas) -> Self {
        Self {
            max_processes: quotas.max_processes,
            max_users: quotas.max_users,
            max_clients: quotas.max_clients,
            datajud_queries_daily: quotas.datajud_queries_daily,
            ai_queries_monthly: quotas.ai_queries_monthly,
            storage_centi_gb: i64::from(quotas.storage_gb) * 100,
            max_webhooks: quotas.max_webhooks,
            max_api_calls_daily: quotas.max_api_calls_daily,
        }
    }

    pub fn limit_for(&self, kind: QuotaKind) -> i64 {
        match kind {
            QuotaKind::Processes => i64::from(self.max_processes),
            QuotaKind::Users => i64::from(self.max_users),
            QuotaKind::Clients => i64::from(self.max_clients),
            QuotaKind::DatajudDaily => i64::from(self.datajud_queries_daily),
            QuotaKind::AiMonthly => i64::from(self.ai_queries_monthly),
            QuotaKind::Storage => self.storage_centi_gb,
            QuotaKind::Webhooks => i64::from(self.max_webhooks),
            QuotaKind::ApiDaily => i64::from(self.max_api_calls_daily),
        }
    }
}

/// One tenant's usage counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub tenant_id: TenantId,
    pub processes: i64,
    pub users: i64,
    pub clients: i64,
    pub datajud_daily: i64,
    /// Monthly roll-up of daily DataJud queries, kept for reporting
    pub datajud_monthly: i64,
    pub ai_monthly: i64,
    /// Hundredths of a GB
    pub storage_centi_gb: i64,
    pub webhooks: i64,
    pub api_daily: i64,
    pub api_monthly: i64,
    pub daily_reset_at: DateTime<Utc>,
    pub monthly_reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotaUsage {
    pub fn new(tenant_id: TenantId) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            processes: 0,
            users: 0,
            clients: 0,
            datajud_daily: 0,
            datajud_monthly: 0,
            ai_monthly: 0,
            storage_centi_gb: 0,
            webhooks: 0,
            api_daily: 0,
            api_monthly: 0,
            daily_reset_at: now,
            monthly_reset_at: now,
            updated_at: now,
        }
    }

    pub fn current(&self, kind: QuotaKind) -> i64 {
        match kind {
            QuotaKind::Processes => self.processes,
            QuotaKind::Users => self.users,
            QuotaKind::Clients => self.clients,
            QuotaKind::DatajudDaily => self.datajud_daily,
            QuotaKind::AiMonthly => self.ai_monthly,
            QuotaKind::Storage => self.storage_centi_gb,
            QuotaKind::Webhooks => self.webhooks,
            QuotaKind::ApiDaily => self.api_daily,
        }
    }

    /// Evaluate one quota against its limit without mutating anything
    pub fn check(&self, kind: QuotaKind, limits: &QuotaLimit) -> QuotaCheck {
        let current = self.current(kind);
        let limit = limits.limit_for(kind);
        QuotaCheck::evaluate(kind, current, limit)
    }

    /// Whether one more unit of `kind` would be allowed
    pub fn can_increment(&self, kind: QuotaKind, limits: &QuotaLimit) -> bool {
        !self.check(kind, limits).is_exceeded
    }

    /// Bump a counter. Daily API and DataJud counters also feed their
    /// monthly roll-ups. Callers check the limit first; this never rejects.
    pub fn increment(&mut self, kind: QuotaKind, amount: i64) -> TenantResult<()> {
        if amount < 0 {
            return Err(TenantError::NegativeUsage);
        }
        match kind {
            QuotaKind::Processes => self.processes += amount,
            QuotaKind::Users => self.users += amount,
            QuotaKind::Clients => self.clients += amount,
            QuotaKind::DatajudDaily => {
                self.datajud_daily += amount;
                self.datajud_monthly += amount;
            }
            QuotaKind::AiMonthly => self.ai_monthly += amount,
            QuotaKind::Storage => self.storage_centi_gb += amount,
            QuotaKind::Webhooks => self.webhooks += amount,
            QuotaKind::ApiDaily => {
                self.api_daily += amount;
                self.api_monthly += amount;
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Release usage, flooring every counter at zero
    pub fn decrement(&mut self, kind: QuotaKind, amount: i64) -> TenantResult<()> {
        if amount < 0 {
            return Err(TenantError::NegativeUsage);
        }
        match kind {
            QuotaKind::Processes => self.processes = (self.processes - amount).max(0),
            QuotaKind::Users => self.users = (self.users - amount).max(0),
            QuotaKind::Clients => self.clients = (self.clients - amount).max(0),
            QuotaKind::DatajudDaily => {
                self.datajud_daily = (self.datajud_daily - amount).max(0);
                self.datajud_monthly = (self.datajud_monthly - amount).max(0);
            }
            QuotaKind::AiMonthly => self.ai_monthly = (self.ai_monthly - amount).max(0),
            QuotaKind::Storage => {
                self.storage_centi_gb = (self.storage_centi_gb - amount).max(0)
            }
            QuotaKind::Webhooks => self.webhooks = (self.webhooks - amount).max(0),
            QuotaKind::ApiDaily => {
                self.api_daily = (self.api_daily - amount).max(0);
                self.api_monthly = (self.api_monthly - amount).max(0);
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the storage reading outright, from a fractional GB figure
    pub fn update_storage_gb(&mut self, used_gb: f64) -> TenantResult<()> {
        if used_gb < 0.0 {
            return Err(TenantError::NegativeUsage);
        }
        self.storage_centi_gb = (used_gb * 100.0).round() as i64;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reset_daily(&mut self) {
        self.datajud_daily = 0;
        self.api_daily = 0;
        let now = Utc::now();
        self.daily_reset_at = now;
        self.updated_at = now;
    }

    pub fn reset_monthly(&mut self) {
        self.datajud_monthly = 0;
        self.ai_monthly = 0;
        self.api_monthly = 0;
        let now = Utc::now();
        self.monthly_reset_at = now;
        self.updated_at = now;
    }
}

/// Outcome of checking one quota dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub kind: QuotaKind,
    pub current: i64,
    pub limit: i64,
    /// Units left before the limit; `i64::MAX` when unlimited
    pub available: i64,
    pub is_unlimited: bool,
    pub is_exceeded: bool,
    pub is_warning: bool,
    pub percentage: f64,
}

impl QuotaCheck {
    pub fn evaluate(kind: QuotaKind, current: i64, limit: i64) -> Self {
        if limit <= 0 {
            return Self {
                kind,
                current,
                limit,
                available: i64::MAX,
                is_unlimited: true,
                is_exceeded: false,
                is_warning: false,
                percentage: 0.0,
            };
        }
        let percentage = (current as f64 / limit as f64) * 100.0;
        let is_exceeded = current >= limit;
        Self {
            kind,
            current,
            limit,
            available: (limit - current).max(0),
            is_unlimited: false,
            is_exceeded,
            is_warning: percentage >= WARNING_THRESHOLD_PCT && !is_exceeded,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advoca_shared::PlanType;

    fn starter_limits() -> QuotaLimit {
        QuotaLimit::from_plan(&PlanType::Starter.default_quotas())
    }

    #[test]
    fn test_limit_at_or_above_is_exceeded() {
        let check = QuotaCheck::evaluate(QuotaKind::Processes, 50, 50);
        assert!(check.is_exceeded);
        assert!(!check.is_warning);
        assert_eq!(check.available, 0);

        let check = QuotaCheck::evaluate(QuotaKind::Processes, 49, 50);
        assert!(!check.is_exceeded);
    }

    #[test]
    fn test_nonpositive_limit_is_unlimited() {
        for limit in [0, -1] {
            let check = QuotaCheck::evaluate(QuotaKind::Processes, 1_000_000, limit);
            assert!(check.is_unlimited);
            assert!(!check.is_exceeded);
            assert!(!check.is_warning);
            assert_eq!(check.available, i64::MAX);
        }
    }

    #[test]
    fn test_warning_at_eighty_percent() {
        let check = QuotaCheck::evaluate(QuotaKind::Users, 8, 10);
        assert!(check.is_warning);
        assert!(!check.is_exceeded);

        let check = QuotaCheck::evaluate(QuotaKind::Users, 7, 10);
        assert!(!check.is_warning);
    }

    #[test]
    fn test_daily_increment_feeds_monthly() {
        let mut usage = QuotaUsage::new(TenantId::new());
        usage.increment(QuotaKind::DatajudDaily, 3).unwrap();
        usage.increment(QuotaKind::ApiDaily, 2).unwrap();
        assert_eq!(usage.datajud_daily, 3);
        assert_eq!(usage.datajud_monthly, 3);
        assert_eq!(usage.api_daily, 2);
        assert_eq!(usage.api_monthly, 2);

        usage.reset_daily();
        assert_eq!(usage.datajud_daily, 0);
        assert_eq!(usage.datajud_monthly, 3);

        usage.reset_monthly();
        assert_eq!(usage.datajud_monthly, 0);
        assert_eq!(usage.api_monthly, 0);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut usage = QuotaUsage::new(TenantId::new());
        usage.increment(QuotaKind::Clients, 2).unwrap();
        usage.decrement(QuotaKind::Clients, 5).unwrap();
        assert_eq!(usage.clients, 0);
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut usage = QuotaUsage::new(TenantId::new());
        assert!(matches!(
            usage.increment(QuotaKind::Users, -1),
            Err(TenantError::NegativeUsage)
        ));
        assert!(matches!(
            usage.decrement(QuotaKind::Users, -1),
            Err(TenantError::NegativeUsage)
        ));
        assert!(usage.update_storage_gb(-0.5).is_err());
    }

    #[test]
    fn test_storage_in_centi_gb() {
        let mut usage = QuotaUsage::new(TenantId::new());
        usage.update_storage_gb(1.25).unwrap();
        assert_eq!(usage.storage_centi_gb, 125);

        let limits = starter_limits();
        assert_eq!(limits.limit_for(QuotaKind::Storage), 100);
        let check = usage.check(QuotaKind::Storage, &limits);
        assert!(check.is_exceeded);
    }

    #[test]
    fn test_can_increment_against_plan_limits() {
        let limits = starter_limits();
        let mut usage = QuotaUsage::new(TenantId::new());
        usage.increment(QuotaKind::Users, 2).unwrap();
        // Starter allows 2 users, so a third is blocked
        assert!(!usage.can_increment(QuotaKind::Users, &limits));
        assert!(usage.can_increment(QuotaKind::Processes, &limits));
    }

    #[test]
    fn test_quota_kind_round_trip() {
        for kind in QuotaKind::ALL {
            let parsed: QuotaKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("bogus".parse::<QuotaKind>().is_err());
    }
}
