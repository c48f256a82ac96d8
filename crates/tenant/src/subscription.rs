//! Subscription aggregate and state machine
//!
//! A subscription is the time-bounded binding of a tenant to a plan. At most
//! one subscription per tenant may be live (trialing, active, or past due) at
//! any time; the service layer enforces that on creation.
//!
//! States: Trialing -> Active -> {PastDue, Canceled}; PastDue -> {Active,
//! Canceled, Unpaid}. Canceled subscriptions can be reactivated, with no
//! distinction between a grace-period cancellation and a final one.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use advoca_shared::{BillingInterval, PlanId, SubscriptionId, TenantId};

use crate::error::{TenantError, TenantResult};

/// Payment failures tolerated before a subscription drops to PastDue
const PAST_DUE_FAILURE_THRESHOLD: i32 = 3;

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

impl SubscriptionStatus {
    /// Allowed status transitions. Canceled -> Active covers reactivation.
    pub fn can_transition_to(self, to: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        match (self, to) {
            (Trialing, Active) | (Trialing, Canceled) => true,
            (Active, PastDue) | (Active, Canceled) => true,
            (PastDue, Active) | (PastDue, Canceled) | (PastDue, Unpaid) => true,
            (Unpaid, Active) | (Unpaid, Canceled) => true,
            (Canceled, Active) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trialing => write!(f, "trialing"),
            Self::Active => write!(f, "active"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Unpaid => write!(f, "unpaid"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "unpaid" => Ok(Self::Unpaid),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

/// A tenant's subscription to a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub tenant_id: TenantId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub billing_interval: BillingInterval,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    /// Consecutive failed payment attempts in the current period
    pub payment_failures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Open a subscription. `trial_days > 0` starts it Trialing with the
    /// trial end as period end; otherwise it starts Active with a full
    /// billing period.
    pub fn new(
        tenant_id: TenantId,
        plan_id: PlanId,
        billing_interval: BillingInterval,
        trial_days: i32,
    ) -> Self {
        let now = Utc::now();
        let mut subscription = Self {
            id: SubscriptionId::new(),
            tenant_id,
            plan_id,
            status: SubscriptionStatus::Active,
            billing_interval,
            current_period_start: now,
            current_period_end: now + interval_duration(billing_interval),
            cancel_at_period_end: false,
            trial_start: None,
            trial_end: None,
            payment_failures: 0,
            created_at: now,
            updated_at: now,
            canceled_at: None,
        };

        if trial_days > 0 {
            let trial_end = now + Duration::days(i64::from(trial_days));
            subscription.status = SubscriptionStatus::Trialing;
            subscription.trial_start = Some(now);
            subscription.trial_end = Some(trial_end);
            subscription.current_period_end = trial_end;
        }

        subscription
    }

    /// Trialing and Active both count as usable for billing purposes
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }

    /// Live subscriptions block creating another one for the same tenant
    pub fn is_live(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Trialing | SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }

    pub fn is_in_trial(&self) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_end.is_some_and(|end| Utc::now() < end)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.current_period_end
    }

    pub fn is_expiring_within(&self, days: i64) -> bool {
        Utc::now() + Duration::days(days) > self.current_period_end
    }

    pub fn activate(&mut self) -> TenantResult<()> {
        if self.status == SubscriptionStatus::Active {
            return Err(TenantError::Conflict(
                "subscription is already active".to_string(),
            ));
        }
        self.transition(SubscriptionStatus::Active)?;
        self.payment_failures = 0;
        self.canceled_at = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Immediate cancellation; terminal until reactivated
    pub fn cancel(&mut self) -> TenantResult<()> {
        if self.status == SubscriptionStatus::Canceled {
            return Err(TenantError::Conflict(
                "subscription is already canceled".to_string(),
            ));
        }
        self.transition(SubscriptionStatus::Canceled)?;
        let now = Utc::now();
        self.canceled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Deferred cancellation: stays in its current status until period end
    pub fn schedule_cancellation(&mut self) -> TenantResult<()> {
        if self.status == SubscriptionStatus::Canceled {
            return Err(TenantError::Conflict(
                "subscription is already canceled".to_string(),
            ));
        }
        self.cancel_at_period_end = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Resume a canceled subscription. No resumability window is enforced.
    pub fn reactivate(&mut self) -> TenantResult<()> {
        if self.status != SubscriptionStatus::Canceled {
            return Err(TenantError::Conflict(
                "only canceled subscriptions can be reactivated".to_string(),
            ));
        }
        self.transition(SubscriptionStatus::Active)?;
        self.cancel_at_period_end = false;
        self.canceled_at = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Shift into the next billing period and force Active (clears PastDue)
    pub fn renew(&mut self, billing_interval: BillingInterval) -> TenantResult<()> {
        if self.status == SubscriptionStatus::Canceled {
            return Err(TenantError::Conflict(
                "canceled subscriptions cannot be renewed".to_string(),
            ));
        }
        self.current_period_start = self.current_period_end;
        self.current_period_end = self.current_period_start + interval_duration(billing_interval);
        self.billing_interval = billing_interval;
        self.status = SubscriptionStatus::Active;
        self.payment_failures = 0;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Re-point to a new plan. No prorating is computed for the remainder of
    /// the current period; the new price applies from the next renewal.
    pub fn change_plan(&mut self, new_plan_id: PlanId) -> TenantResult<()> {
        if self.plan_id == new_plan_id {
            return Err(TenantError::Conflict(
                "subscription is already on this plan".to_string(),
            ));
        }
        self.plan_id = new_plan_id;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a failed payment attempt; enough of them drop the
    /// subscription to PastDue.
    pub fn mark_payment_failed(&mut self) {
        self.payment_failures += 1;
        if self.payment_failures >= PAST_DUE_FAILURE_THRESHOLD
            && self.status.can_transition_to(SubscriptionStatus::PastDue)
        {
            self.status = SubscriptionStatus::PastDue;
        }
        self.updated_at = Utc::now();
    }

    /// Record a successful payment: clears failures and restores Active
    pub fn mark_payment_success(&mut self) {
        self.payment_failures = 0;
        if self.status != SubscriptionStatus::Active
            && self.status.can_transition_to(SubscriptionStatus::Active)
        {
            self.status = SubscriptionStatus::Active;
        }
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, to: SubscriptionStatus) -> TenantResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(TenantError::InvalidTransition {
                entity: "subscription",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

fn interval_duration(interval: BillingInterval) -> Months {
    match interval {
        BillingInterval::Monthly => Months::new(1),
        BillingInterval::Yearly => Months::new(12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid_subscription() -> Subscription {
        Subscription::new(
            TenantId::new(),
            PlanId::new(),
            BillingInterval::Monthly,
            0,
        )
    }

    #[test]
    fn test_new_without_trial_is_active_for_a_month() {
        let s = paid_subscription();
        assert_eq!(s.status, SubscriptionStatus::Active);
        assert!(s.trial_end.is_none());
        let days = (s.current_period_end - s.current_period_start).num_days();
        assert!((28..=31).contains(&days));
    }

    #[test]
    fn test_new_with_trial_is_trialing() {
        let s = Subscription::new(
            TenantId::new(),
            PlanId::new(),
            BillingInterval::Monthly,
            7,
        );
        assert_eq!(s.status, SubscriptionStatus::Trialing);
        assert!(s.is_in_trial());
        assert!(s.is_active());
        let trial_end = s.trial_end.unwrap();
        assert_eq!(s.current_period_end, trial_end);
        assert_eq!((trial_end - s.trial_start.unwrap()).num_days(), 7);
    }

    #[test]
    fn test_activate_twice_fails() {
        let mut s = paid_subscription();
        assert!(matches!(s.activate(), Err(TenantError::Conflict(_))));
    }

    #[test]
    fn test_cancel_is_terminal_but_reactivatable() {
        let mut s = paid_subscription();
        s.cancel().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Canceled);
        assert!(s.canceled_at.is_some());
        assert!(s.cancel().is_err());
        assert!(s.renew(BillingInterval::Monthly).is_err());

        s.reactivate().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Active);
        assert!(s.canceled_at.is_none());
    }

    #[test]
    fn test_reactivate_requires_canceled() {
        let mut s = paid_subscription();
        assert!(s.reactivate().is_err());
    }

    #[test]
    fn test_scheduled_cancellation_keeps_status() {
        let mut s = paid_subscription();
        s.schedule_cancellation().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Active);
        assert!(s.cancel_at_period_end);
        assert!(s.is_live());
    }

    #[test]
    fn test_renew_shifts_period_and_clears_past_due() {
        let mut s = paid_subscription();
        for _ in 0..3 {
            s.mark_payment_failed();
        }
        assert_eq!(s.status, SubscriptionStatus::PastDue);
        assert!(s.is_live());
        assert!(!s.is_active());

        let old_end = s.current_period_end;
        s.renew(BillingInterval::Monthly).unwrap();
        assert_eq!(s.status, SubscriptionStatus::Active);
        assert_eq!(s.current_period_start, old_end);
        assert!(s.current_period_end > old_end);
        assert_eq!(s.payment_failures, 0);
    }

    #[test]
    fn test_payment_failures_below_threshold_stay_active() {
        let mut s = paid_subscription();
        s.mark_payment_failed();
        s.mark_payment_failed();
        assert_eq!(s.status, SubscriptionStatus::Active);
        s.mark_payment_success();
        assert_eq!(s.payment_failures, 0);
    }

    #[test]
    fn test_past_due_recovers_on_payment_success() {
        let mut s = paid_subscription();
        for _ in 0..3 {
            s.mark_payment_failed();
        }
        s.mark_payment_success();
        assert_eq!(s.status, SubscriptionStatus::Active);
    }

    #[test]
    fn test_change_plan_to_same_plan_fails() {
        let mut s = paid_subscription();
        let same = s.plan_id;
        assert!(s.change_plan(same).is_err());
        let other = PlanId::new();
        s.change_plan(other).unwrap();
        assert_eq!(s.plan_id, other);
    }

    #[test]
    fn test_transition_table() {
        use SubscriptionStatus::*;
        assert!(Trialing.can_transition_to(Active));
        assert!(Trialing.can_transition_to(Canceled));
        assert!(!Trialing.can_transition_to(PastDue));
        assert!(Active.can_transition_to(PastDue));
        assert!(PastDue.can_transition_to(Active));
        assert!(PastDue.can_transition_to(Unpaid));
        assert!(Canceled.can_transition_to(Active));
        assert!(!Canceled.can_transition_to(PastDue));
    }

    #[test]
    fn test_yearly_renewal_is_a_year() {
        let mut s = paid_subscription();
        let start = s.current_period_end;
        s.renew(BillingInterval::Yearly).unwrap();
        let days = (s.current_period_end - start).num_days();
        assert!((365..=366).contains(&days));
    }
}
