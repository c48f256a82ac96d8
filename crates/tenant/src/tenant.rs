//! Tenant aggregate
//!
//! A tenant is a customer organization (a law office). Tenants are created
//! Pending and move through Active/Suspended/Canceled/Blocked; the status
//! machine rejects transitions outside the allowed table instead of trusting
//! callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use advoca_shared::{PlanType, TenantId, UserId};

use crate::error::{TenantError, TenantResult};

/// Tenant lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Active,
    Suspended,
    Canceled,
    Blocked,
}

impl TenantStatus {
    /// Allowed status transitions
    pub fn can_transition_to(self, to: TenantStatus) -> bool {
        use TenantStatus::*;
        match (self, to) {
            (Pending, Active) | (Pending, Canceled) => true,
            (Active, Suspended) | (Active, Canceled) | (Active, Blocked) => true,
            (Suspended, Active) | (Suspended, Canceled) | (Suspended, Blocked) => true,
            (Blocked, Active) | (Blocked, Canceled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Canceled => write!(f, "canceled"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "canceled" => Ok(Self::Canceled),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!("Invalid tenant status: {}", s)),
        }
    }
}

/// A customer organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub legal_name: String,
    /// CNPJ, digits only once validated. Optional.
    pub document: String,
    pub email: String,
    pub phone: String,
    pub status: TenantStatus,
    pub plan_type: PlanType,
    pub owner_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        plan_type: PlanType,
        owner_user_id: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TenantId::new(),
            name: name.into(),
            legal_name: String::new(),
            document: String::new(),
            email: email.into(),
            phone: String::new(),
            status: TenantStatus::Pending,
            plan_type,
            owner_user_id,
            created_at: now,
            updated_at: now,
            activated_at: None,
            suspended_at: None,
        }
    }

    pub fn validate(&mut self) -> TenantResult<()> {
        self.validate_name()?;
        self.validate_email()?;
        self.validate_document()
    }

    pub fn validate_name(&self) -> TenantResult<()> {
        let trimmed = self.name.trim();
        if trimmed.len() < 3 || trimmed.len() > 50 {
            return Err(TenantError::Validation(
                "tenant name must be between 3 and 50 characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_email(&self) -> TenantResult<()> {
        if !is_plausible_email(&self.email) {
            return Err(TenantError::Validation(format!(
                "invalid email: {}",
                self.email
            )));
        }
        Ok(())
    }

    /// Validates the CNPJ shape (14 digits, not all equal) and normalizes it
    /// to digits only. Full mod-11 check-digit validation is not performed,
    /// matching the registration flow's lenient acceptance.
    pub fn validate_document(&mut self) -> TenantResult<()> {
        if self.document.is_empty() {
            return Ok(()); // document is optional
        }

        let digits: String = self.document.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 14 {
            return Err(TenantError::Validation(
                "CNPJ must have 14 digits".to_string(),
            ));
        }
        if all_same_digit(&digits) {
            return Err(TenantError::Validation("invalid CNPJ".to_string()));
        }

        self.document = digits;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Pending tenants may still access the system while onboarding completes
    pub fn can_access(&self) -> bool {
        matches!(self.status, TenantStatus::Active | TenantStatus::Pending)
    }

    pub fn activate(&mut self) -> TenantResult<()> {
        self.transition(TenantStatus::Active)?;
        let now = Utc::now();
        self.activated_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn suspend(&mut self) -> TenantResult<()> {
        self.transition(TenantStatus::Suspended)?;
        let now = Utc::now();
        self.suspended_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self) -> TenantResult<()> {
        self.transition(TenantStatus::Canceled)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn block(&mut self) -> TenantResult<()> {
        self.transition(TenantStatus::Blocked)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        if self.legal_name.is_empty() {
            &self.name
        } else {
            &self.legal_name
        }
    }

    fn transition(&mut self, to: TenantStatus) -> TenantResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(TenantError::InvalidTransition {
                entity: "tenant",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn all_same_digit(digits: &str) -> bool {
    let mut chars = digits.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Tenant {
        Tenant::new(
            "Silva & Associados",
            "contato@silva.adv.br",
            PlanType::Starter,
            UserId::new(),
        )
    }

    #[test]
    fn test_new_tenant_is_pending() {
        let t = tenant();
        assert_eq!(t.status, TenantStatus::Pending);
        assert!(t.can_access());
        assert!(!t.is_active());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut t = tenant();
        t.activate().unwrap();
        assert!(t.is_active());
        assert!(t.activated_at.is_some());

        t.suspend().unwrap();
        assert_eq!(t.status, TenantStatus::Suspended);

        t.activate().unwrap();
        t.cancel().unwrap();
        assert_eq!(t.status, TenantStatus::Canceled);

        // Canceled is terminal
        assert!(t.activate().is_err());
    }

    #[test]
    fn test_pending_cannot_be_suspended() {
        let mut t = tenant();
        assert!(matches!(
            t.suspend(),
            Err(TenantError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_document_validation_normalizes() {
        let mut t = tenant();
        t.document = "12.345.678/0001-90".to_string();
        t.validate_document().unwrap();
        assert_eq!(t.document, "12345678000190");

        t.document = "11.111.111/1111-11".to_string();
        assert!(t.validate_document().is_err());

        t.document = "123".to_string();
        assert!(t.validate_document().is_err());

        // Optional: empty passes
        t.document = String::new();
        t.validate_document().unwrap();
    }

    #[test]
    fn test_email_validation() {
        let mut t = tenant();
        t.validate_email().unwrap();
        t.email = "not-an-email".to_string();
        assert!(t.validate_email().is_err());
        t.email = "a@b".to_string();
        assert!(t.validate_email().is_err());
    }

    #[test]
    fn test_name_bounds() {
        let mut t = tenant();
        t.name = "ab".to_string();
        assert!(t.validate_name().is_err());
        t.name = "a".repeat(51);
        assert!(t.validate_name().is_err());
        t.name = "abc".to_string();
        t.validate_name().unwrap();
        // Bounds apply to the trimmed name, not the padding
        t.name = format!("  {}  ", "a".repeat(48));
        t.validate_name().unwrap();
    }

    #[test]
    fn test_display_name_prefers_legal_name() {
        let mut t = tenant();
        assert_eq!(t.display_name(), "Silva & Associados");
        t.legal_name = "Silva e Associados Advocacia Ltda".to_string();
        assert_eq!(t.display_name(), "Silva e Associados Advocacia Ltda");
    }
}
