//! Tenant accounts, subscriptions, and quota enforcement for Advoca
//!
//! This crate owns the tenant side of the platform: who a tenant is, which
//! plan they are on, and how much of that plan they have consumed. Payment
//! handling lives in `advoca-billing`.

pub mod error;
pub mod events;
pub mod memory;
pub mod postgres;
pub mod quota;
pub mod service;
pub mod store;
pub mod subscription;
pub mod tenant;

pub use error::{TenantError, TenantResult};
pub use quota::{QuotaCheck, QuotaKind, QuotaLimit, QuotaUsage};
pub use service::{QuotaService, SubscriptionService, TenantService};
pub use subscription::{Subscription, SubscriptionStatus};
pub use tenant::{Tenant, TenantStatus};
