//! Payment processing and onboarding for Advoca
//!
//! Charges subscriptions through two gateways (Brazilian fiat rails and a
//! crypto processor) and orchestrates tenant onboarding end to end. Tenant,
//! subscription, and quota state live in `advoca-tenant`.

pub mod asaas;
pub mod config;
pub mod customer;
pub mod error;
pub mod events;
pub mod gateway;
pub mod invoice;
pub mod memory;
pub mod nowpayments;
pub mod payment;
pub mod postgres;
pub mod service;
pub mod store;

pub use config::{BillingConfig, GatewayConfig};
pub use customer::{Address, Customer};
pub use error::{BillingError, BillingResult};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use service::{
    is_free_trial, CreatePayment, OnboardingRequest, OnboardingResult, OnboardingService,
    OnboardingStage, PaymentService, PaymentStats,
};
