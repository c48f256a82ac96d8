//! Advoca Shared Types
//!
//! This crate contains the types shared between the tenant and billing
//! services: ID newtypes, the plan catalog, and the domain-event envelope.

pub mod event;
pub mod plan;
pub mod types;

pub use event::*;
pub use plan::*;
pub use types::*;
