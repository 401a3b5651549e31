//! HTTP handlers for identity-service.

pub mod health;
pub mod identify;
pub mod records;

pub use health::{health_check, metrics, not_found, readiness_check, status};
pub use identify::identify;
pub use records::{list_invoices, list_transactions};
