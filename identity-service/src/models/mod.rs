//! Domain models for identity-service.

mod contact;
mod record;

pub use contact::{Contact, LinkPrecedence, NewContact};
pub use record::{InvoiceRecord, TransactionRecord};
