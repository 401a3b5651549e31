pub mod identify;
pub mod listing;

pub use identify::{IdentifyRequest, IdentifyResponse};
pub use listing::{ListParams, ListResponse};
