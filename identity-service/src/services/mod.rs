pub mod contact_store;
pub mod database;
pub mod error;
pub mod memory_store;
pub mod metrics;
pub mod records;
pub mod resolver;

pub use contact_store::ContactStore;
pub use database::PgContactStore;
pub use error::{IdentityError, StoreError};
pub use memory_store::InMemoryContactStore;
pub use metrics::{get_metrics, init_metrics};
pub use records::{ListQuery, MongoDb, RecordsRepository};
pub use resolver::{ConsolidatedContact, IdentityResolver};
