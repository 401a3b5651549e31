//! Storage seam for contact clusters.

use async_trait::async_trait;

use crate::models::{Contact, LinkPrecedence, NewContact};
use crate::services::error::StoreError;

/// Backend holding the contacts table.
///
/// Reads never return soft-deleted rows. Rows in every returned list are
/// ordered oldest first, id breaking ties.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Contacts whose email equals `email` or whose phone equals
    /// `phone_number`. A `None` side is not matched at all.
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Contact>, StoreError>;

    /// Insert a contact. Fails with [`StoreError::Conflict`] when a
    /// uniqueness rule rejects it, or when a secondary's `linked_id` is not
    /// a live primary at insert time.
    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError>;

    async fn update_precedence_and_link(
        &self,
        id: i32,
        precedence: LinkPrecedence,
        linked_id: Option<i32>,
    ) -> Result<(), StoreError>;

    /// The primary `primary_id` and every contact linked to it.
    async fn find_cluster(&self, primary_id: i32) -> Result<Vec<Contact>, StoreError>;

    /// Fold the clusters anchored at `demoted` into `survivor` in one atomic
    /// step: each demoted primary becomes a secondary of `survivor`, their
    /// secondaries are repointed at `survivor`, and `insert` (if any) is
    /// created. Fails with [`StoreError::Conflict`] and writes nothing when
    /// any of the listed contacts is no longer a live primary.
    async fn merge(
        &self,
        survivor: i32,
        demoted: &[i32],
        insert: Option<NewContact>,
    ) -> Result<Option<Contact>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
