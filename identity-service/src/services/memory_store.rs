//! Process-local contact store.
//!
//! Enforces the same uniqueness rules as the Postgres schema so conflict
//! handling behaves identically. Used by the test suites and by
//! `CONTACT_STORE=memory` local runs.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::models::{Contact, LinkPrecedence, NewContact};
use crate::services::contact_store::ContactStore;
use crate::services::error::StoreError;

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    rows: Vec<Contact>,
}

impl MemoryState {
    fn live(&self) -> impl Iterator<Item = &Contact> {
        self.rows.iter().filter(|c| c.deleted_at.is_none())
    }

    fn check_insert(&self, contact: &NewContact) -> Result<(), StoreError> {
        let pair_taken = self
            .live()
            .any(|c| c.email == contact.email && c.phone_number == contact.phone_number);
        if pair_taken {
            return Err(StoreError::Conflict(
                "duplicate (email, phone_number) pair".to_string(),
            ));
        }

        if let Some(anchor) = contact.linked_id {
            let anchor_is_primary = self.live().any(|c| c.id == anchor && c.is_primary());
            if !anchor_is_primary {
                return Err(StoreError::Conflict(format!(
                    "contact {} is no longer a primary",
                    anchor
                )));
            }
        }

        if contact.link_precedence == LinkPrecedence::Primary {
            for c in self.live().filter(|c| c.is_primary()) {
                if contact.email.is_some() && c.email == contact.email {
                    return Err(StoreError::Conflict(
                        "email already anchors a primary contact".to_string(),
                    ));
                }
                if contact.phone_number.is_some() && c.phone_number == contact.phone_number {
                    return Err(StoreError::Conflict(
                        "phone number already anchors a primary contact".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn insert(&mut self, contact: NewContact) -> Contact {
        self.next_id += 1;
        let now = Utc::now();
        let row = Contact {
            id: self.next_id,
            phone_number: contact.phone_number,
            email: contact.email,
            linked_id: contact.linked_id,
            link_precedence: contact.link_precedence.as_str().to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.rows.push(row.clone());
        row
    }

    fn set_link(&mut self, id: i32, precedence: LinkPrecedence, linked_id: Option<i32>) {
        if let Some(row) = self
            .rows
            .iter_mut()
            .find(|c| c.id == id && c.deleted_at.is_none())
        {
            row.link_precedence = precedence.as_str().to_string();
            row.linked_id = linked_id;
            row.updated_at = Utc::now();
        }
    }

    fn sorted(mut contacts: Vec<Contact>) -> Vec<Contact> {
        contacts.sort_by_key(Contact::age_key);
        contacts
    }
}

#[derive(Default)]
pub struct InMemoryContactStore {
    state: Mutex<MemoryState>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing rows, e.g. contacts with hand-picked timestamps.
    pub fn seeded(rows: Vec<Contact>) -> Self {
        let next_id = rows.iter().map(|c| c.id).max().unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState { next_id, rows }),
        }
    }

    /// Every row, deleted ones included, in insertion order.
    pub async fn snapshot(&self) -> Vec<Contact> {
        self.state.lock().await.rows.clone()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        let state = self.state.lock().await;
        let matches = state
            .live()
            .filter(|c| {
                let email_hit = email.is_some() && c.email.as_deref() == email;
                let phone_hit = phone_number.is_some() && c.phone_number.as_deref() == phone_number;
                email_hit || phone_hit
            })
            .cloned()
            .collect();
        Ok(MemoryState::sorted(matches))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Contact>, StoreError> {
        let state = self.state.lock().await;
        let found = state.live().find(|c| c.id == id).cloned();
        Ok(found)
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError> {
        let mut state = self.state.lock().await;
        state.check_insert(&contact)?;
        Ok(state.insert(contact))
    }

    async fn update_precedence_and_link(
        &self,
        id: i32,
        precedence: LinkPrecedence,
        linked_id: Option<i32>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.set_link(id, precedence, linked_id);
        Ok(())
    }

    async fn find_cluster(&self, primary_id: i32) -> Result<Vec<Contact>, StoreError> {
        let state = self.state.lock().await;
        let cluster = state
            .live()
            .filter(|c| c.id == primary_id || c.linked_id == Some(primary_id))
            .cloned()
            .collect();
        Ok(MemoryState::sorted(cluster))
    }

    async fn merge(
        &self,
        survivor: i32,
        demoted: &[i32],
        insert: Option<NewContact>,
    ) -> Result<Option<Contact>, StoreError> {
        let mut state = self.state.lock().await;

        // Validate everything before the first write so a failure leaves no trace.
        for id in std::iter::once(&survivor).chain(demoted) {
            let still_primary = state.live().any(|c| c.id == *id && c.is_primary());
            if !still_primary {
                return Err(StoreError::Conflict(format!(
                    "contact {} is no longer a primary",
                    id
                )));
            }
        }
        if let Some(contact) = &insert {
            state.check_insert(contact)?;
        }

        let orphans: Vec<i32> = state
            .live()
            .filter(|c| c.linked_id.is_some_and(|linked| demoted.contains(&linked)))
            .map(|c| c.id)
            .collect();
        for id in demoted.iter().copied().chain(orphans) {
            state.set_link(id, LinkPrecedence::Secondary, Some(survivor));
        }

        Ok(insert.map(|contact| state.insert(contact)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(email: &str, phone: &str) -> NewContact {
        NewContact::primary(Some(email.to_string()), Some(phone.to_string()))
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = InMemoryContactStore::new();

        let first = store.create(primary("a@x.com", "1")).await.unwrap();
        let second = store.create(primary("b@x.com", "2")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.is_primary());
    }

    #[tokio::test]
    async fn test_second_primary_for_same_email_conflicts() {
        let store = InMemoryContactStore::new();
        store.create(primary("a@x.com", "1")).await.unwrap();

        let err = store.create(primary("a@x.com", "2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_secondary_may_share_phone_with_primary() {
        let store = InMemoryContactStore::new();
        let anchor = store.create(primary("a@x.com", "1")).await.unwrap();

        let secondary = store
            .create(NewContact::secondary(
                Some("b@x.com".to_string()),
                Some("1".to_string()),
                anchor.id,
            ))
            .await
            .unwrap();

        assert_eq!(secondary.linked_id, Some(anchor.id));
        assert_eq!(store.find_cluster(anchor.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_skips_absent_side() {
        let store = InMemoryContactStore::new();
        store
            .create(NewContact::primary(Some("a@x.com".to_string()), None))
            .await
            .unwrap();

        // A `None` phone must not match rows that have no phone.
        let found = store.find_by_email_or_phone(None, None).await.unwrap();
        assert!(found.is_empty());

        let found = store
            .find_by_email_or_phone(Some("a@x.com"), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_secondary_of_demoted_primary_conflicts() {
        let store = InMemoryContactStore::new();
        let a = store.create(primary("a@x.com", "1")).await.unwrap();
        let b = store.create(primary("b@x.com", "2")).await.unwrap();
        store.merge(a.id, &[b.id], None).await.unwrap();

        let err = store
            .create(NewContact::secondary(None, Some("3".to_string()), b.id))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_id_skips_unknown() {
        let store = InMemoryContactStore::new();
        let a = store.create(primary("a@x.com", "1")).await.unwrap();

        assert_eq!(store.find_by_id(a.id).await.unwrap(), Some(a));
        assert!(store.find_by_id(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_rejects_stale_primary_without_writing() {
        let store = InMemoryContactStore::new();
        let a = store.create(primary("a@x.com", "1")).await.unwrap();
        let b = store.create(primary("b@x.com", "2")).await.unwrap();
        store
            .update_precedence_and_link(b.id, LinkPrecedence::Secondary, Some(a.id))
            .await
            .unwrap();
        let before = store.snapshot().await;

        let err = store
            .merge(a.id, &[b.id], Some(NewContact::secondary(None, Some("3".into()), a.id)))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_merge_flattens_secondaries_of_demoted_primary() {
        let store = InMemoryContactStore::new();
        let a = store.create(primary("a@x.com", "1")).await.unwrap();
        let b = store.create(primary("b@x.com", "2")).await.unwrap();
        let b_child = store
            .create(NewContact::secondary(
                Some("c@x.com".to_string()),
                Some("2".to_string()),
                b.id,
            ))
            .await
            .unwrap();

        store.merge(a.id, &[b.id], None).await.unwrap();

        let cluster = store.find_cluster(a.id).await.unwrap();
        let ids: Vec<i32> = cluster.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, b.id, b_child.id]);
        assert!(cluster
            .iter()
            .filter(|c| c.id != a.id)
            .all(|c| c.linked_id == Some(a.id) && !c.is_primary()));
    }
}
