//! Identity reconciliation.
//!
//! Every contact belongs to exactly one cluster: a primary plus the
//! secondaries whose `linked_id` points straight at it. A request is matched
//! on email or phone; when the matches span several clusters those clusters
//! are merged under the oldest primary, and when the request carries a value
//! the cluster has never seen it is recorded as a new secondary.

use metrics::counter;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{Contact, NewContact};
use crate::services::contact_store::ContactStore;
use crate::services::error::IdentityError;

/// Aggregated view of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
    pub primary_contact_id: i32,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<i32>,
}

impl ConsolidatedContact {
    /// Build the view from a cluster read. The primary's values come first,
    /// then secondaries oldest first; values are deduplicated.
    pub fn from_cluster(primary_id: i32, cluster: &[Contact]) -> Self {
        let mut members: Vec<&Contact> = cluster.iter().collect();
        members.sort_by_key(|c| (c.id != primary_id, c.age_key()));

        let mut emails: Vec<String> = Vec::new();
        let mut phone_numbers: Vec<String> = Vec::new();
        let mut secondary_contact_ids = Vec::new();

        for contact in members {
            if let Some(email) = &contact.email {
                if !emails.contains(email) {
                    emails.push(email.clone());
                }
            }
            if let Some(phone) = &contact.phone_number {
                if !phone_numbers.contains(phone) {
                    phone_numbers.push(phone.clone());
                }
            }
            if contact.id != primary_id {
                secondary_contact_ids.push(contact.id);
            }
        }

        Self {
            primary_contact_id: primary_id,
            emails,
            phone_numbers,
            secondary_contact_ids,
        }
    }
}

/// Normalized identify input: trimmed, blanks dropped, at least one side set.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    email: Option<String>,
    phone_number: Option<String>,
}

impl Identity {
    fn parse(email: Option<String>, phone_number: Option<String>) -> Result<Self, IdentityError> {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let identity = Self {
            email: clean(email),
            phone_number: clean(phone_number),
        };
        if identity.email.is_none() && identity.phone_number.is_none() {
            return Err(IdentityError::Validation);
        }
        Ok(identity)
    }

    /// True when some supplied value appears nowhere in `cluster`.
    fn is_new_to(&self, cluster: &[Contact]) -> bool {
        let email_known = self
            .email
            .as_ref()
            .map_or(true, |e| cluster.iter().any(|c| c.email.as_ref() == Some(e)));
        let phone_known = self.phone_number.as_ref().map_or(true, |p| {
            cluster.iter().any(|c| c.phone_number.as_ref() == Some(p))
        });
        !(email_known && phone_known)
    }

    fn as_secondary_of(&self, primary_id: i32) -> NewContact {
        NewContact::secondary(self.email.clone(), self.phone_number.clone(), primary_id)
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn ContactStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    /// Resolve `email` / `phone_number` to their cluster, creating or merging
    /// contacts as needed.
    ///
    /// A write conflict (a concurrent request created or merged the same
    /// contacts) re-runs the lookup once; a second conflict is returned.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        email: Option<String>,
        phone_number: Option<String>,
    ) -> Result<ConsolidatedContact, IdentityError> {
        let identity = Identity::parse(email, phone_number)?;

        match self.reconcile(&identity).await {
            Err(IdentityError::Conflict(reason)) => {
                warn!(reason = %reason, "Contact write conflicted, retrying lookup");
                counter!("identity_conflict_retries_total").increment(1);
                self.reconcile(&identity).await
            }
            result => result,
        }
    }

    async fn reconcile(&self, identity: &Identity) -> Result<ConsolidatedContact, IdentityError> {
        let matches = self
            .store
            .find_by_email_or_phone(identity.email.as_deref(), identity.phone_number.as_deref())
            .await?;

        if matches.is_empty() {
            let contact = self
                .store
                .create(NewContact::primary(
                    identity.email.clone(),
                    identity.phone_number.clone(),
                ))
                .await?;
            info!(contact_id = contact.id, "New primary contact");
            counter!("identity_resolutions_total", "outcome" => "created_primary").increment(1);
            return Ok(ConsolidatedContact::from_cluster(
                contact.id,
                std::slice::from_ref(&contact),
            ));
        }

        let primaries = self.primaries_of(&matches).await?;
        let survivor = primaries[0].id;
        let demoted: Vec<i32> = primaries[1..].iter().map(|c| c.id).collect();

        let mut known = Vec::new();
        for primary in &primaries {
            known.extend(self.store.find_cluster(primary.id).await?);
        }
        let insert = identity
            .is_new_to(&known)
            .then(|| identity.as_secondary_of(survivor));

        if demoted.is_empty() {
            match insert {
                Some(contact) => {
                    let created = self.store.create(contact).await?;
                    info!(contact_id = created.id, primary_id = survivor, "New secondary contact");
                    counter!("identity_resolutions_total", "outcome" => "created_secondary")
                        .increment(1);
                }
                None => {
                    counter!("identity_resolutions_total", "outcome" => "matched").increment(1);
                }
            }
        } else {
            let created = self.store.merge(survivor, &demoted, insert).await?;
            info!(
                primary_id = survivor,
                demoted = ?demoted,
                created = ?created.map(|c| c.id),
                "Merged contact clusters"
            );
            counter!("identity_resolutions_total", "outcome" => "merged").increment(1);
        }

        let cluster = self.store.find_cluster(survivor).await?;
        Ok(ConsolidatedContact::from_cluster(survivor, &cluster))
    }

    /// Distinct primaries behind `matches`, oldest first.
    ///
    /// A linked primary that has vanished or is itself a secondary means the
    /// cluster changed under us, reported as a conflict.
    async fn primaries_of(&self, matches: &[Contact]) -> Result<Vec<Contact>, IdentityError> {
        let ids: BTreeSet<i32> = matches.iter().map(Contact::primary_id).collect();

        let mut primaries = Vec::with_capacity(ids.len());
        for id in ids {
            let primary = match matches.iter().find(|c| c.id == id) {
                Some(contact) => contact.clone(),
                None => self.store.find_by_id(id).await?.ok_or_else(|| {
                    IdentityError::Conflict(format!("primary contact {} disappeared", id))
                })?,
            };
            if !primary.is_primary() {
                return Err(IdentityError::Conflict(format!(
                    "contact {} was demoted during lookup",
                    id
                )));
            }
            primaries.push(primary);
        }

        primaries.sort_by_key(Contact::age_key);
        Ok(primaries)
    }
}
