//! Contact model: one row of an identity cluster.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Whether a contact anchors its cluster or hangs off another contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "secondary" => LinkPrecedence::Secondary,
            _ => LinkPrecedence::Primary,
        }
    }
}

/// Contact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Contact {
    pub id: i32,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub linked_id: Option<i32>,
    pub link_precedence: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn precedence(&self) -> LinkPrecedence {
        LinkPrecedence::from_string(&self.link_precedence)
    }

    pub fn is_primary(&self) -> bool {
        self.precedence() == LinkPrecedence::Primary
    }

    /// Id of the primary this contact belongs to.
    pub fn primary_id(&self) -> i32 {
        match self.linked_id {
            Some(linked_id) if !self.is_primary() => linked_id,
            _ => self.id,
        }
    }

    /// Ordering key for cluster members: oldest first, id breaks ties.
    pub fn age_key(&self) -> (DateTime<Utc>, i32) {
        (self.created_at, self.id)
    }
}

/// Input for inserting a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link_precedence: LinkPrecedence,
    pub linked_id: Option<i32>,
}

impl NewContact {
    pub fn primary(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            email,
            phone_number,
            link_precedence: LinkPrecedence::Primary,
            linked_id: None,
        }
    }

    pub fn secondary(
        email: Option<String>,
        phone_number: Option<String>,
        primary_id: i32,
    ) -> Self {
        Self {
            email,
            phone_number,
            link_precedence: LinkPrecedence::Secondary,
            linked_id: Some(primary_id),
        }
    }
}
