//! Read-only payment records served from the document store.
//!
//! Documents are written by other systems with loose typing (amounts may be
//! strings or numbers, dates strings or BSON dates), so records are mapped
//! field by field and every scalar is rendered as a string.

use mongodb::bson::{Bson, Document};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub transaction_id: Option<String>,
    pub user_name: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub payment: Option<String>,
}

impl From<&Document> for TransactionRecord {
    fn from(doc: &Document) -> Self {
        Self {
            id: field_as_string(doc, "_id"),
            transaction_id: field_as_string(doc, "transactionId"),
            user_name: field_as_string(doc, "username"),
            amount: field_as_string(doc, "amount"),
            currency: field_as_string(doc, "currency"),
            status: field_as_string(doc, "status"),
            payment: field_as_string(doc, "paymentMethod"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecord {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub invoice_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

impl From<&Document> for InvoiceRecord {
    fn from(doc: &Document) -> Self {
        Self {
            id: field_as_string(doc, "_id"),
            invoice_id: field_as_string(doc, "invoiceId"),
            customer_name: field_as_string(doc, "customerName"),
            customer_email: field_as_string(doc, "customerEmail"),
            customer_phone: field_as_string(doc, "customerPhone"),
            amount: field_as_string(doc, "amount"),
            currency: field_as_string(doc, "currency"),
            due_date: field_as_string(doc, "dueDate"),
            status: field_as_string(doc, "status"),
        }
    }
}

fn field_as_string(doc: &Document, key: &str) -> Option<String> {
    match doc.get(key)? {
        Bson::String(s) => Some(s.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(n) => Some(n.to_string()),
        Bson::Boolean(b) => Some(b.to_string()),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().ok(),
        Bson::Null | Bson::Undefined => None,
        other => Some(other.to_string()),
    }
}
