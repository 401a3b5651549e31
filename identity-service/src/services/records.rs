//! Paginated, searchable listing of payment records kept in MongoDB.

use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use mongodb::{Client as MongoClient, Collection, Database};
use service_core::error::AppError;
use tracing::instrument;

use crate::models::{InvoiceRecord, TransactionRecord};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

const TRANSACTION_SEARCH_FIELDS: &[&str] =
    &["username", "transactionId", "userId", "paymentMethod", "status"];
const INVOICE_SEARCH_FIELDS: &[&str] = &[
    "customerEmail",
    "customerName",
    "customerPhone",
    "currency",
    "status",
    "dueDate",
];

#[derive(Clone)]
pub struct MongoDb {
    db: Database,
}

impl MongoDb {
    /// Build a client for `uri`. The driver connects lazily, so an unreachable
    /// server surfaces on the first query rather than here.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::from(e)
        })?;
        Ok(Self {
            db: client.database(database),
        })
    }

    pub fn transactions(&self) -> Collection<Document> {
        self.db.collection("transactions")
    }

    pub fn invoices(&self) -> Collection<Document> {
        self.db.collection("invoices")
    }
}

/// One page request, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn new(page: Option<u64>, limit: Option<u64>, search: Option<String>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// Case-insensitive substring match of `term` against any of `fields`.
/// No term means no filtering.
pub fn search_filter(term: Option<&str>, fields: &[&str]) -> Document {
    let Some(term) = term else {
        return Document::new();
    };

    let pattern = regex::escape(term);
    let clauses: Vec<Bson> = fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
            Bson::Document(clause)
        })
        .collect();
    doc! { "$or": clauses }
}

#[derive(Clone)]
pub struct RecordsRepository {
    mongo: MongoDb,
}

impl RecordsRepository {
    pub fn new(mongo: MongoDb) -> Self {
        Self { mongo }
    }

    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<TransactionRecord>, u64), AppError> {
        let filter = search_filter(query.search.as_deref(), TRANSACTION_SEARCH_FIELDS);
        let (docs, total) = page(&self.mongo.transactions(), filter, query).await?;
        Ok((docs.iter().map(TransactionRecord::from).collect(), total))
    }

    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<InvoiceRecord>, u64), AppError> {
        let filter = search_filter(query.search.as_deref(), INVOICE_SEARCH_FIELDS);
        let (docs, total) = page(&self.mongo.invoices(), filter, query).await?;
        Ok((docs.iter().map(InvoiceRecord::from).collect(), total))
    }
}

async fn page(
    collection: &Collection<Document>,
    filter: Document,
    query: &ListQuery,
) -> Result<(Vec<Document>, u64), AppError> {
    let total = collection.count_documents(filter.clone(), None).await?;

    let options = FindOptions::builder()
        .skip(query.skip())
        .limit(query.limit as i64)
        .build();
    let docs: Vec<Document> = collection.find(filter, options).await?.try_collect().await?;

    Ok((docs, total))
}
