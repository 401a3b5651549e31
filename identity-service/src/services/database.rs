//! PostgreSQL contact store.

use async_trait::async_trait;
use metrics::histogram;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use crate::models::{Contact, LinkPrecedence, NewContact};
use crate::services::contact_store::ContactStore;
use crate::services::error::StoreError;

const CONTACT_COLUMNS: &str =
    "id, phone_number, email, linked_id, link_precedence, created_at, updated_at, deleted_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "identity-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Wait for in-flight queries and close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL connection pool closed");
    }
}

fn observe(operation: &'static str, started: Instant) {
    histogram!("identity_db_query_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

async fn insert_contact<'e, E: PgExecutor<'e>>(
    executor: E,
    contact: &NewContact,
) -> Result<Contact, StoreError> {
    let contact = sqlx::query_as::<_, Contact>(&format!(
        r#"
        INSERT INTO contacts (phone_number, email, linked_id, link_precedence)
        VALUES ($1, $2, $3, $4)
        RETURNING {CONTACT_COLUMNS}
        "#
    ))
    .bind(contact.phone_number.as_deref())
    .bind(contact.email.as_deref())
    .bind(contact.linked_id)
    .bind(contact.link_precedence.as_str())
    .fetch_one(executor)
    .await?;
    Ok(contact)
}

async fn set_link<'e, E: PgExecutor<'e>>(
    executor: E,
    ids: &[i32],
    precedence: LinkPrecedence,
    linked_id: Option<i32>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE contacts
        SET link_precedence = $2, linked_id = $3, updated_at = NOW()
        WHERE id = ANY($1) AND deleted_at IS NULL
        "#,
    )
    .bind(ids)
    .bind(precedence.as_str())
    .bind(linked_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl ContactStore for PgContactStore {
    #[instrument(skip(self))]
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, StoreError> {
        let started = Instant::now();

        let contacts = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE deleted_at IS NULL
              AND (($1::text IS NOT NULL AND email = $1)
                OR ($2::text IS NOT NULL AND phone_number = $2))
            ORDER BY created_at, id
            "#
        ))
        .bind(email)
        .bind(phone_number)
        .fetch_all(&self.pool)
        .await?;

        observe("find_by_email_or_phone", started);
        Ok(contacts)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> Result<Option<Contact>, StoreError> {
        let started = Instant::now();

        let contact = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        observe("find_by_id", started);
        Ok(contact)
    }

    #[instrument(skip(self, contact), fields(precedence = contact.link_precedence.as_str()))]
    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError> {
        let started = Instant::now();

        let created = match contact.linked_id {
            None => insert_contact(&self.pool, &contact).await?,
            Some(anchor) => {
                let mut tx = self.pool.begin().await?;

                // Held until commit, so a merge cannot demote the anchor
                // underneath the insert.
                let anchor_live: Option<i32> = sqlx::query_scalar(
                    r#"
                    SELECT id FROM contacts
                    WHERE id = $1 AND deleted_at IS NULL AND link_precedence = 'primary'
                    FOR SHARE
                    "#,
                )
                .bind(anchor)
                .fetch_optional(&mut *tx)
                .await?;

                if anchor_live.is_none() {
                    tx.rollback().await?;
                    return Err(StoreError::Conflict(format!(
                        "contact {} is no longer a primary",
                        anchor
                    )));
                }

                let created = insert_contact(&mut *tx, &contact).await?;
                tx.commit().await?;
                created
            }
        };
        observe("create", started);

        info!(contact_id = created.id, "Contact created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn update_precedence_and_link(
        &self,
        id: i32,
        precedence: LinkPrecedence,
        linked_id: Option<i32>,
    ) -> Result<(), StoreError> {
        let started = Instant::now();
        set_link(&self.pool, &[id], precedence, linked_id).await?;
        observe("update_precedence_and_link", started);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_cluster(&self, primary_id: i32) -> Result<Vec<Contact>, StoreError> {
        let started = Instant::now();

        let contacts = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE deleted_at IS NULL AND (id = $1 OR linked_id = $1)
            ORDER BY created_at, id
            "#
        ))
        .bind(primary_id)
        .fetch_all(&self.pool)
        .await?;

        observe("find_cluster", started);
        Ok(contacts)
    }

    #[instrument(skip(self, insert))]
    async fn merge(
        &self,
        survivor: i32,
        demoted: &[i32],
        insert: Option<NewContact>,
    ) -> Result<Option<Contact>, StoreError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let mut anchors = Vec::with_capacity(demoted.len() + 1);
        anchors.push(survivor);
        anchors.extend_from_slice(demoted);

        // Lock every primary involved; a concurrent merge either finished
        // first (and we see the demotion) or waits for us.
        let live_primaries: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT id FROM contacts
                WHERE id = ANY($1) AND deleted_at IS NULL AND link_precedence = 'primary'
                FOR UPDATE
            ) locked
            "#,
        )
        .bind(&anchors)
        .fetch_one(&mut *tx)
        .await?;

        if live_primaries as usize != anchors.len() {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!(
                "cluster anchors {:?} changed before merge",
                anchors
            )));
        }

        set_link(&mut *tx, demoted, LinkPrecedence::Secondary, Some(survivor)).await?;

        let repointed = sqlx::query(
            r#"
            UPDATE contacts
            SET linked_id = $1, updated_at = NOW()
            WHERE linked_id = ANY($2) AND deleted_at IS NULL
            "#,
        )
        .bind(survivor)
        .bind(demoted)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let created = match &insert {
            Some(contact) => Some(insert_contact(&mut *tx, contact).await?),
            None => None,
        };

        tx.commit().await?;
        observe("merge", started);

        info!(
            survivor,
            repointed,
            created = ?created.as_ref().map(|c| c.id),
            "Contact clusters merged"
        );
        Ok(created)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
