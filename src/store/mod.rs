use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub mod tx;
pub mod users;

pub use users::PgStore;

/// A row from the `users` table. The password hash never leaves the process:
/// it is skipped on serialization and absent from [`UserSnapshot`].
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity view embedded in bearer tokens and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
}

impl User {
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    /// `None` keeps the stored hash.
    pub password_hash: Option<String>,
}

/// Auxiliary registration data persisted alongside the user row, in the
/// same transaction scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetadata {
    pub device: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{field} already exists")]
    Duplicate { field: &'static str },

    #[error("failed to encode metadata: {0}")]
    MetadataEncode(#[from] serde_json::Error),

    /// The operation failed AND the rollback failed. Both sides are carried
    /// so neither is ever silently dropped.
    #[error("transaction failed: {source}; rollback failed: {rollback}")]
    Transaction {
        source: Box<StoreError>,
        rollback: sqlx::Error,
    },

    #[error("transaction deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    /// Maps a unique-constraint violation (SQLSTATE 23505) onto the field
    /// that collided; everything else stays a raw database error.
    pub(crate) fn classify(err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23505") {
                let field = match db.constraint() {
                    Some("users_email_key") => "email",
                    Some("users_username_key") => "username",
                    _ => "record",
                };
                return StoreError::Duplicate { field };
            }
        }
        StoreError::Database(err)
    }
}

/// Row-level persistence consumed by the API layer.
///
/// `PgStore` is the production implementation; tests drive the pipeline
/// against their own in-memory implementation of this trait.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the user row and its metadata row atomically: either both
    /// are durable or neither is.
    async fn create_user_with_metadata(
        &self,
        user: NewUser,
        metadata: UserMetadata,
    ) -> Result<User, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn update_user(&self, id: Uuid, changes: UserUpdate) -> Result<User, StoreError>;
}

/// Opens the connection pool and verifies the database answers.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("connected to database");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
