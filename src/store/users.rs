use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

use super::{tx, NewUser, StoreError, User, UserMetadata, UserStore, UserUpdate};

const USER_COLUMNS: &str =
    "id, name, username, email, phone_number, role, password_hash, created_at, updated_at";

/// Postgres-backed [`UserStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    tx_deadline: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, tx_deadline: Duration) -> Self {
        Self { pool, tx_deadline }
    }

    async fn find_by_column(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

async fn insert_user(
    tx: &mut Transaction<'static, Postgres>,
    user: &NewUser,
) -> Result<User, StoreError> {
    let sql = format!(
        "INSERT INTO users (id, name, username, email, phone_number, role, password_hash) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.role)
        .bind(&user.password_hash)
        .fetch_one(&mut **tx)
        .await
        .map_err(StoreError::classify)
}

async fn insert_user_metadata(
    tx: &mut Transaction<'static, Postgres>,
    user_id: Uuid,
    metadata: serde_json::Value,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO user_metadata (user_id, metadata) VALUES ($1, $2)")
        .bind(user_id)
        .bind(metadata)
        .execute(&mut **tx)
        .await
        .map_err(|err| {
            error!(%err, "failed to insert user metadata");
            StoreError::Database(err)
        })?;
    Ok(())
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user_with_metadata(
        &self,
        user: NewUser,
        metadata: UserMetadata,
    ) -> Result<User, StoreError> {
        tx::execute_with_deadline(&self.pool, self.tx_deadline, move |tx: &mut Transaction<'static, Postgres>| {
            Box::pin(async move {
                let created = insert_user(tx, &user).await?;
                // Serialization happens inside the scope: if it fails, the
                // user row above is rolled back with it.
                let payload = serde_json::to_value(&metadata)?;
                insert_user_metadata(tx, created.id, payload).await?;
                Ok(created)
            })
        })
        .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserUpdate) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET name = $1, username = $2, email = $3, phone_number = $4, \
             password_hash = COALESCE($5, password_hash), updated_at = now() \
             WHERE id = $6 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&changes.name)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.phone_number)
            .bind(&changes.password_hash)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::classify)
    }
}
