//! PostgreSQL-backed user record store.
//!
//! Conditioned writes are realized with `ON CONFLICT DO NOTHING` and
//! `rows_affected()` checks: an insert touching zero rows means the key
//! already existed, an update touching zero rows means it vanished.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::store::UserStore;
use crate::user::{ProfileData, User, UserStatus};

const USER_COLUMNS: &str = "id, created_at, updated_at, last_login_at, \
     email, name, handle, activation_code, source_ip, source_system, \
     role, status, profile_data, data, badges";

#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool<Postgres>,
}

/// Flat row shape; enums and JSON documents are decoded in [`UserRow::try_into_user`].
#[derive(FromRow)]
struct UserRow {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    email: String,
    name: String,
    handle: String,
    activation_code: Option<String>,
    source_ip: Option<String>,
    source_system: Option<String>,
    role: String,
    status: String,
    profile_data: serde_json::Value,
    data: serde_json::Value,
    badges: Vec<String>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User> {
        let profile_data: ProfileData =
            serde_json::from_value(self.profile_data).map_err(|err| {
                corrupt_record(&self.id, "profile_data", Box::new(err))
            })?;
        let data = match self.data {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let role = self.role.parse().map_err(|_| {
            ServerError::internal(format!(
                "user {} holds unknown role {}",
                self.id, self.role
            ))
        })?;
        // Unrecognized tokens written by older deployments degrade to
        // UNKNOWN instead of poisoning every read.
        let status = self.status.parse().unwrap_or(UserStatus::Unknown);

        Ok(User {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
            email: self.email,
            name: self.name,
            handle: self.handle,
            activation_code: self.activation_code,
            source_ip: self.source_ip,
            source_system: self.source_system,
            role,
            status,
            profile_data,
            data,
            badges: self.badges,
        })
    }
}

fn corrupt_record(
    id: &str,
    field: &str,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> ServerError {
    ServerError::Internal {
        details: format!("user {id} holds undecodable {field}"),
        source: Some(source),
    }
}

impl PgUserStore {
    /// Create a new [`PgUserStore`] on an existing pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Init the connection pool and run pending migrations.
    pub async fn connect(
        hostname: &str,
        username: &str,
        password: &str,
        db: &str,
        pool: u32,
    ) -> std::result::Result<Self, sqlx::Error> {
        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new()
            .max_connections(pool)
            .connect(&addr)
            .await?;

        tracing::info!(%hostname, %db, "postgres connected");

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    async fn get_by_field(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {field} = $1 LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::try_into_user).transpose()
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &User) -> Result<()> {
        let query = format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (id) DO NOTHING"
        );
        let result = sqlx::query(&query)
            .bind(&user.id)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.last_login_at)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.handle)
            .bind(&user.activation_code)
            .bind(&user.source_ip)
            .bind(&user.source_system)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(serde_json::to_value(&user.profile_data).unwrap_or_default())
            .bind(serde_json::Value::Object(user.data.clone()))
            .bind(&user.badges)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::conflict("user"));
        }
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        self.get_by_field("id", id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        self.get_by_field("name", name).await
    }

    async fn get_by_handle(&self, handle: &str) -> Result<Option<User>> {
        self.get_by_field("handle", handle).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.get_by_field("email", email).await
    }

    async fn get_by_activation_code(
        &self,
        code: &str,
    ) -> Result<Option<User>> {
        self.get_by_field("activation_code", code).await
    }

    async fn set_status(&self, id: &str, status: UserStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::not_found("user"));
        }
        Ok(())
    }

    async fn clear_activation_code(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET activation_code = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::not_found("user"));
        }
        Ok(())
    }

    async fn set_last_login(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
                .bind(id)
                .bind(at)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::not_found("user"));
        }
        Ok(())
    }

    async fn append_badge(
        &self,
        id: &str,
        badge: &str,
    ) -> Result<Vec<String>> {
        let row: Option<(Vec<String>,)> = sqlx::query_as(
            "UPDATE users \
             SET badges = array_append(badges, $2), updated_at = $3 \
             WHERE id = $1 RETURNING badges",
        )
        .bind(id)
        .bind(badge)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(badges,)| badges)
            .ok_or_else(|| ServerError::not_found("user"))
    }

    async fn remove_badge_at(
        &self,
        id: &str,
        index: usize,
    ) -> Result<Vec<String>> {
        // Positional removal against the caller's freshly read list; a
        // concurrent writer between the read and this statement can still
        // shift indexes, same as the original remove-by-index semantics.
        let idx = index as i32;
        let row: Option<(Vec<String>,)> = sqlx::query_as(
            "UPDATE users \
             SET badges = badges[1:$2] || badges[$2 + 2:], updated_at = $3 \
             WHERE id = $1 RETURNING badges",
        )
        .bind(id)
        .bind(idx)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(badges,)| badges)
            .ok_or_else(|| ServerError::not_found("user"))
    }

    async fn set_data(
        &self,
        id: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET data = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(serde_json::Value::Object(data.clone()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::not_found("user"));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::not_found("user"));
        }
        Ok(())
    }
}
