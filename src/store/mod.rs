//! User record store boundary.
//!
//! A key-value table keyed by user id with secondary lookup indexes by
//! name, handle, email and activation code. Writes other than creation are
//! conditioned on the record already existing (no implicit upsert);
//! creation is conditioned on the id not existing yet.

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgUserStore;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "portico";
pub const DEFAULT_POOL_SIZE: u32 = 10;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::user::{User, UserStatus};

/// Record store consumed by the lifecycle engine. Injected so tests can
/// substitute an in-memory fake.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Conditioned put: fails with `Conflict` when the id already exists.
    async fn create(&self, user: &User) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn get_by_name(&self, name: &str) -> Result<Option<User>>;
    async fn get_by_handle(&self, handle: &str) -> Result<Option<User>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_by_activation_code(
        &self,
        code: &str,
    ) -> Result<Option<User>>;

    /// Conditioned update: fails with `NotFound` when the record is absent.
    async fn set_status(&self, id: &str, status: UserStatus) -> Result<()>;

    /// Remove the activation code once consumed. Conditioned on existence.
    async fn clear_activation_code(&self, id: &str) -> Result<()>;

    /// Conditioned update of the login timestamp.
    async fn set_last_login(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Append a badge to the stored list, conditioned on existence.
    /// Returns the full updated badge list.
    async fn append_badge(&self, id: &str, badge: &str)
    -> Result<Vec<String>>;

    /// Remove the badge at `index` (0-based, against a list the caller just
    /// read), conditioned on existence. Returns the updated badge list.
    async fn remove_badge_at(
        &self,
        id: &str,
        index: usize,
    ) -> Result<Vec<String>>;

    /// Replace the unstructured `data` mapping, conditioned on existence.
    async fn set_data(
        &self,
        id: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()>;

    /// Delete the record, conditioned on existence.
    async fn delete(&self, id: &str) -> Result<()>;
}
