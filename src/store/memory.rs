//! In-memory user record store for tests.
//!
//! Reproduces the conditioned-write contract of the Postgres store,
//! including its non-atomic read-then-write exposure on badges and data.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, ServerError};
use crate::store::UserStore;
use crate::user::{User, UserStatus};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_user<T>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut User) -> T,
    ) -> Result<T> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| ServerError::not_found("user"))?;
        Ok(mutate(user))
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|user| predicate(user))
            .cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.id) {
            return Err(ServerError::conflict("user"));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self.find(|user| user.name == name))
    }

    async fn get_by_handle(&self, handle: &str) -> Result<Option<User>> {
        Ok(self.find(|user| user.handle == handle))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find(|user| user.email == email))
    }

    async fn get_by_activation_code(
        &self,
        code: &str,
    ) -> Result<Option<User>> {
        Ok(self.find(|user| user.activation_code.as_deref() == Some(code)))
    }

    async fn set_status(&self, id: &str, status: UserStatus) -> Result<()> {
        self.with_user(id, |user| {
            user.status = status;
            user.updated_at = Some(Utc::now());
        })
    }

    async fn clear_activation_code(&self, id: &str) -> Result<()> {
        self.with_user(id, |user| {
            user.activation_code = None;
        })
    }

    async fn set_last_login(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_user(id, |user| {
            user.last_login_at = Some(at);
        })
    }

    async fn append_badge(
        &self,
        id: &str,
        badge: &str,
    ) -> Result<Vec<String>> {
        self.with_user(id, |user| {
            user.badges.push(badge.to_owned());
            user.updated_at = Some(Utc::now());
            user.badges.clone()
        })
    }

    async fn remove_badge_at(
        &self,
        id: &str,
        index: usize,
    ) -> Result<Vec<String>> {
        self.with_user(id, |user| {
            if index < user.badges.len() {
                user.badges.remove(index);
            }
            user.updated_at = Some(Utc::now());
            user.badges.clone()
        })
    }

    async fn set_data(
        &self,
        id: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.with_user(id, |user| {
            user.data = data.clone();
            user.updated_at = Some(Utc::now());
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        users
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServerError::not_found("user"))
    }
}
