//! User lifecycle engine.
//!
//! Owns the `User` entity's invariants and mutation rules. Talks to the
//! record store and the identity directory through injected trait objects
//! and translates every dependency failure into the crate error taxonomy
//! before it crosses this boundary.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

use crate::error::{Result, ServerError};
use crate::identity::{IdentityAccount, IdentityGateway, Tokens};
use crate::store::UserStore;
use crate::token::Claims;
use crate::user::{
    ProfileData, STARTER_BADGE, User, UserRole, UserStatus, collapse_spaces,
    derive_handle, generate_activation_code,
};

/// Registration request, already shape-validated by the transport layer.
#[derive(Clone, Debug, Default)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub repeat_password: String,
    pub source_ip: Option<String>,
    pub source_system: Option<String>,
}

/// How [`UserService::update_data`] combines the patch with stored data.
/// The modes are strictly exclusive.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataMode {
    Overwrite,
    #[default]
    Merge,
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityGateway>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        store: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityGateway>,
    ) -> Self {
        Self { store, identity }
    }

    /// Register a new user: identity account first, then the user record.
    ///
    /// The two writes are a plain two-step sequence with no transaction
    /// spanning both systems. When the record write fails the identity
    /// account is left in place for operational reconciliation.
    pub async fn register(&self, input: RegisterInput) -> Result<User> {
        if input.password != input.repeat_password {
            return Err(password_mismatch().into());
        }

        let name = collapse_spaces(&input.name, true);
        let email = collapse_spaces(&input.email, true);

        tracing::debug!(%email, "starting user registration");

        let account = self.identity.create_account(&email, &name).await?;
        self.identity.set_password(&email, &input.password).await?;
        self.identity.add_to_group(&email, UserRole::User).await?;

        // Registration cannot proceed without a durable subject id.
        let id = account.id.ok_or_else(|| {
            ServerError::internal(
                "identity directory returned an account without a subject id",
            )
        })?;

        let user = User {
            id,
            created_at: Utc::now(),
            updated_at: None,
            last_login_at: None,
            email,
            name: name.clone(),
            handle: derive_handle(&name),
            activation_code: Some(generate_activation_code()),
            source_ip: input.source_ip,
            source_system: input.source_system,
            role: UserRole::User,
            status: UserStatus::Unconfirmed,
            profile_data: ProfileData::default(),
            data: serde_json::Map::new(),
            badges: vec![STARTER_BADGE.to_owned()],
        };

        if let Err(err) = self.store.create(&user).await {
            // Compensation hook point: the identity account outlives this
            // failure and must be reconciled operationally.
            tracing::error!(
                user_id = user.id,
                "user record creation failed after identity creation"
            );
            return Err(err);
        }

        tracing::info!(user_id = user.id, handle = user.handle, "new user registered");

        Ok(user)
    }

    /// Check credentials against the identity directory and issue tokens.
    pub async fn login(&self, email: &str, password: &str) -> Result<Tokens> {
        let email = collapse_spaces(email, true);
        let tokens = self.identity.authenticate(&email, password).await?;
        let claims = self.identity.verify_token(&tokens.access_token).await?;

        let user = self
            .store
            .get_by_id(&claims.sub)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))?;

        if !user.can_login() {
            tracing::warn!(
                user_id = user.id,
                status = %user.status,
                "login blocked by account status"
            );
            return Err(ServerError::forbidden(format!(
                "account status {} does not allow login",
                user.status
            )));
        }

        // Best-effort: a failure to record the timestamp never fails the
        // login itself.
        if let Err(err) =
            self.store.set_last_login(&user.id, Utc::now()).await
        {
            tracing::warn!(user_id = user.id, error = %err, "last-login update failed");
        }

        Ok(tokens)
    }

    /// Verify an access token. Entirely delegated.
    pub async fn verify(&self, token: &str) -> Result<Claims> {
        self.identity.verify_token(token).await
    }

    /// Enumerate every account the identity directory holds.
    pub async fn list(&self) -> Result<Vec<IdentityAccount>> {
        self.identity.list_accounts().await
    }

    /// Consume an activation code, transitioning the account to CONFIRMED.
    pub async fn activate(&self, activation_code: &str) -> Result<User> {
        let mut user = self
            .store
            .get_by_activation_code(activation_code)
            .await?
            .ok_or_else(|| ServerError::not_found("activation code"))?;

        match user.status {
            UserStatus::Confirmed => {
                return Err(ServerError::BadRequest(
                    "This account has already been activated".to_owned(),
                ));
            },
            UserStatus::Unconfirmed => {},
            _ => {
                return Err(ServerError::BadRequest(
                    "This account cannot be activated".to_owned(),
                ));
            },
        }

        // Two sequential conditioned writes. The second is best-effort and
        // does not roll back the first.
        self.store.set_status(&user.id, UserStatus::Confirmed).await?;
        if let Err(err) = self.store.clear_activation_code(&user.id).await {
            tracing::warn!(
                user_id = user.id,
                error = %err,
                "activation code removal failed after confirmation"
            );
        }

        user.status = UserStatus::Confirmed;
        user.activation_code = None;

        tracing::info!(user_id = user.id, "account activated");
        Ok(user)
    }

    /// Set the account status from its textual token, case-insensitively.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<()> {
        let status: UserStatus = status
            .parse()
            .map_err(|_| invalid_status(status))?;

        self.store.set_status(id, status).await
    }

    /// Issue a badge. Rejected when already held; returns the updated set.
    pub async fn issue_badge(
        &self,
        id: &str,
        badge: &str,
    ) -> Result<Vec<String>> {
        let user = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))?;

        // Fresh read guards uniqueness; not atomic with the append below.
        if user.badges.iter().any(|held| held == badge) {
            return Err(ServerError::conflict("badge"));
        }

        self.store.append_badge(id, badge).await
    }

    /// Revoke a badge by positional index against a freshly re-read list.
    pub async fn revoke_badge(
        &self,
        id: &str,
        badge: &str,
    ) -> Result<Vec<String>> {
        let user = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))?;

        let index = user
            .badges
            .iter()
            .position(|held| held == badge)
            .ok_or_else(|| ServerError::not_found("badge"))?;

        self.store.remove_badge_at(id, index).await
    }

    /// Update the unstructured `data` mapping.
    ///
    /// OVERWRITE replaces the mapping with the patch verbatim; MERGE reads
    /// the current mapping and applies a shallow merge where patch keys
    /// win. Exactly one of the two paths runs.
    pub async fn update_data(
        &self,
        id: &str,
        patch: serde_json::Map<String, serde_json::Value>,
        mode: DataMode,
    ) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        match mode {
            DataMode::Overwrite => self.store.set_data(id, &patch).await,
            DataMode::Merge => {
                let user = self
                    .store
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| ServerError::not_found("user"))?;

                let mut merged = user.data;
                for (key, value) in patch {
                    merged.insert(key, value);
                }
                self.store.set_data(id, &merged).await
            },
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<User> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))
    }

    pub async fn get_by_handle(&self, handle: &str) -> Result<User> {
        self.store
            .get_by_handle(handle)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        self.store
            .get_by_email(email)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<User> {
        self.store
            .get_by_name(name)
            .await?
            .ok_or_else(|| ServerError::not_found("user"))
    }

    /// Remove the user from the identity directory and the record store.
    ///
    /// Irreversible, dual-system, no transaction spanning both calls.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.identity.delete_account(id).await?;
        self.store.delete(id).await?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }
}

fn password_mismatch() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        "repeat_password",
        ValidationError::new("repeat_password")
            .with_message("Password and repeat password must match.".into()),
    );
    errors
}

fn invalid_status(status: &str) -> ServerError {
    let mut errors = ValidationErrors::new();
    errors.add(
        "status",
        ValidationError::new("status")
            .with_message(format!("Invalid user status {status}.").into()),
    );
    errors.into()
}
