//! Identity directory boundary.
//!
//! The directory is the source of truth for login identity, group
//! membership and account existence at the identity layer. It mints the
//! stable subject identifier reused as the record store primary key.

pub mod ldap;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::token::Claims;
use crate::user::UserRole;

/// Identity-side account, as returned by [`IdentityGateway::create_account`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentityAccount {
    /// Gateway-minted stable subject identifier.
    pub id: Option<String>,
    /// Directory attributes (email, name, ...).
    pub attributes: Vec<(String, String)>,
}

impl IdentityAccount {
    /// First value held for a named attribute, if any.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Tokens issued on successful authentication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// External managed service issuing credentials, tokens and account
/// identities. Injected into the lifecycle engine so tests can substitute
/// an in-memory fake.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Create an identity-side account.
    ///
    /// Fails with `Conflict` when the identity already exists.
    async fn create_account(
        &self,
        email: &str,
        name: &str,
    ) -> Result<IdentityAccount>;

    /// Set a permanent password on an existing account.
    async fn set_password(&self, email: &str, password: &str) -> Result<()>;

    /// Add the account to a role group.
    async fn add_to_group(&self, email: &str, group: UserRole) -> Result<()>;

    /// Check credentials and issue tokens.
    ///
    /// Fails with `Unauthorized` on bad credentials.
    async fn authenticate(&self, email: &str, password: &str)
    -> Result<Tokens>;

    /// Verify an access token and return its claims.
    async fn verify_token(&self, token: &str) -> Result<Claims>;

    /// Enumerate every identity-side account.
    async fn list_accounts(&self) -> Result<Vec<IdentityAccount>>;

    /// Remove the identity-side account. Irreversible.
    async fn delete_account(&self, id: &str) -> Result<()>;
}
