//! In-memory identity gateway for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::identity::{IdentityAccount, IdentityGateway, Tokens};
use crate::token::{Claims, EXPIRATION_TIME, TokenManager};
use crate::user::UserRole;

#[derive(Debug, Default)]
struct Account {
    id: String,
    name: String,
    password: Option<String>,
    groups: Vec<UserRole>,
}

/// Identity gateway keeping accounts in process memory, issuing real
/// tokens through the shared [`TokenManager`].
pub struct MemoryGateway {
    accounts: Mutex<HashMap<String, Account>>,
    token: TokenManager,
}

impl MemoryGateway {
    pub fn new(token: TokenManager) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            token,
        }
    }

    /// Whether an account still exists for `email`.
    pub fn has_account(&self, email: &str) -> bool {
        self.accounts.lock().unwrap().contains_key(email)
    }
}

#[async_trait]
impl IdentityGateway for MemoryGateway {
    async fn create_account(
        &self,
        email: &str,
        name: &str,
    ) -> Result<IdentityAccount> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(ServerError::conflict("identity"));
        }

        let id = Uuid::new_v4().to_string();
        accounts.insert(
            email.to_owned(),
            Account {
                id: id.clone(),
                name: name.to_owned(),
                password: None,
                groups: Vec::new(),
            },
        );

        Ok(IdentityAccount {
            id: Some(id),
            attributes: vec![
                ("email".to_owned(), email.to_owned()),
                ("name".to_owned(), name.to_owned()),
            ],
        })
    }

    async fn set_password(&self, email: &str, password: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(email)
            .ok_or_else(|| ServerError::not_found("identity"))?;
        account.password = Some(password.to_owned());
        Ok(())
    }

    async fn add_to_group(&self, email: &str, group: UserRole) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(email)
            .ok_or_else(|| ServerError::not_found("identity"))?;
        if !account.groups.contains(&group) {
            account.groups.push(group);
        }
        Ok(())
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Tokens> {
        let subject = {
            let accounts = self.accounts.lock().unwrap();
            let account =
                accounts.get(email).ok_or(ServerError::Unauthorized)?;

            if account.password.as_deref() != Some(password) {
                return Err(ServerError::Unauthorized);
            }
            account.id.clone()
        };

        Ok(Tokens {
            access_token: self.token.create(&subject)?,
            token_type: "Bearer".to_owned(),
            expires_in: EXPIRATION_TIME,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<Claims> {
        self.token.decode(token)
    }

    async fn list_accounts(&self) -> Result<Vec<IdentityAccount>> {
        let accounts = self.accounts.lock().unwrap();
        let mut listed: Vec<IdentityAccount> = accounts
            .iter()
            .map(|(email, account)| IdentityAccount {
                id: Some(account.id.clone()),
                attributes: vec![
                    ("email".to_owned(), email.clone()),
                    ("name".to_owned(), account.name.clone()),
                ],
            })
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        let email = accounts
            .iter()
            .find(|(_, account)| account.id == id)
            .map(|(email, _)| email.clone())
            .ok_or_else(|| ServerError::not_found("identity"))?;
        accounts.remove(&email);
        Ok(())
    }
}
