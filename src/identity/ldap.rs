//! LDAP-backed identity gateway.

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{Ldap as Ldap3, LdapConnAsync, LdapError, Mod, Scope, SearchEntry};
use uuid::Uuid;

use crate::config;
use crate::error::{Result, ServerError};
use crate::identity::{IdentityAccount, IdentityGateway, Tokens};
use crate::token::{Claims, EXPIRATION_TIME, TokenManager};
use crate::user::UserRole;

const TOKEN_TYPE: &str = "Bearer";

// LDAP result codes worth branching on.
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// Identity gateway backed by an LDAP directory, issuing access tokens
/// in-process with a [`TokenManager`].
#[derive(Clone, Debug)]
pub struct LdapGateway {
    conn: Ldap3,
    addr: String,
    base_dn: String,
    users_dn: String,
    groups_dn: Option<String>,
    token: TokenManager,
}

impl LdapGateway {
    /// Connect to the directory and bind as the administrative user.
    pub async fn connect(
        ldap: &config::Ldap,
        token: TokenManager,
    ) -> Result<Self> {
        let (handle, mut conn) = LdapConnAsync::new(&ldap.address)
            .await
            .map_err(|err| map_ldap(err, "connect"))?;
        ldap3::drive!(handle);

        if let Some(dn) = &ldap.user {
            let password = ldap.password.as_deref().ok_or_else(|| {
                ServerError::internal("ldap bind user set without password")
            })?;

            conn.simple_bind(dn, password)
                .await
                .and_then(|res| res.success())
                .map_err(|err| map_ldap(err, "bind"))?;
        }

        tracing::info!(address = ldap.address, "ldap connected");

        Ok(Self {
            conn,
            addr: ldap.address.clone(),
            base_dn: ldap.base_dn.clone(),
            users_dn: ldap.additional_users_dn.clone(),
            groups_dn: ldap.additional_groups_dn.clone(),
            token,
        })
    }

    fn user_dn(&self, id: &str) -> String {
        format!("uid={},{},{}", escape_ldap(id), self.users_dn, self.base_dn)
    }

    fn group_dn(&self, group: UserRole) -> String {
        match &self.groups_dn {
            Some(groups_dn) => {
                format!("cn={},{},{}", group, groups_dn, self.base_dn)
            },
            None => format!("cn={},{}", group, self.base_dn),
        }
    }

    /// Resolve the directory entry holding `email`, if any.
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<SearchEntry>> {
        let mut conn = self.conn.clone();
        let filter = format!("(mail={})", escape_ldap(email));
        let (results, _) = conn
            .search(
                &self.base_dn,
                Scope::Subtree,
                &filter,
                vec!["dn", "uid", "mail", "cn"],
            )
            .await
            .and_then(|res| res.success())
            .map_err(|err| map_ldap(err, "search"))?;

        Ok(results.into_iter().next().map(SearchEntry::construct))
    }
}

#[async_trait]
impl IdentityGateway for LdapGateway {
    async fn create_account(
        &self,
        email: &str,
        name: &str,
    ) -> Result<IdentityAccount> {
        if self.find_by_email(email).await?.is_some() {
            return Err(ServerError::conflict("identity"));
        }

        // Gateway-minted stable subject identifier.
        let id = Uuid::new_v4().to_string();
        let dn = self.user_dn(&id);

        let attrs = vec![
            (
                "objectClass",
                ["top", "person", "organizationalPerson", "inetOrgPerson"]
                    .into_iter()
                    .collect::<HashSet<_>>(),
            ),
            ("uid", [id.as_str()].into_iter().collect()),
            ("cn", [name].into_iter().collect()),
            ("sn", [name].into_iter().collect()),
            ("mail", [email].into_iter().collect()),
        ];

        let mut conn = self.conn.clone();
        match conn.add(&dn, attrs).await.and_then(|res| res.success()) {
            Ok(_) => {},
            Err(LdapError::LdapResult { result })
                if result.rc == RC_ENTRY_ALREADY_EXISTS =>
            {
                return Err(ServerError::conflict("identity"));
            },
            Err(err) => return Err(map_ldap(err, "add user")),
        }

        Ok(IdentityAccount {
            id: Some(id),
            attributes: vec![
                ("email".to_owned(), email.to_owned()),
                ("name".to_owned(), name.to_owned()),
            ],
        })
    }

    async fn set_password(&self, email: &str, password: &str) -> Result<()> {
        let entry = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServerError::not_found("identity"))?;

        let mut conn = self.conn.clone();
        conn.modify(
            &entry.dn,
            vec![Mod::Replace(
                "userPassword",
                [password].into_iter().collect(),
            )],
        )
        .await
        .and_then(|res| res.success())
        .map_err(|err| map_ldap(err, "set password"))?;
        Ok(())
    }

    async fn add_to_group(&self, email: &str, group: UserRole) -> Result<()> {
        let entry = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServerError::not_found("identity"))?;

        let group_dn = self.group_dn(group);
        let member: HashSet<&str> = [entry.dn.as_str()].into_iter().collect();

        let mut conn = self.conn.clone();
        let added = conn
            .modify(&group_dn, vec![Mod::Add("member", member.clone())])
            .await
            .and_then(|res| res.success());

        match added {
            Ok(_) => Ok(()),
            Err(LdapError::LdapResult { result })
                if result.rc == RC_NO_SUCH_OBJECT =>
            {
                // First member: create the group entry on the fly.
                let attrs = vec![
                    (
                        "objectClass",
                        ["top", "groupOfNames"]
                            .into_iter()
                            .collect::<HashSet<_>>(),
                    ),
                    ("cn", [group.as_str()].into_iter().collect()),
                    ("member", member),
                ];
                conn.add(&group_dn, attrs)
                    .await
                    .and_then(|res| res.success())
                    .map_err(|err| map_ldap(err, "create group"))?;
                Ok(())
            },
            Err(err) => Err(map_ldap(err, "add to group")),
        }
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Tokens> {
        let entry = self
            .find_by_email(email)
            .await?
            .ok_or(ServerError::Unauthorized)?;

        let subject = entry
            .attrs
            .get("uid")
            .and_then(|values| values.first())
            .cloned()
            .ok_or_else(|| {
                ServerError::internal("directory entry without uid")
            })?;

        // Bind on a dedicated connection so the admin bind stays intact.
        let (handle, mut conn) = LdapConnAsync::new(&self.addr)
            .await
            .map_err(|err| map_ldap(err, "connect"))?;
        ldap3::drive!(handle);

        match conn
            .simple_bind(&entry.dn, password)
            .await
            .and_then(|res| res.success())
        {
            Ok(_) => {},
            Err(LdapError::LdapResult { result })
                if result.rc == RC_INVALID_CREDENTIALS =>
            {
                return Err(ServerError::Unauthorized);
            },
            Err(err) => return Err(map_ldap(err, "bind")),
        }
        if let Err(err) = conn.unbind().await {
            tracing::debug!(error = %err, "ldap unbind failed");
        }

        Ok(Tokens {
            access_token: self.token.create(&subject)?,
            token_type: TOKEN_TYPE.to_owned(),
            expires_in: EXPIRATION_TIME,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<Claims> {
        self.token.decode(token)
    }

    async fn list_accounts(&self) -> Result<Vec<IdentityAccount>> {
        let base = format!("{},{}", self.users_dn, self.base_dn);

        let mut conn = self.conn.clone();
        let (results, _) = conn
            .search(
                &base,
                Scope::Subtree,
                "(objectClass=inetOrgPerson)",
                vec!["uid", "mail", "cn"],
            )
            .await
            .and_then(|res| res.success())
            .map_err(|err| map_ldap(err, "list users"))?;

        Ok(results
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| {
                let value = |attr: &str| {
                    entry
                        .attrs
                        .get(attr)
                        .and_then(|values| values.first())
                        .cloned()
                };

                let mut attributes = Vec::new();
                if let Some(email) = value("mail") {
                    attributes.push(("email".to_owned(), email));
                }
                if let Some(name) = value("cn") {
                    attributes.push(("name".to_owned(), name));
                }

                IdentityAccount {
                    id: value("uid"),
                    attributes,
                }
            })
            .collect())
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        match conn
            .delete(&self.user_dn(id))
            .await
            .and_then(|res| res.success())
        {
            Ok(_) => Ok(()),
            Err(LdapError::LdapResult { result })
                if result.rc == RC_NO_SUCH_OBJECT =>
            {
                Err(ServerError::not_found("identity"))
            },
            Err(err) => Err(map_ldap(err, "delete user")),
        }
    }
}

/// Translate an LDAP failure at the point of occurrence. The raw error is
/// logged with context and never crosses the gateway boundary.
fn map_ldap(err: LdapError, operation: &str) -> ServerError {
    tracing::error!(error = %err, operation, "ldap operation failed");
    ServerError::Internal {
        details: format!("identity directory {operation} failed"),
        source: Some(Box::new(err)),
    }
}

fn escape_ldap(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            '\\' => out.push_str(r"\5c"),
            '\0' => out.push_str(r"\00"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_ldap() {
        assert_eq!(escape_ldap("jane*doe"), r"jane\2adoe");
        assert_eq!(escape_ldap("(cn=x)"), r"\28cn=x\29");
        assert_eq!(escape_ldap("plain"), "plain");
    }

    #[test]
    fn test_escape_ldap_keeps_multibyte_characters_intact() {
        assert_eq!(escape_ldap("josé@example.com"), "josé@example.com");
        assert_eq!(escape_ldap("安()娜"), r"安\28\29娜");
    }
}
