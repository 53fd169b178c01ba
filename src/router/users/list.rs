//! Directory-wide account listing.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::identity::IdentityAccount;

/// Directory entry as exposed over HTTP.
#[derive(Debug, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<IdentityAccount> for DirectoryEntry {
    fn from(account: IdentityAccount) -> Self {
        Self {
            email: account.attribute("email").map(str::to_owned),
            name: account.attribute("name").map(str::to_owned),
            id: account.id,
        }
    }
}

pub async fn handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<DirectoryEntry>>> {
    let accounts = state.users.list().await?;
    Ok(Json(accounts.into_iter().map(DirectoryEntry::from).collect()))
}
