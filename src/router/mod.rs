//! HTTP surface, thin adapters over the user lifecycle engine.

pub mod activate;
pub mod login;
pub mod register;
pub mod status;
pub mod users;

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;

/// JSON extractor running shape validation before the handler sees the
/// body. Rejections surface through [`ServerError`].
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Build an [`AppState`](crate::AppState) over in-memory collaborators.
#[cfg(test)]
pub fn state() -> crate::AppState {
    use std::sync::Arc;

    use crate::config::Configuration;
    use crate::identity::memory::MemoryGateway;
    use crate::store::memory::MemoryStore;
    use crate::token::TokenManager;
    use crate::user::UserService;

    let token = TokenManager::new("pool-local-1", "client-1", "top-secret");
    let users = UserService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryGateway::new(token.clone())),
    );

    crate::AppState {
        config: Arc::new(Configuration {
            dev_mode: true,
            ..Default::default()
        }),
        users,
        token,
        mail: crate::mail::MailManager::default(),
    }
}
