//! Login and token verification endpoints.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::identity::Tokens;
use crate::router::Valid;
use crate::token::Claims;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password must not be empty."))]
    pub password: String,
}

/// Handler to log a user in against the identity directory.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Tokens>> {
    let tokens = state.users.login(&body.email, &body.password).await?;
    Ok(Json(tokens))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyBody {
    #[validate(length(min = 1, message = "Token must not be empty."))]
    pub token: String,
}

/// Handler to check an access token and return its claims.
pub async fn verify(
    State(state): State<AppState>,
    Valid(body): Valid<VerifyBody>,
) -> Result<Json<Claims>> {
    let claims = state.users.verify(&body.token).await?;
    Ok(Json(claims))
}
