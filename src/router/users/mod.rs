//! Users-related HTTP API.
mod badges;
mod data;
mod delete;
mod get;
mod list;
mod status;

use axum::extract::{Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Router, middleware};

use crate::token::Claims;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";
const ME_ROUTE: &str = "@me";

/// Custom middleware for authentification.
///
/// Verifies the bearer token and stashes its claims for handlers that
/// resolve the `@me` alias.
async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .ok_or(ServerError::Unauthorized)?;

    let claims = state.users.verify(token).await?;
    req.extensions_mut().insert::<Claims>(claims);

    Ok(next.run(req).await)
}

/// Resolve the `@me` alias to the verified subject id.
fn resolve(user_id: String, claims: &Claims) -> String {
    if user_id == ME_ROUTE {
        claims.sub.clone()
    } else {
        user_id
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET /users` enumerates the identity directory.
        .route("/", get(list::handler))
        // `GET /users/:ID` goes to `get`. `@me` resolves to the caller.
        .route(
            "/{user_id}",
            get(get::handler).delete(delete::handler),
        )
        // Secondary lookups.
        .route("/by-handle/{handle}", get(get::by_handle))
        .route("/by-email/{email}", get(get::by_email))
        .route("/by-name/{name}", get(get::by_name))
        // `PATCH /users/:ID/status/:STATUS` goes to `status`.
        .route("/{user_id}/status/{status}", patch(status::handler))
        // `POST|DELETE /users/:ID/badges/:NAME` go to `badges`.
        .route(
            "/{user_id}/badges/{name}",
            post(badges::issue).delete(badges::revoke),
        )
        // `PATCH /users/:ID/data` goes to `data`.
        .route("/{user_id}/data", patch(data::handler))
        .route_layer(middleware::from_fn_with_state(state, auth))
}
