//! Badge issuance and revocation endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::token::Claims;

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    /// Badge set after the mutation.
    pub badges: Vec<String>,
}

pub async fn issue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((user_id, name)): Path<(String, String)>,
) -> Result<Json<Response>> {
    let user_id = super::resolve(user_id, &claims);
    let badges = state.users.issue_badge(&user_id, &name).await?;
    Ok(Json(Response { badges }))
}

pub async fn revoke(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((user_id, name)): Path<(String, String)>,
) -> Result<Json<Response>> {
    let user_id = super::resolve(user_id, &claims);
    let badges = state.users.revoke_badge(&user_id, &name).await?;
    Ok(Json(Response { badges }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    use super::super::tests::authenticated_user;

    #[tokio::test]
    async fn test_badge_lifecycle_handlers() {
        let state = router::state();
        let app = app(state.clone());
        let (user, token) = authenticated_user(&state).await;

        let path = format!("/users/{}/badges/RISING_STAR", user.id);
        let response = make_request(
            Some(token.clone()),
            app.clone(),
            Method::POST,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.badges, vec!["NEW_MEMBER", "RISING_STAR"]);

        // A held badge cannot be issued twice.
        let response = make_request(
            Some(token.clone()),
            app.clone(),
            Method::POST,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = make_request(
            Some(token.clone()),
            app.clone(),
            Method::DELETE,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.badges, vec!["NEW_MEMBER"]);

        // Revoking an absent badge is an error, not a no-op.
        let response = make_request(
            Some(token),
            app,
            Method::DELETE,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
