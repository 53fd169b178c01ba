//! Unstructured user data endpoint.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::AppState;
use crate::error::Result;
use crate::token::Claims;
use crate::user::DataMode;

#[derive(Debug, Default, Deserialize)]
pub struct Params {
    /// MERGE (default) folds the patch into stored data; OVERWRITE
    /// replaces the whole mapping.
    #[serde(default)]
    pub mode: DataMode,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Query(params): Query<Params>,
    Json(patch): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<()> {
    let user_id = super::resolve(user_id, &claims);
    state.users.update_data(&user_id, patch, params.mode).await
}

#[cfg(test)]
mod tests {
    use crate::*;
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::tests::authenticated_user;

    #[tokio::test]
    async fn test_data_merge_and_overwrite_handlers() {
        let state = router::state();
        let app = app(state.clone());
        let (user, token) = authenticated_user(&state).await;

        let path = format!("/users/{}/data", user.id);
        let response = make_request(
            Some(token.clone()),
            app.clone(),
            Method::PATCH,
            &path,
            json!({ "newsletter": true }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Default mode is MERGE: previous keys survive.
        let response = make_request(
            Some(token.clone()),
            app.clone(),
            Method::PATCH,
            &format!("{path}?mode=MERGE"),
            json!({ "theme": "dark" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = state.users.get_by_id(&user.id).await.unwrap();
        assert_eq!(stored.data["newsletter"], true);
        assert_eq!(stored.data["theme"], "dark");

        let response = make_request(
            Some(token.clone()),
            app.clone(),
            Method::PATCH,
            &format!("{path}?mode=OVERWRITE"),
            json!({ "theme": "light" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = state.users.get_by_id(&user.id).await.unwrap();
        assert!(stored.data.get("newsletter").is_none());
        assert_eq!(stored.data["theme"], "light");

        // Unknown modes are rejected at the query boundary.
        let response = make_request(
            Some(token),
            app,
            Method::PATCH,
            &format!("{path}?mode=APPEND"),
            json!({ "theme": "dark" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
