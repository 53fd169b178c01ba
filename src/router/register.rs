//! Registration endpoint.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::mail::Template::Activation;
use crate::router::Valid;
use crate::user::{RegisterInput, UserView};

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(length(
        min = 2,
        max = 64,
        message = "Name must contain between 2 and 64 characters."
    ))]
    pub name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 64,
        message = "Password must contain at least 6 characters."
    ))]
    pub password: String,
    pub repeat_password: String,
    #[validate(length(max = 64))]
    pub source_system: Option<String>,
}

/// Handler to register a new user.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<UserView>)> {
    let source_ip = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned());

    let user = state
        .users
        .register(RegisterInput {
            name: body.name,
            email: body.email,
            password: body.password,
            repeat_password: body.repeat_password,
            source_ip,
            source_system: body.source_system,
        })
        .await?;

    if let Err(err) = state.mail.publish_event(Activation, &user).await {
        tracing::error!(
            user_id = user.id,
            error = %err,
            "activation mail not published"
        );
    }

    Ok((StatusCode::CREATED, Json(UserView::new(user, &state.config))))
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;

    pub(in crate::router) fn req_body() -> Body {
        Body {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            password: "P$soW%920$n&".into(),
            repeat_password: "P$soW%920$n&".into(),
            source_system: Some("webshop".into()),
        }
    }

    #[tokio::test]
    async fn test_register_handler() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            None,
            app,
            Method::POST,
            "/register",
            json!(req_body()).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["name"], "jane doe");
        assert_eq!(body["handle"], "@JaneDoe");
        assert_eq!(body["status"], "UNCONFIRMED");
        assert_eq!(body["profile"]["badges"][0]["name"], "NEW_MEMBER");
        // dev mode surfaces the activation code for automated flows.
        assert!(body["$devTest"]["activationCode"].is_string());
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_passwords() {
        let state = router::state();
        let app = app(state.clone());

        let mut req_body = req_body();
        req_body.repeat_password = "different".into();
        let response = make_request(
            None,
            app,
            Method::POST,
            "/register",
            json!(req_body).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_email() {
        let state = router::state();
        let app = app(state.clone());

        let mut req_body = req_body();
        req_body.email = "not-an-email".into();
        let response = make_request(
            None,
            app,
            Method::POST,
            "/register",
            json!(req_body).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let state = router::state();
        let app = app(state.clone());

        let body = json!(req_body()).to_string();
        let response =
            make_request(None, app.clone(), Method::POST, "/register", body.clone())
                .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response =
            make_request(None, app, Method::POST, "/register", body).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
