//! Portico is a lightweight user account backend backed by an identity
//! directory and a PostgreSQL record store.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
pub mod error;
mod identity;
mod mail;
mod router;
mod store;
pub mod telemetry;
mod token;
mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<String>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let authorization = match token {
        Some(token) => format!("Bearer {token}"),
        None => String::default(),
    };

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, authorization)
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: user::UserService,
    pub token: token::TokenManager,
    pub mail: mail::MailManager,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true). level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new(). include_headers(true). latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `POST /register` goes to `register`.
        .route("/register", post(router::register::handler))
        // `POST /login` goes to `login`.
        .route("/login", post(router::login::handler))
        // `POST /auth/verify` goes to `verify`.
        .route("/auth/verify", post(router::login::verify))
        // `GET /activate/{code}` goes to `activate`.
        .route("/activate/{code}", get(router::activate::handler))
        .nest("/users", router::users::router(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_default();
    let config = config::Configuration::default()
        .path(config_path.into())
        .read()?;

    let store = match config.postgres {
        Some(ref config) => {
            store::PgUserStore::connect(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(store::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(store::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(store::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(store::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // the identity directory holds credentials and mints subject ids.
    let Some(identity_config) = &config.identity else {
        tracing::error!("missing `identity` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let token = token::TokenManager::new(
        &identity_config.pool_id,
        &identity_config.client_id,
        &identity_config.client_secret,
    );

    let identity: Arc<dyn identity::IdentityGateway> =
        match &identity_config.ldap {
            Some(cfg) => Arc::new(
                identity::ldap::LdapGateway::connect(cfg, token.clone())
                    .await?,
            ),
            None => {
                tracing::error!(
                    "missing `identity.ldap` entry on `config.yaml` file"
                );
                std::process::exit(0);
            },
        };

    // handle mail sender.
    let mail = if let Some(cfg) = &config.mail {
        mail::MailManager::new(cfg).await?
    } else {
        mail::MailManager::default()
    };

    let users = user::UserService::new(Arc::new(store), identity);

    Ok(AppState {
        config,
        users,
        token,
        mail,
    })
}
