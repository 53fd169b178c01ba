use axum::routing::get;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use portico::telemetry;

const OTEL_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "portico=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer());

    // Ship traces and logs over OTLP when an endpoint is configured.
    if let Ok(endpoint) = std::env::var(OTEL_ENDPOINT_VAR) {
        let tracer_provider = telemetry::setup_tracer()?;
        opentelemetry::global::set_tracer_provider(tracer_provider);
        registry.with(telemetry::setup_logging(&endpoint)?).init();
    } else {
        registry.init();
    }

    let state = portico::initialize_state().await?;

    let metrics_handle = telemetry::setup_metrics_recorder()?;
    let app = portico::app(state).route(
        "/metrics",
        get(move || std::future::ready(metrics_handle.render())),
    );

    let port =
        std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        )
        .expect("failed to install signal handler")
        .recv()
        .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
