//! Voice engine server entry point

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_engine_config::{load_settings, ProviderCredentials, Settings};
use voice_engine_persistence::{CallStore, InMemoryStore, ScyllaCallStore, ScyllaClient, ScyllaConfig};
use voice_engine_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_name = std::env::var("RUN_ENV").ok();
    let settings = load_settings(env_name.as_deref())?;

    init_tracing(&settings);
    tracing::info!("starting voice engine v{}", env!("CARGO_PKG_VERSION"));

    let credentials = ProviderCredentials::from_env();
    let store = build_store(&settings).await?;
    let state = AppState::new(settings.clone(), credentials, store);

    let app = create_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let registry = state.registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then end every live session before letting
/// the server stop accepting.
async fn shutdown_signal(registry: Arc<voice_engine_engine::SessionRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    registry.shutdown_all().await;
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "voice_engine={},tower_http=info",
            settings.observability.log_level
        )
        .into()
    });

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// ScyllaDB when nodes are configured, in-memory otherwise.
async fn build_store(
    settings: &Settings,
) -> Result<Arc<dyn CallStore>, Box<dyn std::error::Error>> {
    if settings.scylla.nodes.is_empty() {
        tracing::warn!("no scylla nodes configured; calls persist in memory only");
        return Ok(InMemoryStore::new());
    }

    let client = ScyllaClient::connect(ScyllaConfig {
        nodes: settings.scylla.nodes.clone(),
        keyspace: settings.scylla.keyspace.clone(),
        ..Default::default()
    })
    .await?;
    Ok(Arc::new(ScyllaCallStore::new(client)))
}
