use embedserve::config::{Config, LogFormat};
use embedserve::inference::OnnxLoader;
use embedserve::transport::{resolve_transport, serve};
use embedserve::{build_router, AppState};

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        model = %config.model_id,
        mode = ?config.mode,
        "Starting embedserve"
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    if config.api_key.is_none() {
        tracing::warn!("API_KEY is not set; authenticated endpoints will return 500");
    }

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    let transport = resolve_transport(config.use_https, &config.ssl_cert_path, &config.ssl_key_path);
    for diagnostic in &transport.diagnostics {
        tracing::warn!(%diagnostic, "Transport fallback");
    }

    let loader = Arc::new(OnnxLoader::from_config(&config));
    tracing::info!(pool_size = loader.pool_size(), "Session pool configured");
    let state = Arc::new(AppState::new(config, loader));

    // Load and warm the model before accepting traffic; failure exits non-zero
    let start = std::time::Instant::now();
    state.lifecycle.ensure_ready().await?;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "State initialized",
    );

    let app = build_router(state).route(
        "/metrics",
        get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    tokio::select! {
        result = serve(addr, app, transport.mode) => result?,
        _ = shutdown_signal() => {
            // In-flight requests are not drained
            tracing::info!("Shutdown complete");
            std::process::exit(0);
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "embedserve=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, exiting");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, exiting");
        }
    }
}
