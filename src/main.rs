use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use hr_orchestrator::backends::Backends;
use hr_orchestrator::config::AppConfig;
use hr_orchestrator::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("HR Orchestrator v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Table: {} ({})", config.table_name, config.region);
    eprintln!("   Offboarding: {:?}", config.offboard_policy);

    let backends = Backends::connect(&config).await;
    let (mode, orchestrator) = backends.into_orchestrator(&config);
    eprintln!("   Mode: {:?}", mode);

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        mode,
    };
    let app = routes::app(state, &config.cors_allowed_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "HR orchestrator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };

    info!("Shutdown signal received");
}
