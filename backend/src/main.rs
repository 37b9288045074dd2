use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bustrack_backend::{
    config::Config,
    repositories::{DriverRepository, InMemoryDriverRepository},
    routes::build_router,
    services::sweeper::spawn_session_sweeper,
    state::AppState,
    utils::time::{Clock, SystemClock},
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    format!("*** (len={})", s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bustrack_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        session_ttl_hours = config.session_ttl_hours,
        session_sliding_expiry = config.session_sliding_expiry,
        location_history_limit = config.location_history_limit,
        ws_client_buffer = config.ws_client_buffer,
        admin_api_token = %mask_secret(&config.admin_api_token),
        "Loaded configuration from environment/.env"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let drivers = match config.drivers_file.as_deref() {
        Some(path) => {
            let repo = InMemoryDriverRepository::from_seed_file(path, clock.now())?;
            tracing::info!(path = %path.display(), drivers = repo.len(), "Seeded driver directory");
            repo
        }
        None => {
            tracing::warn!("DRIVERS_FILE not set; driver directory starts empty");
            InMemoryDriverRepository::new()
        }
    };
    let drivers: Arc<dyn DriverRepository> = Arc::new(drivers);

    let (state, events) = AppState::new(config.clone(), drivers, clock.clone());
    let dispatcher = state.spawn_dispatcher(events);
    let sweeper = config.session_cleanup_interval().map(|period| {
        spawn_session_sweeper(
            state.sessions.store().clone(),
            clock.clone(),
            period,
            config.session_retention(),
        )
    });

    let gateway = state.gateway.clone();
    let app = build_router(state);

    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, closing observer connections");
            gateway.shutdown();
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    dispatcher.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
