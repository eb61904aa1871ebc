use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use barbershop_turnos::config::AppConfig;
use barbershop_turnos::db;
use barbershop_turnos::handlers;
use barbershop_turnos::services::notifications::http::HttpNotifier;
use barbershop_turnos::services::notifications::log::LogNotifier;
use barbershop_turnos::services::notifications::{NotificationDispatcher, Notifier};
use barbershop_turnos::services::sweeper;
use barbershop_turnos::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Arc<dyn Notifier> = match &config.notification_url {
        Some(url) => {
            tracing::info!("publishing notifications to {url}");
            Arc::new(HttpNotifier::new(url.clone(), config.users_service_url.clone()))
        }
        None => {
            tracing::info!("NOTIFICATION_URL not set, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let notifications = NotificationDispatcher::spawn(notifier, config.notification_queue_capacity);

    let state = Arc::new(AppState::new(conn, config.clone(), notifications));

    tokio::spawn(sweeper::run_sweeper(state.clone()));

    let app = handlers::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
