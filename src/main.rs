//! EMGurus review service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emgurus::{
    api::{self, AppState},
    config::Config,
    db::{self, repositories::SqlxUserRepository},
    services::{LogSender, NotificationDispatcher, NotificationSender, SmtpSender},
};

/// Expired-session sweep period
const SESSION_SWEEP_SECS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emgurus=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EMGurus review service...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    if config.auth.provider_secret.is_none() {
        tracing::warn!("auth.provider_secret is not set; sign-in is disabled");
    }

    // Notification worker
    let sender: Arc<dyn NotificationSender> = match &config.notification.smtp {
        Some(smtp) => {
            tracing::info!("Sending notifications via SMTP {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpSender::from_config(smtp)?)
        }
        None => {
            tracing::info!("SMTP not configured; notifications will be logged");
            Arc::new(LogSender)
        }
    };
    let (dispatcher, _worker) = NotificationDispatcher::spawn(
        config.notification.queue_capacity,
        SqlxUserRepository::boxed(pool.clone()),
        sender,
    );

    let state = AppState::new(pool, &config, dispatcher);

    // Expired session sweeper
    {
        let sessions = state.session_service.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(SESSION_SWEEP_SECS));
            loop {
                interval.tick().await;
                match sessions.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!("Removed {} expired sessions", n),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    let app = api::build_router(state, &config.server.cors_origin)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
