use anyhow::Result;
use portgate_core::config::{AppConfig, LoadOptions};
use portgate_server::{bootstrap, health, verify};

fn init_logging(config: &AppConfig) {
    use portgate_core::config::LogFormat::{Compact, Json, Pretty};
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    if app.config.workflow.auto_expire_overdue_requests {
        let services = app.services.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                ticker.tick().await;
                match services.expire_overdue_requests(chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(expired) => tracing::info!(
                        event_name = "sweep.requests_expired",
                        expired,
                        "overdue requests expired"
                    ),
                    Err(error) => tracing::warn!(
                        event_name = "sweep.failed",
                        error = %error,
                        "overdue request sweep failed"
                    ),
                }
            }
        });
    }

    let router = verify::router(app.services.clone()).merge(health::router(app.db_pool.clone()));
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "portgate-server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!(event_name = "system.server.stopping", "portgate-server shutting down");
    Ok(())
}
