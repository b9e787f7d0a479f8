use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use portgate_core::config::AppConfig;
use portgate_core::documents::InMemoryDocumentStore;
use portgate_core::notify::NoopNotificationClient;
use portgate_db::{connect_with_settings, migrations, DbPool};

use crate::commands::AppServices;

pub struct App {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: AppServices,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<App> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await?;
    migrations::run_pending(&db_pool).await?;

    let services = AppServices::sql(
        db_pool.clone(),
        config.workflow.clone(),
        Arc::new(NoopNotificationClient),
        Arc::new(InMemoryDocumentStore::default()),
    );

    info!(
        event_name = "system.bootstrap.complete",
        database_url = config.database.url.as_str(),
        auto_expire = config.workflow.auto_expire_overdue_requests,
        "portgate runtime initialized"
    );

    Ok(App { config, db_pool, services })
}

#[cfg(test)]
mod tests {
    use portgate_core::config::{
        AppConfig, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig, WorkflowConfig,
    };

    use super::bootstrap_with_config;

    #[tokio::test]
    async fn bootstrap_runs_migrations_against_the_configured_database() {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_owned(),
                max_connections: 1,
                timeout_secs: 5,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_owned(), port: 0 },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
            workflow: WorkflowConfig {
                auto_expire_overdue_requests: false,
                verification_base_url: "http://127.0.0.1:8080".to_owned(),
            },
        };

        let app = bootstrap_with_config(config).await.expect("bootstrap");
        let table_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'access_request'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("query");
        assert_eq!(table_count, 1);
    }
}
