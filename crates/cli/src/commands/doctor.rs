use crate::commands::{load_config, CommandResult};
use portgate_db::connect_with_settings;

pub fn run(database_url: Option<&str>) -> CommandResult {
    let config = match load_config(database_url) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "doctor",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "doctor",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        pool.acquire().await.map_err(|error| ("db_query", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success(
            "doctor",
            format!(
                "configuration valid; database reachable at {}; auto-expire overdue requests: {}",
                config.database.url, config.workflow.auto_expire_overdue_requests
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("doctor", error_class, message, exit_code)
        }
    }
}
