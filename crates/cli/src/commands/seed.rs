use crate::commands::{load_config, CommandResult};
use portgate_db::{connect_with_settings, fixtures, migrations};

pub fn run(database_url: Option<&str>) -> CommandResult {
    let config = match load_config(database_url) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
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
                "seed",
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
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let report =
            fixtures::seed(&pool).await.map_err(|error| ("seed", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(report)
    });

    match result {
        Ok(report) => CommandResult::success(
            "seed",
            format!(
                "seeded {} requests, {} authorizations, {} events",
                report.requests, report.authorizations, report.events
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn seed_succeeds_against_an_in_memory_database() {
        let result = run(Some("sqlite::memory:"));
        assert_eq!(result.exit_code, 0, "output: {}", result.output);
        assert!(result.output.contains("seeded 2 requests"));
    }
}
