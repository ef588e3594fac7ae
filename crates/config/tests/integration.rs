//! Integration tests for config

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;
    use upd_config::Config;
    use upd_types::Phase;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[scheduler]
max_concurrency = 3

[resources]
acquire_timeout_ms = 30000

[process]
grace_period_ms = 2000
plugin_dir = "/usr/local/lib/upd"

[[plugin]]
name = "apt"
phases = ["check", "download", "execute"]
requires_sudo = true

[plugin.resources]
download = ["apt-lists"]
execute = ["dpkg-lock", "apt-lists"]
        "#
        )
        .unwrap();

        let config = Config::load_or_default(Some(temp_file.path()))
            .await
            .unwrap();
        assert_eq!(config.scheduler.max_concurrency, 3);
        assert_eq!(config.resources.acquire_timeout_ms, 30_000);
        assert_eq!(config.process.grace_period_ms, 2_000);
        assert_eq!(
            config.process.plugin_dir.as_deref(),
            Some("/usr/local/lib/upd")
        );

        let descriptors = config.plugin_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].requires_sudo);
        assert_eq!(descriptors[0].resources_for(Phase::Execute).len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Some(std::path::Path::new(
            "/nonexistent/upd-config.toml",
        )))
        .await
        .unwrap();
        assert_eq!(config.streaming.channel_capacity, 256);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("UPD_MAX_CONCURRENCY");
        std::env::remove_var("UPD_GRACE_PERIOD_MS");

        std::env::set_var("UPD_MAX_CONCURRENCY", "6");
        std::env::set_var("UPD_GRACE_PERIOD_MS", "1500");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.scheduler.max_concurrency, 6);
        assert_eq!(config.process.grace_period_ms, 1_500);

        std::env::remove_var("UPD_MAX_CONCURRENCY");
        std::env::remove_var("UPD_GRACE_PERIOD_MS");
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("UPD_MAX_CONCURRENCY");
        std::env::set_var("UPD_MAX_CONCURRENCY", "not-a-number");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        std::env::remove_var("UPD_MAX_CONCURRENCY");
    }
}
