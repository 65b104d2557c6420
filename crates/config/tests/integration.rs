//! Integration tests for config

#[cfg(test)]
mod tests {
    use batchwrite_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            ENV_TEMP_DIR,
            ENV_STAGING,
            ENV_SYNC,
            ENV_MAX_CONCURRENCY,
            ENV_HANDLE_SIGNALS,
        ] {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[staging]
location = "sibling"
prefix = ".stage-"

[durability]
sync_files = true

[concurrency]
max_concurrency = 16

[exit_hook]
handle_signals = false
        "#
        )
        .unwrap();

        let config = WriterConfig::load_from_file(temp_file.path())
            .await
            .unwrap();
        assert_eq!(config.staging.location, StagingLocation::Sibling);
        assert_eq!(config.staging.prefix, ".stage-");
        assert_eq!(config.staging.temp_location(), TempLocation::Sibling);
        assert!(config.durability.sync_files);
        assert!(!config.durability.sync_directories);
        assert_eq!(config.concurrency.max_concurrency, 16);
        assert!(!config.exit_hook.handle_signals);
    }

    #[tokio::test]
    async fn test_empty_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = WriterConfig::load_from_file(temp_file.path())
            .await
            .unwrap();
        assert_eq!(config, WriterConfig::default());
        assert_eq!(config.staging.temp_location(), TempLocation::System);
        assert_eq!(config.staging.prefix, DEFAULT_TEMP_PREFIX);
        assert!(config.exit_hook.handle_signals);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = WriterConfig::load_from_file(&dir.path().join("absent.toml")).await;
        assert!(matches!(
            result,
            Err(batchwrite_errors::Error::Config(
                batchwrite_errors::ConfigError::NotFound { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_invalid_toml_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[staging\nlocation = ").unwrap();
        let result = WriterConfig::load_from_file(temp_file.path()).await;
        assert!(matches!(
            result,
            Err(batchwrite_errors::Error::Config(
                batchwrite_errors::ConfigError::ParseError { .. }
            ))
        ));
    }

    #[test]
    fn test_temp_dir_overrides_location() {
        let mut config = WriterConfig::default();
        config.staging.location = StagingLocation::Sibling;
        config.staging.temp_dir = Some(PathBuf::from("/var/tmp/staging"));
        assert_eq!(
            config.staging.temp_location(),
            TempLocation::Directory(PathBuf::from("/var/tmp/staging"))
        );
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var(ENV_STAGING, "sibling");
        std::env::set_var(ENV_SYNC, "yes");
        std::env::set_var(ENV_MAX_CONCURRENCY, "8");
        std::env::set_var(ENV_HANDLE_SIGNALS, "0");

        let mut config = WriterConfig::default();
        config.merge_env().unwrap();

        assert_eq!(config.staging.location, StagingLocation::Sibling);
        assert!(config.durability.sync_files);
        assert_eq!(config.concurrency.max_concurrency, 8);
        assert!(!config.exit_hook.handle_signals);

        std::env::set_var(ENV_TEMP_DIR, "/var/tmp/bw");
        config.merge_env().unwrap();
        assert_eq!(
            config.staging.temp_location(),
            TempLocation::Directory(PathBuf::from("/var/tmp/bw"))
        );

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var(ENV_STAGING, "elsewhere");
        let mut config = WriterConfig::default();
        assert!(config.merge_env().is_err());
        clear_env();

        std::env::set_var(ENV_SYNC, "maybe");
        assert!(config.merge_env().is_err());
        clear_env();

        std::env::set_var(ENV_MAX_CONCURRENCY, "-1");
        assert!(config.merge_env().is_err());
        clear_env();
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = WriterConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("prefix"));
        let parsed: WriterConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
