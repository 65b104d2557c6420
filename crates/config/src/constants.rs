//! Fixed names and environment variables used by the configuration layer

/// File name prefix of staged temp files
pub const DEFAULT_TEMP_PREFIX: &str = ".batchwrite-";

pub const CONFIG_DIR_NAME: &str = "batchwrite";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const ENV_TEMP_DIR: &str = "BATCHWRITE_TEMP_DIR";
pub const ENV_STAGING: &str = "BATCHWRITE_STAGING";
pub const ENV_SYNC: &str = "BATCHWRITE_SYNC";
pub const ENV_MAX_CONCURRENCY: &str = "BATCHWRITE_MAX_CONCURRENCY";
pub const ENV_HANDLE_SIGNALS: &str = "BATCHWRITE_HANDLE_SIGNALS";
