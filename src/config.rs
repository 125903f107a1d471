//! Configuration management for the parallel downloader
//!
//! Settings come from a TOML file with `[downloader]`, `[client]` and
//! `[logging]` sections. Every key is optional; missing keys keep their
//! defaults, and command line flags override whatever the file sets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ChunkPolicy, ClientConfig, DownloaderConfig};
use crate::constants::{download, files, http, limits, logging};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download job settings
    pub downloader: DownloaderConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Chunk policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Fixed request size
    #[default]
    Fixed,
    /// Chunk size grows after every batch
    Incremental,
}

/// TOML-friendly downloader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfigToml {
    /// Maximum concurrent range fetches
    pub parallelism: usize,
    /// Chunk policy
    pub policy: PolicyKind,
    /// Range size under the fixed policy
    pub request_size: u64,
    /// First chunk size under the incremental policy
    pub initial_chunk_size: u64,
    /// Chunk size multiplier under the incremental policy
    pub growth_factor: u64,
    /// Largest chunk the incremental policy grows to
    pub max_chunk_size: u64,
    /// Fail when no checksum is published
    pub require_checksum: bool,
    /// Read buffer of the checksum pass
    pub verify_buffer_size: usize,
}

impl Default for DownloaderConfigToml {
    fn default() -> Self {
        Self {
            parallelism: download::DEFAULT_PARALLELISM,
            policy: PolicyKind::Fixed,
            request_size: download::DEFAULT_REQUEST_SIZE,
            initial_chunk_size: download::DEFAULT_INITIAL_CHUNK_SIZE,
            growth_factor: download::DEFAULT_GROWTH_FACTOR,
            max_chunk_size: download::DEFAULT_REQUEST_SIZE,
            require_checksum: false,
            verify_buffer_size: download::VERIFY_BUFFER_SIZE,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive interval (unset = disabled)
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout (unset = no timeout)
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Timeout of one request including its body
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for transient failures
    pub max_retries: u32,
    /// Base backoff delay
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// Backoff cap
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_secs(limits::MAX_BACKOFF_SECS),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (DownloaderConfig, ClientConfig) {
        (
            self.downloader.to_runtime_config(),
            self.client.to_runtime_config(),
        )
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, or the first one found)
    ///
    /// CLI arguments are applied on top by the caller.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write a commented default configuration file
    ///
    /// Targets `path`, or the per-user config file when `None`. An existing
    /// file is only replaced when `force` is set.
    pub async fn initialize(path: Option<PathBuf>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(ConfigError::invalid(
                "config",
                config_path.display(),
                "File already exists, use --force to overwrite",
            ));
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Serialize the effective configuration
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid("config", "<effective>", e.to_string()))
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(files::LOCAL_CONFIG_FILE)];
        if let Ok(user_path) = Self::get_default_config_path() {
            search_paths.push(user_path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::invalid(
                "config_dir",
                "<none>",
                "Could not determine user config directory",
            )
        })?;

        Ok(config_dir
            .join(files::CONFIG_DIR_NAME)
            .join(files::CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let defaults = DownloaderConfigToml::default();
        format!(
            r#"# Parallel Download Configuration
# Every key is optional; command line flags take precedence.

[downloader]
# Maximum number of concurrent range requests
parallelism = {parallelism}

# Chunk policy: "fixed" or "incremental"
policy = "fixed"

# Range size in bytes under the fixed policy
request_size = {request_size}

# Incremental policy: first chunk, growth per batch and cap (bytes)
initial_chunk_size = {initial}
growth_factor = {growth}
max_chunk_size = {max_chunk}

# Fail objects without a published CRC32C instead of skipping verification
require_checksum = false

# Read buffer for the checksum pass (bytes)
verify_buffer_size = {buffer}

[client]
# HTTP client settings
tcp_keepalive = "30s"
tcp_nodelay = true
pool_idle_timeout = "{pool_idle}"
pool_max_per_host = {pool_max}
request_timeout = "{request_timeout}"
connect_timeout = "{connect_timeout}"
rate_limit_rps = {rps}
max_retries = {retries}
retry_base_delay = "{base_delay}ms"
retry_max_delay = "{max_delay}s"

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            parallelism = defaults.parallelism,
            request_size = defaults.request_size,
            initial = defaults.initial_chunk_size,
            growth = defaults.growth_factor,
            max_chunk = defaults.max_chunk_size,
            buffer = defaults.verify_buffer_size,
            pool_idle = humantime_serde::re::humantime::format_duration(http::POOL_IDLE_TIMEOUT),
            pool_max = http::POOL_MAX_PER_HOST,
            request_timeout = humantime_serde::re::humantime::format_duration(http::DEFAULT_TIMEOUT),
            connect_timeout = humantime_serde::re::humantime::format_duration(http::CONNECT_TIMEOUT),
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            retries = limits::MAX_RETRIES,
            base_delay = limits::RETRY_BASE_DELAY_MS,
            max_delay = limits::MAX_BACKOFF_SECS,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl DownloaderConfigToml {
    /// Chunk policy described by these settings
    pub fn chunk_policy(&self) -> ChunkPolicy {
        match self.policy {
            PolicyKind::Fixed => ChunkPolicy::Fixed {
                request_size: self.request_size,
            },
            PolicyKind::Incremental => ChunkPolicy::Incremental {
                initial_chunk_size: self.initial_chunk_size,
                growth_factor: self.growth_factor,
                max_chunk_size: self.max_chunk_size,
            },
        }
    }

    /// Convert to runtime DownloaderConfig
    pub fn to_runtime_config(&self) -> DownloaderConfig {
        DownloaderConfig {
            parallelism: self.parallelism,
            policy: self.chunk_policy(),
            verify_buffer_size: self.verify_buffer_size,
            require_checksum: self.require_checksum,
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive,
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            retry_max_delay: self.retry_max_delay,
        }
    }
}
