use config::ConfigError as ConfigLibError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Config library error: {0}")]
    ConfigLibError(#[from] ConfigLibError),
}

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Candidate list, one `ip,port,country,org` per line
    #[serde(default = "default_input_path")]
    pub input_path: String,
    /// Alive records are written here
    #[serde(default = "default_output_path")]
    pub output_path: String,
    /// Maximum number of candidates evaluated at once
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-operation network timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Upper bound on a single response
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Reference endpoint
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Log configuration
    #[serde(default)]
    pub log: LoggerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_host")]
    pub host: String,
    #[serde(default = "default_resolver_path")]
    pub path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggerConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path
    #[serde(default = "default_log_path")]
    pub path: String,
    /// Log file archive pattern
    #[serde(default = "default_archive_pattern")]
    pub archive_pattern: String,
    /// Number of log files to keep
    #[serde(default = "default_file_count")]
    pub file_count: u32,
    /// Size of each log file (MB)
    #[serde(default = "default_file_size")]
    pub file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_path: default_output_path(),
            workers: default_workers(),
            connect_timeout: default_connect_timeout(),
            max_response_bytes: default_max_response_bytes(),
            resolver: ResolverConfig::default(),
            log: LoggerConfig::default(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            host: default_resolver_host(),
            path: default_resolver_path(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            path: default_log_path(),
            archive_pattern: default_archive_pattern(),
            file_count: default_file_count(),
            file_size: default_file_size(),
        }
    }
}

fn default_input_path() -> String {
    "Data/RawProxyISP.txt".to_string()
}

fn default_output_path() -> String {
    "Data/alive.txt".to_string()
}

fn default_workers() -> usize {
    40
}

fn default_connect_timeout() -> u64 {
    15
}

/// 1 MiB; the reference endpoint answers with well under a kilobyte
fn default_max_response_bytes() -> usize {
    1024 * 1024
}

fn default_resolver_host() -> String {
    "speed.cloudflare.com".to_string()
}

fn default_resolver_path() -> String {
    "/meta".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/42.0.2311.135 Safari/537.36 Edge/12.10240"
        .to_string()
}

/// Default log level
fn default_log_level() -> String {
    "Info".to_string()
}

/// Default log path
fn default_log_path() -> String {
    "logs/proxy-checker.log".to_string()
}

/// Default archive pattern
fn default_archive_pattern() -> String {
    "logs/archive/proxy-checker-{}.log".to_string()
}

/// Default file count
fn default_file_count() -> u32 {
    5
}

/// Default file size in MB
fn default_file_size() -> u64 {
    10
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()
            .map_err(ConfigError::ConfigLibError)?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Validate if configuration is valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_path.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Input path cannot be empty".to_string(),
            ));
        }

        if self.output_path.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Output path cannot be empty".to_string(),
            ));
        }

        if self.workers == 0 || self.workers > 1024 {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid worker count: {}. Must be between 1 and 1024",
                self.workers
            )));
        }

        if self.connect_timeout == 0 {
            return Err(ConfigError::InvalidConfig(
                "Connect timeout must be at least one second".to_string(),
            ));
        }

        if self.max_response_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "Response size cap cannot be zero".to_string(),
            ));
        }

        if self.resolver.host.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Resolver host cannot be empty".to_string(),
            ));
        }

        if !self.resolver.path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid resolver path: {}. Must start with '/'",
                self.resolver.path
            )));
        }

        Ok(())
    }
}
