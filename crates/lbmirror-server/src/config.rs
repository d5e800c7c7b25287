//! Configuration management for lbmirror
//!
//! Sources, lowest precedence first: built-in defaults, the optional config
//! file, `LBMIRROR_*` environment variables (`__` separates sections, e.g.
//! `LBMIRROR_REGISTRY__ENDPOINT`), and command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use lbmirror_consul_client::{ConsulClientConfig, RetryPolicy};
use lbmirror_core::{DEFAULT_NAMESPACE, ReconcilerConfig};

use crate::startup::{LogRotation, LoggingConfig};
use crate::watch::WatchConfig;

pub const WATCH_RESYNC_SECONDS: &str = "watch.resync_seconds";
pub const WATCH_NAMESPACE: &str = "watch.namespace";
pub const WATCH_LABEL_SELECTOR: &str = "watch.label_selector";
pub const KUBE_KUBECONFIG: &str = "kube.kubeconfig";
pub const REGISTRY_ENDPOINT: &str = "registry.endpoint";
pub const REGISTRY_TOKEN: &str = "registry.token";
pub const REGISTRY_MAX_ATTEMPTS: &str = "registry.max_attempts";
pub const REGISTRY_ATTEMPT_WAIT_SECONDS: &str = "registry.attempt_wait_seconds";
pub const REGISTRY_CONNECT_TIMEOUT_MS: &str = "registry.connect_timeout_ms";
pub const REGISTRY_REQUEST_TIMEOUT_MS: &str = "registry.request_timeout_ms";
pub const RECONCILER_DEFAULT_NAMESPACE: &str = "reconciler.default_namespace";
pub const RECONCILER_PRUNE_INAPPLICABLE: &str = "reconciler.prune_inapplicable";
pub const DISPATCH_WORKERS: &str = "dispatch.workers";
pub const DISPATCH_QUEUE_CAPACITY: &str = "dispatch.queue_capacity";
pub const LOGGING_LEVEL: &str = "logging.level";
pub const LOGGING_DIR: &str = "logging.dir";
pub const LOGGING_ROTATION: &str = "logging.rotation";

pub const DEFAULT_CONFIG_FILE: &str = "conf/lbmirror.yml";
pub const ENV_PREFIX: &str = "LBMIRROR";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "lbmirror", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON); missing file is not an error
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Seconds between full-state resyncs
    #[arg(long = "poll-seconds")]
    pub poll_seconds: Option<u64>,

    /// Consul agent endpoint (host:port)
    #[arg(long = "consul-endpoint")]
    pub consul_endpoint: Option<String>,

    /// Consul ACL token
    #[arg(long = "consul-token", env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    /// Attempts per registry call before giving up
    #[arg(long = "max-attempts")]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between registry call attempts
    #[arg(long = "attempt-wait-seconds")]
    pub attempt_wait_seconds: Option<u64>,

    /// Path to a kubeconfig file (default: in-cluster, then ~/.kube/config)
    #[arg(long = "kubeconfig")]
    pub kubeconfig: Option<PathBuf>,

    /// Only watch services in this namespace
    #[arg(long = "namespace")]
    pub namespace: Option<String>,

    /// Only watch services matching this label selector
    #[arg(long = "label-selector")]
    pub label_selector: Option<String>,

    /// Registry dispatch workers (0 = register inline)
    #[arg(long = "workers")]
    pub workers: Option<u32>,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Application configuration loaded from defaults, file, environment and CLI
#[derive(Clone, Debug)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration using the process arguments.
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> Result<Self, ConfigurationError> {
        Self::load(args, None)
    }

    /// `env` replaces the process environment when given.
    fn load(
        args: Cli,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let config = Config::builder()
            .set_default(WATCH_RESYNC_SECONDS, 10)?
            .set_default(REGISTRY_ENDPOINT, lbmirror_consul_client::constants::DEFAULT_ENDPOINT)?
            .set_default(
                REGISTRY_MAX_ATTEMPTS,
                i64::from(lbmirror_consul_client::constants::DEFAULT_MAX_ATTEMPTS),
            )?
            .set_default(
                REGISTRY_ATTEMPT_WAIT_SECONDS,
                lbmirror_consul_client::constants::DEFAULT_ATTEMPT_WAIT_SECONDS as i64,
            )?
            .set_default(REGISTRY_CONNECT_TIMEOUT_MS, 5000)?
            .set_default(REGISTRY_REQUEST_TIMEOUT_MS, 30000)?
            .set_default(RECONCILER_DEFAULT_NAMESPACE, DEFAULT_NAMESPACE)?
            .set_default(RECONCILER_PRUNE_INAPPLICABLE, false)?
            .set_default(DISPATCH_WORKERS, 4)?
            .set_default(DISPATCH_QUEUE_CAPACITY, 1024)?
            .set_default(LOGGING_LEVEL, "info")?
            .set_default(LOGGING_ROTATION, "daily")?
            .add_source(File::from(args.config_file.clone()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .set_override_option(WATCH_RESYNC_SECONDS, args.poll_seconds.map(|v| v as i64))?
            .set_override_option(REGISTRY_ENDPOINT, args.consul_endpoint)?
            .set_override_option(REGISTRY_TOKEN, args.consul_token)?
            .set_override_option(REGISTRY_MAX_ATTEMPTS, args.max_attempts.map(i64::from))?
            .set_override_option(
                REGISTRY_ATTEMPT_WAIT_SECONDS,
                args.attempt_wait_seconds.map(|v| v as i64),
            )?
            .set_override_option(
                KUBE_KUBECONFIG,
                args.kubeconfig.map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option(WATCH_NAMESPACE, args.namespace)?
            .set_override_option(WATCH_LABEL_SELECTOR, args.label_selector)?
            .set_override_option(DISPATCH_WORKERS, args.workers.map(i64::from))?
            .set_override_option(LOGGING_LEVEL, args.log_level)?
            .build()?;

        let configuration = Configuration { config };
        configuration.validate()?;
        Ok(configuration)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.get_u64(REGISTRY_MAX_ATTEMPTS)? == 0 {
            return Err(ConfigurationError::Invalid {
                key: REGISTRY_MAX_ATTEMPTS,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.get_u64(WATCH_RESYNC_SECONDS)? == 0 {
            return Err(ConfigurationError::Invalid {
                key: WATCH_RESYNC_SECONDS,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.get_u64(DISPATCH_QUEUE_CAPACITY)? == 0 {
            return Err(ConfigurationError::Invalid {
                key: DISPATCH_QUEUE_CAPACITY,
                reason: "must be at least 1".to_string(),
            });
        }
        // Surface a bad value now rather than as a silent fallback later.
        self.get_u64(REGISTRY_ATTEMPT_WAIT_SECONDS)?;
        self.get_u64(DISPATCH_WORKERS)?;
        self.log_rotation()?;
        Ok(())
    }

    fn get_u64(&self, key: &'static str) -> Result<u64, ConfigurationError> {
        let value = self.config.get_int(key)?;
        u64::try_from(value).map_err(|_| ConfigurationError::Invalid {
            key,
            reason: format!("{} is negative", value),
        })
    }

    fn get_optional_string(&self, key: &str) -> Option<String> {
        self.config
            .get_string(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }

    // ========================================================================
    // Watch Configuration
    // ========================================================================

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.get_u64(WATCH_RESYNC_SECONDS).unwrap_or(10))
    }

    pub fn kubeconfig(&self) -> Option<PathBuf> {
        self.get_optional_string(KUBE_KUBECONFIG).map(PathBuf::from)
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            namespace: self.get_optional_string(WATCH_NAMESPACE),
            label_selector: self.get_optional_string(WATCH_LABEL_SELECTOR),
        }
    }

    // ========================================================================
    // Registry Configuration
    // ========================================================================

    pub fn consul_client_config(&self) -> ConsulClientConfig {
        let mut client_config = ConsulClientConfig::new(
            &self
                .config
                .get_string(REGISTRY_ENDPOINT)
                .unwrap_or(lbmirror_consul_client::constants::DEFAULT_ENDPOINT.to_string()),
        )
        .with_timeouts(
            self.get_u64(REGISTRY_CONNECT_TIMEOUT_MS).unwrap_or(5000),
            self.get_u64(REGISTRY_REQUEST_TIMEOUT_MS).unwrap_or(30000),
        );
        if let Some(token) = self.get_optional_string(REGISTRY_TOKEN) {
            client_config = client_config.with_token(&token);
        }
        client_config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let max_attempts = self
            .get_u64(REGISTRY_MAX_ATTEMPTS)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(defaults.max_attempts);
        let wait = self
            .get_u64(REGISTRY_ATTEMPT_WAIT_SECONDS)
            .map(Duration::from_secs)
            .unwrap_or(defaults.wait);
        RetryPolicy::new(max_attempts, wait)
    }

    // ========================================================================
    // Reconciler / Dispatch Configuration
    // ========================================================================

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            default_namespace: self
                .get_optional_string(RECONCILER_DEFAULT_NAMESPACE)
                .unwrap_or(DEFAULT_NAMESPACE.to_string()),
            prune_inapplicable: self
                .config
                .get_bool(RECONCILER_PRUNE_INAPPLICABLE)
                .unwrap_or(false),
        }
    }

    pub fn dispatch_workers(&self) -> usize {
        self.get_u64(DISPATCH_WORKERS).unwrap_or(4) as usize
    }

    pub fn dispatch_queue_capacity(&self) -> usize {
        self.get_u64(DISPATCH_QUEUE_CAPACITY).unwrap_or(1024) as usize
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    fn log_rotation(&self) -> Result<LogRotation, ConfigurationError> {
        let value = self
            .config
            .get_string(LOGGING_ROTATION)
            .unwrap_or("daily".to_string());
        value
            .parse()
            .map_err(|reason: String| ConfigurationError::Invalid {
                key: LOGGING_ROTATION,
                reason,
            })
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.get_optional_string(LOGGING_DIR),
            self.config
                .get_string(LOGGING_LEVEL)
                .unwrap_or("info".to_string()),
            self.log_rotation().unwrap_or(LogRotation::Daily),
        )
    }
}
