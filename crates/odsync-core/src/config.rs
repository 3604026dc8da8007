//! Configuration module for odsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::change::SyncDirection;

/// Upload session chunks must be a multiple of this many KiB.
pub const CHUNK_ALIGNMENT_KB: u64 = 320;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for odsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub transfer: TransferConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Which side is the source of truth: `upload` (`up`) or `download` (`down`).
    pub direction: SyncDirection,
    /// Number of parallel workers.
    pub threads: usize,
    /// Delete destination items that no longer exist on the source side.
    pub mirror_deletes: bool,
    /// Match local and remote names case-sensitively.
    pub case_sensitive: bool,
    /// Always compare CRC32 checksums, even when size and dates match.
    pub hash_compare: bool,
    /// Files larger than this (in KiB) are skipped. `None` disables the limit.
    pub max_size_kb: Option<u64>,
}

/// Upload and download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Files up to this size (in KiB) are uploaded in a single request.
    pub simple_upload_max_kb: u64,
    /// Size of each upload session chunk (in KiB, multiple of 320).
    pub chunk_size_kb: u64,
    /// Attempts per chunk before an upload is abandoned.
    pub chunk_attempts: u32,
    /// Whole-transfer attempts when the uploaded file fails verification.
    pub upload_attempts: u32,
}

/// Retry policy for transient remote failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per remote call (1 disables retries).
    pub max_attempts: u32,
    /// Delay before the first retry (in milliseconds).
    pub base_delay_ms: u64,
    /// Upper bound for a single delay (in milliseconds).
    pub max_delay_ms: u64,
    /// Randomize each delay by up to this fraction (0.0 - 1.0).
    pub jitter: f64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional log file written in addition to stderr.
    pub file: Option<PathBuf>,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON file holding the access and refresh tokens.
    pub key_file: PathBuf,
    /// Azure AD Application (client) ID used to refresh tokens.
    pub client_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/odsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("odsync")
            .join("config.yaml")
    }

    /// Max-size threshold in bytes, if configured.
    ///
    /// Values beyond the `u64` range saturate, which disables the limit in
    /// practice.
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.sync.max_size_kb.map(kib_to_bytes)
    }

    /// Simple-upload threshold in bytes.
    pub fn simple_upload_max_bytes(&self) -> u64 {
        kib_to_bytes(self.transfer.simple_upload_max_kb)
    }

    /// Upload chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> u64 {
        kib_to_bytes(self.transfer.chunk_size_kb)
    }
}

fn kib_to_bytes(kb: u64) -> u64 {
    kb.saturating_mul(1024)
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            direction: SyncDirection::Upload,
            threads: 5,
            mirror_deletes: true,
            case_sensitive: false,
            hash_compare: false,
            max_size_kb: None,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            simple_upload_max_kb: 4 * 1024,
            chunk_size_kb: 32 * CHUNK_ALIGNMENT_KB,
            chunk_attempts: 3,
            upload_attempts: 2,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 60_000,
            jitter: 0.2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            key_file: dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("~/.config"))
                .join("odsync")
                .join("keys.json"),
            client_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.threads"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest chunk the Graph upload endpoint accepts (in KiB).
const MAX_CHUNK_SIZE_KB: u64 = 60 * 1024;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        // --- sync ---
        positive("sync.threads", self.sync.threads as u64);
        if let Some(kb) = self.sync.max_size_kb {
            positive("sync.max_size_kb", kb);
        }

        // --- transfer ---
        positive("transfer.simple_upload_max_kb", self.transfer.simple_upload_max_kb);
        positive("transfer.chunk_attempts", u64::from(self.transfer.chunk_attempts));
        positive("transfer.upload_attempts", u64::from(self.transfer.upload_attempts));

        // --- retry ---
        positive("retry.max_attempts", u64::from(self.retry.max_attempts));

        let chunk = self.transfer.chunk_size_kb;
        if chunk == 0 || chunk % CHUNK_ALIGNMENT_KB != 0 {
            errors.push(ValidationError {
                field: "transfer.chunk_size_kb".into(),
                message: format!("must be a positive multiple of {CHUNK_ALIGNMENT_KB}"),
            });
        } else if chunk > MAX_CHUNK_SIZE_KB {
            errors.push(ValidationError {
                field: "transfer.chunk_size_kb".into(),
                message: format!("must not exceed {MAX_CHUNK_SIZE_KB}"),
            });
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            errors.push(ValidationError {
                field: "retry.base_delay_ms".into(),
                message: format!(
                    "base_delay_ms ({}) must not exceed max_delay_ms ({})",
                    self.retry.base_delay_ms, self.retry.max_delay_ms
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            errors.push(ValidationError {
                field: "retry.jitter".into(),
                message: "must be in range 0.0..=1.0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use odsync_core::config::ConfigBuilder;
/// use odsync_core::domain::SyncDirection;
///
/// let config = ConfigBuilder::new()
///     .sync_direction(SyncDirection::Download)
///     .sync_threads(8)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an already loaded configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_direction(mut self, direction: SyncDirection) -> Self {
        self.config.sync.direction = direction;
        self
    }

    pub fn sync_threads(mut self, threads: usize) -> Self {
        self.config.sync.threads = threads;
        self
    }

    pub fn sync_mirror_deletes(mut self, enabled: bool) -> Self {
        self.config.sync.mirror_deletes = enabled;
        self
    }

    pub fn sync_case_sensitive(mut self, enabled: bool) -> Self {
        self.config.sync.case_sensitive = enabled;
        self
    }

    pub fn sync_hash_compare(mut self, enabled: bool) -> Self {
        self.config.sync.hash_compare = enabled;
        self
    }

    pub fn sync_max_size_kb(mut self, kb: Option<u64>) -> Self {
        self.config.sync.max_size_kb = kb;
        self
    }

    // --- transfer ---

    pub fn transfer_simple_upload_max_kb(mut self, kb: u64) -> Self {
        self.config.transfer.simple_upload_max_kb = kb;
        self
    }

    pub fn transfer_chunk_size_kb(mut self, kb: u64) -> Self {
        self.config.transfer.chunk_size_kb = kb;
        self
    }

    pub fn transfer_chunk_attempts(mut self, n: u32) -> Self {
        self.config.transfer.chunk_attempts = n;
        self
    }

    pub fn transfer_upload_attempts(mut self, n: u32) -> Self {
        self.config.transfer.upload_attempts = n;
        self
    }

    // --- retry ---

    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay_ms = ms;
        self
    }

    pub fn retry_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.max_delay_ms = ms;
        self
    }

    pub fn retry_jitter(mut self, jitter: f64) -> Self {
        self.config.retry.jitter = jitter;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: Option<PathBuf>) -> Self {
        self.config.logging.file = file;
        self
    }

    // --- auth ---

    pub fn auth_key_file(mut self, key_file: PathBuf) -> Self {
        self.config.auth.key_file = key_file;
        self
    }

    pub fn auth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
