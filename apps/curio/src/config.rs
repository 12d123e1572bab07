//! # Configuration
//!
//! Settings are layered, later layers winning:
//! 1. Built-in defaults
//! 2. `curio.toml` (or the file passed with `--config`)
//! 3. Environment variables
//! 4. CLI flags (applied by the CLI module)
//!
//! ## Environment Variables
//!
//! - `CURIO_DB`: database path
//! - `CURIO_BACKEND`: `redb` or `memory`
//! - `CURIO_RATE_LIMIT`: requests per second, 0 to disable
//! - `CURIO_CONSENSUS`: `fixed_base` or `anchored`
//! - `CURIO_API_KEY`: if set, requires Bearer token authentication
//! - `CURIO_CORS_ORIGINS`: comma-separated origins, or `*` for all

use curio_core::{ConsensusPolicy, CurioError, EngineConfig, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "curio.toml";

fn default_db_path() -> PathBuf {
    PathBuf::from("curio.redb")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_rate_limit() -> u32 {
    100
}

fn default_body_limit() -> usize {
    2 * 1024 * 1024
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Which store backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Disk-backed redb database.
    #[default]
    Redb,
    /// Volatile in-memory maps.
    Memory,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = CurioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(CurioError::Validation(format!(
                "unknown storage backend '{}'",
                other
            ))),
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_db_path(),
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests per second; 0 disables rate limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rate_limit: default_rate_limit(),
            body_limit_bytes: default_body_limit(),
            api_key: None,
            cors_origins: None,
        }
    }
}

/// `[consensus]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default)]
    pub policy: ConsensusPolicy,
}

// =============================================================================
// CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurioConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

impl CurioConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, CurioError> {
        toml::from_str(content)
            .map_err(|e| CurioError::Validation(format!("Invalid config: {}", e)))
    }

    /// Load config from the given file, or from `curio.toml` if present,
    /// then apply environment overrides.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, CurioError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::read_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, CurioError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CurioError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `CURIO_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), CurioError> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup("CURIO_DB") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("CURIO_BACKEND") {
            self.storage.backend = backend.trim().parse()?;
        }
        if let Some(rate) = lookup("CURIO_RATE_LIMIT") {
            self.server.rate_limit = rate.trim().parse().map_err(|_| {
                CurioError::Validation(format!("CURIO_RATE_LIMIT is not a number: '{}'", rate))
            })?;
        }
        if let Some(policy) = lookup("CURIO_CONSENSUS") {
            self.consensus.policy = policy.trim().parse()?;
        }
        if let Some(key) = lookup("CURIO_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(origins) = lookup("CURIO_CORS_ORIGINS") {
            self.server.cors_origins = Some(origins);
        }
        Ok(())
    }

    /// Engine settings derived from this config.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            consensus: self.consensus.policy,
        }
    }

    /// Open the configured store.
    pub fn open_backend(&self) -> Result<StorageBackend, CurioError> {
        match self.storage.backend {
            BackendKind::Redb => StorageBackend::open_redb(&self.storage.path),
            BackendKind::Memory => Ok(StorageBackend::in_memory()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
