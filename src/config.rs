use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
///
/// Built once at startup and passed down by reference; nothing in the
/// library reads paths or limits from process-wide state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub regnet: RegnetConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Paths and logging
#[derive(Debug, Clone, Deserialize)]
pub struct RegnetConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// One JSON record per resolved entity lives here
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RegnetConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Retry and transport settings shared by every remote source
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Total attempts per entity, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * retry_delay_ms` before the next try
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry 5xx answers like transient failures instead of reporting Down at once
    #[serde(default)]
    pub retry_server_errors: bool,
    /// Only for scraping public mirrors with broken certificate chains
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            retry_server_errors: false,
            accept_invalid_certs: default_accept_invalid_certs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ResolverConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// External database endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_mirdb_url")]
    pub mirdb_url: String,
    #[serde(default = "default_circinteractome_url")]
    pub circinteractome_url: String,
    #[serde(default = "default_string_url")]
    pub string_url: String,
    #[serde(default = "default_species")]
    pub species: String,
    #[serde(default = "default_taxon_id")]
    pub taxon_id: u32,
    /// STRING combined score cutoff (0-1000)
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            mirdb_url: default_mirdb_url(),
            circinteractome_url: default_circinteractome_url(),
            string_url: default_string_url(),
            species: default_species(),
            taxon_id: default_taxon_id(),
            min_confidence: default_min_confidence(),
        }
    }
}

/// Graph assembly configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    /// Build an upstream-only graph when the downstream layer is missing
    #[serde(default)]
    pub allow_partial: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("temp/mirna_cache")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_mirdb_url() -> String {
    "https://mirdb.org/cgi-bin/search.cgi".to_string()
}

fn default_circinteractome_url() -> String {
    "https://circinteractome.nia.nih.gov/api/v2/mirnasearch".to_string()
}

fn default_string_url() -> String {
    "https://string-db.org/api".to_string()
}

fn default_species() -> String {
    "Human".to_string()
}

fn default_taxon_id() -> u32 {
    9606
}

fn default_min_confidence() -> u32 {
    700
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in REGNET_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory (defaults are used when absent)
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config = match std::env::var("REGNET_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let path = PathBuf::from("config.toml");
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    log::info!("No config.toml found, using built-in defaults");
                    Config::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without consulting the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.resolver.max_attempts == 0 {
            anyhow::bail!("resolver.max_attempts must be greater than 0");
        }

        if self.resolver.timeout_secs == 0 {
            anyhow::bail!("resolver.timeout_secs must be greater than 0");
        }

        if self.pool.concurrency == 0 {
            anyhow::bail!("pool.concurrency must be greater than 0");
        }

        if self.sources.min_confidence > 1000 {
            anyhow::bail!("sources.min_confidence must be between 0 and 1000");
        }

        if self.regnet.output_dir.as_os_str().is_empty() {
            anyhow::bail!("regnet.output_dir must not be empty");
        }

        Ok(())
    }

    /// Directory for produced tables and graph files
    pub fn output_dir(&self) -> &Path {
        &self.regnet.output_dir
    }

    /// Directory for per-entity cache records
    pub fn cache_dir(&self) -> &Path {
        &self.regnet.cache_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("REGNET_CONFIG").ok();
        std::env::set_var("REGNET_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("REGNET_CONFIG");
        if let Some(val) = original {
            std::env::set_var("REGNET_CONFIG", val);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.resolver.max_attempts, 3);
        assert_eq!(config.pool.concurrency, 8);
        assert_eq!(config.sources.taxon_id, 9606);
        assert!(!config.network.allow_partial);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[regnet]
output_dir = "out"
log_level = "debug"

[resolver]
max_attempts = 2
retry_delay_ms = 50

[pool]
concurrency = 4
"#,
        )
        .unwrap();

        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.regnet.log_level, "debug");
            assert_eq!(config.output_dir(), Path::new("out"));
            assert_eq!(config.resolver.max_attempts, 2);
            assert_eq!(config.resolver.retry_delay(), Duration::from_millis(50));
            assert_eq!(config.pool.concurrency, 4);
            // untouched sections fall back to defaults
            assert_eq!(config.sources.min_confidence, 700);
        });
    }

    #[test]
    fn test_config_rejects_zero_attempts() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[resolver]\nmax_attempts = 0\n").unwrap();

        with_config_env(&config_path, || {
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("max_attempts"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Path::new("nonexistent.toml"), || {
            assert!(Config::load().is_err());
        });
    }
}
