use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use trawler_scanner::{FetchConfig, RetryPolicy, RotationStrategy, ThrottleConfig};

use crate::people::inference::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

pub const DEFAULT_API_KEY_ENV: &str = "TRAWLER_INFERENCE_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Everything a crawl can be tuned with. Every field has a default, so a
/// config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    pub use_direct_connection: bool,
    pub extract_people: bool,
    pub extract_social: bool,
    pub extract_facebook: bool,
    pub max_retries: usize,
    pub proxy_file: Option<PathBuf>,
    pub rotation: RotationStrategy,
    pub workers: usize,
    pub names_db: Option<PathBuf>,
    pub fetch: FetchSettings,
    pub throttle: ThrottleSettings,
    pub backoff: BackoffSettings,
    pub inference: InferenceSettings,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            use_direct_connection: true,
            extract_people: true,
            extract_social: true,
            extract_facebook: true,
            max_retries: 3,
            proxy_file: None,
            rotation: RotationStrategy::RoundRobin,
            workers: 5,
            names_db: None,
            fetch: FetchSettings::default(),
            throttle: ThrottleSettings::default(),
            backoff: BackoffSettings::default(),
            inference: InferenceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_ms: u64,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_body_bytes: 5 * 1024 * 1024,
            max_redirects: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub cooldown_ms: u64,
    pub min_delay_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 5_000,
            min_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_ms: 1_000,
            max_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl InferenceSettings {
    /// The API key from the environment, if set and non-blank.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl CrawlOptions {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_millis(self.fetch.timeout_ms),
            max_body_bytes: self.fetch.max_body_bytes,
            max_redirects: self.fetch.max_redirects,
        }
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            cooldown: Duration::from_millis(self.throttle.cooldown_ms),
            min_delay: Duration::from_millis(self.throttle.min_delay_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            backoff_min: Duration::from_millis(self.backoff.min_ms),
            backoff_max: Duration::from_millis(self.backoff.max_ms),
        }
    }

    /// Route through the proxies in `path` instead of connecting directly.
    pub fn with_proxy_file(mut self, path: PathBuf) -> Self {
        self.proxy_file = Some(path);
        self.use_direct_connection = false;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }

    /// Expand `~` in every configured path.
    pub fn expand_paths(mut self) -> Self {
        self.proxy_file = self.proxy_file.map(|p| expand_path(&p));
        self.names_db = self.names_db.map(|p| expand_path(&p));
        self
    }
}

pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

/// Read crawl options from a YAML file.
pub fn load_config(path: &Path) -> Result<CrawlOptions, ConfigError> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let options: CrawlOptions =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml { path, source })?;
    Ok(options.expand_paths())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let options = CrawlOptions::default();
        assert!(options.use_direct_connection);
        assert!(options.extract_people && options.extract_social && options.extract_facebook);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.workers, 5);
        assert_eq!(options.rotation, RotationStrategy::RoundRobin);
        assert_eq!(options.fetch_config().timeout, Duration::from_secs(15));
        assert_eq!(options.throttle_config().cooldown, Duration::from_secs(5));
        assert_eq!(options.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "workers: 12\nrotation: smart\nextract_facebook: false\nthrottle:\n  cooldown_ms: 250\ninference:\n  model: local-model"
        )
        .unwrap();

        let options = load_config(file.path()).unwrap();
        assert_eq!(options.workers, 12);
        assert_eq!(options.rotation, RotationStrategy::Smart);
        assert!(!options.extract_facebook);
        assert_eq!(options.throttle.cooldown_ms, 250);
        assert_eq!(options.throttle.min_delay_ms, 1_000);
        assert_eq!(options.inference.model, "local-model");
        assert_eq!(options.inference.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/trawler.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "workers: [not, a, number]").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_proxy_file_disables_direct_connection() {
        let options = CrawlOptions::default().with_proxy_file(PathBuf::from("proxies.txt"));
        assert!(!options.use_direct_connection);
        assert_eq!(options.proxy_file, Some(PathBuf::from("proxies.txt")));
    }

    #[test]
    fn test_tilde_expansion() {
        if std::env::var_os("HOME").is_none() {
            return;
        }
        let expanded = expand_path(Path::new("~/names.csv"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("names.csv"));
    }

    #[test]
    fn test_retry_policy_never_zero() {
        let options = CrawlOptions {
            max_retries: 0,
            ..CrawlOptions::default()
        };
        assert_eq!(options.retry_policy().max_attempts, 1);
    }
}
