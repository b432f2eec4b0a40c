use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "VARIANT_INTEL_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_CLINVAR_BASE_URL: &str = "CLINVAR_BASE_URL";
const ENV_GNOMAD_BASE_URL: &str = "GNOMAD_BASE_URL";
const ENV_ENSEMBL_BASE_URL: &str = "ENSEMBL_BASE_URL";
const ENV_NCBI_API_KEY: &str = "NCBI_API_KEY";

const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Per-source settings
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the source's public endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Minimum interval between two requests to this source
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            min_interval_ms: None,
            api_key: None,
        }
    }
}

/// Annotation coordinator settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// Number of variants annotated concurrently
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub clinvar: SourceConfig,
    #[serde(default)]
    pub gnomad: SourceConfig,
    #[serde(default)]
    pub ensembl: SourceConfig,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            clinvar: SourceConfig::default(),
            gnomad: SourceConfig::default(),
            ensembl: SourceConfig::default(),
        }
    }
}

impl AnnotationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply environment overrides on top of file values
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_CLINVAR_BASE_URL) {
            self.clinvar.base_url = Some(url);
        }
        if let Ok(url) = std::env::var(ENV_GNOMAD_BASE_URL) {
            self.gnomad.base_url = Some(url);
        }
        if let Ok(url) = std::env::var(ENV_ENSEMBL_BASE_URL) {
            self.ensembl.base_url = Some(url);
        }
        if let Ok(key) = std::env::var(ENV_NCBI_API_KEY)
            && !key.is_empty()
        {
            self.clinvar.api_key = Some(key);
        }
        self.sanitize();
    }

    /// Replace zero limits with their defaults
    fn sanitize(&mut self) {
        if self.max_workers == 0 {
            tracing::warn!("max_workers must be positive, using default");
            self.max_workers = DEFAULT_MAX_WORKERS;
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!("request_timeout_secs must be positive, using default");
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub annotation: AnnotationConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            annotation: AnnotationConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut annotation = Self::load_config_file(&config_path)
            .map(|cf| cf.annotation)
            .unwrap_or_default();
        annotation.apply_env();

        Self {
            annotation,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => Self::parse_config(&contents, path),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read config file, using defaults"
                );
                None
            }
        }
    }

    fn parse_config(contents: &str, path: &Path) -> Option<ConfigFile> {
        let contents = contents.trim();
        if contents.is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Some(ConfigFile::default());
        }

        match serde_yaml::from_str(contents) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config file, using defaults"
                );
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
