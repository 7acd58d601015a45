//! Server configuration loaded from environment variables.
//!
//! Every setting has a documented default except the secrets (JWT signing
//! key and the credentials of the two remote services). Missing secrets are
//! a startup error; the server never runs with a half-configured pipeline.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use inkstone_core::imaging::{DEFAULT_ANALYSIS_MAX_BYTES, DEFAULT_WORK_MAX_BYTES};
use inkstone_pipeline::dispatch::DEFAULT_CONCURRENCY;
use inkstone_recognition::ocr::OcrConfig;
use inkstone_recognition::vision::{
    VisionConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};

use crate::auth::jwt::JwtConfig;

/// Allowance for multipart boundaries and text fields on top of a file.
const MULTIPART_SLACK_BYTES: usize = 1024 * 1024;

/// Problems found while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Read a required, non-empty variable.
pub(crate) fn require_env(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

/// Read and parse an optional variable, falling back to `default`.
pub(crate) fn env_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// Where uploaded and derived files live, and how long artifacts are kept.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of stored work images (`<upload_dir>/works/...`).
    pub upload_dir: PathBuf,
    /// Raw OCR responses.
    pub artifact_dir: PathBuf,
    /// Standalone annotation documents.
    pub annotation_dir: PathBuf,
    /// Byte cap for work uploads.
    pub max_upload_bytes: usize,
    /// Byte cap for crops sent for analysis.
    pub max_analysis_bytes: usize,
    /// Unreferenced artifacts older than this are deleted.
    pub artifact_ttl: Duration,
    /// How often the artifact reaper runs.
    pub artifact_reap_interval: Duration,
}

impl StorageConfig {
    /// Request body cap: the larger upload limit plus room for multipart
    /// framing and form fields, so oversize files reach the size check.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.max(self.max_analysis_bytes) + MULTIPART_SLACK_BYTES
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`).
    pub request_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub vision: VisionConfig,
    /// Concurrent OCR and vision calls allowed (default: `4`).
    pub external_call_concurrency: usize,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default                                       |
    /// |-------------------------------|-----------------------------------------------|
    /// | `HOST`                        | `0.0.0.0`                                     |
    /// | `PORT`                        | `3000`                                        |
    /// | `CORS_ORIGINS`                | `http://localhost:5000`                       |
    /// | `REQUEST_TIMEOUT_SECS`        | `120`                                         |
    /// | `UPLOAD_DIR`                  | `uploads`                                     |
    /// | `ARTIFACT_DIR`                | `uploads/ocr_artifacts`                       |
    /// | `ANNOTATION_DIR`              | `calligraphy_annotations`                     |
    /// | `MAX_UPLOAD_BYTES`            | 16 MiB                                        |
    /// | `MAX_ANALYSIS_BYTES`          | 10 MiB                                        |
    /// | `ARTIFACT_TTL_HOURS`          | `168`                                         |
    /// | `ARTIFACT_REAP_INTERVAL_SECS` | `3600`                                        |
    /// | `OCR_ENDPOINT`                | required                                      |
    /// | `OCR_TOKEN`, `OCR_EMAIL`      | required                                      |
    /// | `OCR_TIMEOUT_SECS`            | `60`                                          |
    /// | `ARK_API_KEY`                 | required                                      |
    /// | `ARK_BASE_URL`                | `https://ark.cn-beijing.volces.com/api/v3`    |
    /// | `ARK_VISION_MODEL`            | `doubao-1.5-vision-pro-32k-250115`            |
    /// | `VISION_TIMEOUT_SECS`         | `90`                                          |
    /// | `VISION_TEMPERATURE`          | `0.7`                                         |
    /// | `EXTERNAL_CALL_CONCURRENCY`   | `4`                                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|var: &str| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable source.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let upload_dir: PathBuf = env_or(lookup, "UPLOAD_DIR", PathBuf::from("uploads"))?;
        let storage = StorageConfig {
            artifact_dir: env_or(lookup, "ARTIFACT_DIR", upload_dir.join("ocr_artifacts"))?,
            annotation_dir: env_or(
                lookup,
                "ANNOTATION_DIR",
                PathBuf::from("calligraphy_annotations"),
            )?,
            max_upload_bytes: env_or(lookup, "MAX_UPLOAD_BYTES", DEFAULT_WORK_MAX_BYTES)?,
            max_analysis_bytes: env_or(lookup, "MAX_ANALYSIS_BYTES", DEFAULT_ANALYSIS_MAX_BYTES)?,
            artifact_ttl: Duration::from_secs(
                env_or::<u64>(lookup, "ARTIFACT_TTL_HOURS", 168)? * 3600,
            ),
            artifact_reap_interval: Duration::from_secs(env_or(
                lookup,
                "ARTIFACT_REAP_INTERVAL_SECS",
                3600,
            )?),
            upload_dir,
        };

        let ocr = OcrConfig {
            endpoint: require_env(lookup, "OCR_ENDPOINT")?,
            token: require_env(lookup, "OCR_TOKEN")?,
            email: require_env(lookup, "OCR_EMAIL")?,
            timeout: Duration::from_secs(env_or(lookup, "OCR_TIMEOUT_SECS", 60)?),
        };

        let vision = VisionConfig {
            api_key: require_env(lookup, "ARK_API_KEY")?,
            base_url: env_or(lookup, "ARK_BASE_URL", DEFAULT_BASE_URL.to_string())?,
            model: env_or(lookup, "ARK_VISION_MODEL", DEFAULT_MODEL.to_string())?,
            timeout: Duration::from_secs(env_or(lookup, "VISION_TIMEOUT_SECS", 90)?),
            temperature: env_or(lookup, "VISION_TEMPERATURE", DEFAULT_TEMPERATURE)?,
        };

        Ok(Self {
            host: env_or(lookup, "HOST", "0.0.0.0".to_string())?,
            port: env_or(lookup, "PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env_or(lookup, "REQUEST_TIMEOUT_SECS", 120)?,
            jwt: JwtConfig::from_lookup(lookup)?,
            storage,
            ocr,
            vision,
            external_call_concurrency: env_or(
                lookup,
                "EXTERNAL_CALL_CONCURRENCY",
                DEFAULT_CONCURRENCY,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("JWT_SECRET", "secret"),
            ("OCR_ENDPOINT", "https://ocr.example.com/v2/recognize"),
            ("OCR_TOKEN", "token"),
            ("OCR_EMAIL", "ops@example.com"),
            ("ARK_API_KEY", "key"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(&|var: &str| vars.get(var).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_only_secrets_set() {
        let config = load(&required()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.cors_origins, vec!["http://localhost:5000".to_string()]);
        assert_eq!(config.storage.artifact_dir, PathBuf::from("uploads/ocr_artifacts"));
        assert_eq!(config.storage.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.storage.artifact_ttl, Duration::from_secs(168 * 3600));
        assert_eq!(config.vision.model, DEFAULT_MODEL);
        assert_eq!(config.ocr.timeout, Duration::from_secs(60));
        assert_eq!(config.external_call_concurrency, 4);
        assert_eq!(config.jwt.access_token_expiry_mins, 1440);
    }

    #[test]
    fn missing_ocr_credentials_fail() {
        let mut vars = required();
        vars.remove("OCR_TOKEN");
        assert_matches!(load(&vars), Err(ConfigError::Missing("OCR_TOKEN")));
    }

    #[test]
    fn blank_vision_key_counts_as_missing() {
        let mut vars = required();
        vars.insert("ARK_API_KEY", "  ");
        assert_matches!(load(&vars), Err(ConfigError::Missing("ARK_API_KEY")));
    }

    #[test]
    fn unparsable_number_is_invalid() {
        let mut vars = required();
        vars.insert("PORT", "eighty");
        assert_matches!(load(&vars), Err(ConfigError::Invalid { var: "PORT", .. }));
    }

    #[test]
    fn cors_origins_split_on_commas() {
        let mut vars = required();
        vars.insert("CORS_ORIGINS", "https://a.example, ,https://b.example");
        let config = load(&vars).unwrap();
        assert_eq!(config.cors_origins.len(), 2);
    }
}
