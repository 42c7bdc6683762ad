//! Process-wide configuration, constructed once at startup.
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional TOML
//! file, `QUILLBOX_*` environment variables, CLI flags (applied in `main`).
//! The resulting [`Config`] value is passed explicitly into the token issuer,
//! the store, and the gateway — nothing reads configuration ad hoc.
//!
//! The token signing secret has no fallback: a missing or weak secret is a
//! startup error, never a silent default.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Minimum accepted signing-secret length in bytes.
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub perimeter: PerimeterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file. Created on first run.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("quillbox.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret for token signing. Required; no default.
    pub token_secret: Option<String>,
    /// Token validity window in seconds (default: 24 hours).
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerimeterConfig {
    /// Origin allowed by CORS. `None` allows any origin.
    pub allowed_origin: Option<String>,
    /// Requests allowed per client per window (0 = unlimited).
    pub rate_limit_per_window: u32,
    /// Rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PerimeterConfig {
    fn default() -> Self {
        Self {
            allowed_origin: Some("http://localhost:5173".into()),
            rate_limit_per_window: 300,
            rate_limit_window_secs: 15 * 60,
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {}", p.display()))?
            }
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment variables take precedence over the config file.
    fn apply_env(&mut self) {
        if let Some(secret) = env_nonempty("QUILLBOX_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
        if let Some(db) = env_nonempty("QUILLBOX_DB_PATH") {
            self.storage.db_path = PathBuf::from(db);
        }
        if let Some(origin) = env_nonempty("QUILLBOX_ALLOWED_ORIGIN") {
            self.perimeter.allowed_origin = Some(origin);
        }
    }

    /// Validate invariants that must hold before the gateway starts.
    pub fn validate(&self) -> Result<()> {
        match self.auth.token_secret.as_deref().map(str::trim) {
            None | Some("") => bail!(
                "No token signing secret configured. Set QUILLBOX_TOKEN_SECRET or \
                 [auth] token_secret in the config file — refusing to start with \
                 a default secret."
            ),
            Some(secret) if secret.len() < MIN_SECRET_LEN => bail!(
                "Token signing secret is too short ({} bytes, minimum {MIN_SECRET_LEN}).",
                secret.len()
            ),
            Some(_) => {}
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("token_ttl_secs must be greater than zero");
        }
        Ok(())
    }

    /// The validated signing secret. Call only after [`Config::validate`].
    pub fn token_secret(&self) -> &str {
        self.auth.token_secret.as_deref().map(str::trim).unwrap_or("")
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert_eq!(config.perimeter.rate_limit_per_window, 300);
    }

    #[test]
    fn missing_secret_fails_validation() {
        let config = Config::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("signing secret"));
    }

    #[test]
    fn short_secret_fails_validation() {
        let mut config = Config::default();
        config.auth.token_secret = Some("short".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_secret_passes() {
        let mut config = Config::default();
        config.auth.token_secret = Some("0123456789abcdef0123456789abcdef".into());
        config.validate().unwrap();
    }

    #[test]
    fn parses_toml_sections() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [auth]
            token_secret = "0123456789abcdef0123456789abcdef"
            token_ttl_secs = 3600

            [perimeter]
            rate_limit_per_window = 50
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.perimeter.rate_limit_per_window, 50);
        // Untouched sections keep defaults.
        assert_eq!(config.storage.db_path, PathBuf::from("quillbox.db"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = "[server]\nhots = \"oops\"\n";
        assert!(toml::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let mut config = Config::default();
        config.auth.token_secret = Some("0123456789abcdef0123456789abcdef".into());
        config.auth.token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
