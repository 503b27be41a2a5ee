//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `USHER_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `USHER_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `USHER_IDENTITY_STORE__SERVICE_KEY=...` sets the `identity_store.service_key` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Stores**: `identity_store`, `profile_store`, `audit_sink` - base URL,
//!   service key and request timeout for each external collaborator
//! - **Security**: `cors` - cross-origin settings for browser clients
//!
//! The service keys are privileged credentials and have no usable defaults;
//! [`Config::validate`] refuses to start without them.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "USHER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have defaults defined in the `Default` implementation, but the store
/// service keys must be supplied before the service will start.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Identity store connection (token verification, admin account API)
    pub identity_store: StoreConfig,
    /// Profile store connection (profile rows, role lookups)
    pub profile_store: StoreConfig,
    /// Audit sink connection (append-only audit trail)
    pub audit_sink: StoreConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// Connection settings for one external store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL of the store's API
    pub url: Url,
    /// Privileged service key, sent as a bearer credential.
    /// Set via environment, e.g. `USHER_IDENTITY_STORE__SERVICE_KEY`.
    pub service_key: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8000").unwrap(),
            service_key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
    /// Request headers browsers may send cross-origin
    pub allow_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
            allow_headers: vec![
                "authorization".to_string(),
                "x-client-info".to_string(),
                "apikey".to_string(),
                "content-type".to_string(),
            ],
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            identity_store: StoreConfig::default(),
            profile_store: StoreConfig::default(),
            audit_sink: StoreConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        for (name, store) in [
            ("identity_store", &self.identity_store),
            ("profile_store", &self.profile_store),
            ("audit_sink", &self.audit_sink),
        ] {
            if store.service_key.is_empty() {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: {name}.service_key is not configured. \
                         Set USHER_{}__SERVICE_KEY or add it to the config file.",
                        name.to_uppercase()
                    ),
                });
            }
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("USHER_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args_for(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_store_config_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
identity_store:
  url: https://identity.internal/auth/v1
  service_key: identity-key
  timeout: 30s
profile_store:
  url: https://profiles.internal/rest/v1
  service_key: profiles-key
audit_sink:
  url: https://profiles.internal/rest/v1
  service_key: audit-key
"#,
            )?;

            let config = Config::load(&args_for("test.yaml"))?;

            assert_eq!(config.identity_store.url.as_str(), "https://identity.internal/auth/v1");
            assert_eq!(config.identity_store.service_key, "identity-key");
            assert_eq!(config.identity_store.timeout, Duration::from_secs(30));

            // Unspecified timeout keeps the default
            assert_eq!(config.profile_store.timeout, Duration::from_secs(10));

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
identity_store:
  service_key: identity-key
profile_store:
  service_key: profiles-key
audit_sink:
  service_key: audit-key
"#,
            )?;

            jail.set_env("USHER_HOST", "127.0.0.1");
            jail.set_env("USHER_PORT", "8080");
            jail.set_env("USHER_IDENTITY_STORE__SERVICE_KEY", "from-env");

            let config = Config::load(&args_for("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
            assert_eq!(config.identity_store.service_key, "from-env");

            // YAML values not overridden should be preserved
            assert_eq!(config.profile_store.service_key, "profiles-key");

            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_missing_service_key() {
        let config = Config::default();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("identity_store.service_key"));
    }

    #[test]
    fn test_validation_rejects_wildcard_with_credentials() {
        let mut config = Config::default();
        config.identity_store.service_key = "k".to_string();
        config.profile_store.service_key = "k".to_string();
        config.audit_sink.service_key = "k".to_string();
        config.cors.allow_credentials = true;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("wildcard"));
    }

    #[test]
    fn test_validation_rejects_empty_origins() {
        let mut config = Config::default();
        config.identity_store.service_key = "k".to_string();
        config.profile_store.service_key = "k".to_string();
        config.audit_sink.service_key = "k".to_string();
        config.cors.allowed_origins = vec![];

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("allowed_origins"));
    }

    #[test]
    fn test_validation_accepts_complete_config() {
        let mut config = Config::default();
        config.identity_store.service_key = "k".to_string();
        config.profile_store.service_key = "k".to_string();
        config.audit_sink.service_key = "k".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_origins_accept_credentials() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
identity_store:
  service_key: k
profile_store:
  service_key: k
audit_sink:
  service_key: k
cors:
  allowed_origins:
    - https://dashboard.example.com
  allow_credentials: true
"#,
            )?;

            let config = Config::load(&args_for("test.yaml"))?;

            assert!(config.cors.allow_credentials);
            assert!(matches!(config.cors.allowed_origins[0], CorsOrigin::Url(_)));

            Ok(())
        });
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 4000,
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:4000");
    }
}
