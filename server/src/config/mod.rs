use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Secret used when `JWT_SECRET` is unset. Deployments must override it.
pub const FALLBACK_JWT_SECRET: &str = "JUSB098";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongo_uri: Option<String>,
    pub database_name: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
    pub storage: StorageBackend,
    pub require_auth: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            mongo_uri: None,
            database_name: None,
            jwt_secret: None,
            token_ttl_secs: 3600,
            storage: StorageBackend::Mongo,
            require_auth: false,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file named by `CONFIG_PATH` (if any), then
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::load_from_file(path)?,
            Err(_) => Self::default(),
        };

        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides looked up through `lookup`; empty values are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT") {
            self.port = parse_env("PORT", port)?;
        }
        if let Some(uri) = get("MONGO_URI") {
            self.mongo_uri = Some(uri);
        }
        if let Some(name) = get("DATABASE_NAME") {
            self.database_name = Some(name);
        }
        if let Some(secret) = get("JWT_SECRET") {
            self.jwt_secret = Some(secret);
        }
        if let Some(ttl) = get("TOKEN_TTL_SECS") {
            self.token_ttl_secs = parse_env("TOKEN_TTL_SECS", ttl)?;
        }
        if let Some(backend) = get("STORAGE_BACKEND") {
            self.storage = parse_env("STORAGE_BACKEND", backend)?;
        }
        if let Some(flag) = get("REQUIRE_AUTH") {
            self.require_auth = parse_flag("REQUIRE_AUTH", flag)?;
        }

        Ok(self)
    }

    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or(FALLBACK_JWT_SECRET)
    }

    pub fn uses_fallback_secret(&self) -> bool {
        self.jwt_secret.is_none()
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.token_ttl(), Duration::from_secs(3600));
        assert_eq!(config.storage, StorageBackend::Mongo);
        assert!(!config.require_auth);
        assert!(config.uses_fallback_secret());
        assert_eq!(config.jwt_secret(), FALLBACK_JWT_SECRET);
    }

    #[test]
    fn parse_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
port = 8080
mongo_uri = "mongodb://localhost:27017/tracker"
storage = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(
            config.mongo_uri.as_deref(),
            Some("mongodb://localhost:27017/tracker")
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let config = AppConfig::from_toml("port = 8080")
            .unwrap()
            .with_env_overrides(env(&[
                ("PORT", "9000"),
                ("JWT_SECRET", "s3cret"),
                ("REQUIRE_AUTH", "yes"),
                ("STORAGE_BACKEND", "MongoDB"),
                ("MONGO_URI", ""),
            ]))
            .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.jwt_secret(), "s3cret");
        assert!(!config.uses_fallback_secret());
        assert!(config.require_auth);
        assert_eq!(config.storage, StorageBackend::Mongo);
        assert!(config.mongo_uri.is_none());
    }

    #[test]
    fn invalid_env_values_are_reported() {
        let err = AppConfig::default()
            .with_env_overrides(env(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));

        let err = AppConfig::default()
            .with_env_overrides(env(&[("REQUIRE_AUTH", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "REQUIRE_AUTH", .. }));
    }

    #[test]
    fn invalid_config_path() {
        assert!(matches!(
            AppConfig::load_from_file("nonexistent/config.toml"),
            Err(ConfigError::Read(_))
        ));
    }
}
