use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_database_config")]
    pub database: DatabaseConfig,
    #[serde(default = "default_linking_config")]
    pub linking: LinkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkingConfig {
    /// How long an issued link secret stays redeemable, in seconds.
    #[serde(default = "default_secret_ttl_secs")]
    pub secret_ttl_secs: u64,
    /// Upper bound on evictions per sweep pass.
    #[serde(default = "default_sweep_limit")]
    pub sweep_limit: usize,
    #[serde(default = "default_secret_len")]
    pub secret_len: usize,
}

impl LinkingConfig {
    pub fn secret_ttl(&self) -> Duration {
        Duration::from_secs(self.secret_ttl_secs)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("funnelbot.db")
}

fn default_secret_ttl_secs() -> u64 {
    60
}

fn default_sweep_limit() -> usize {
    256
}

fn default_secret_len() -> usize {
    48
}

fn default_database_config() -> DatabaseConfig {
    DatabaseConfig {
        path: default_db_path(),
    }
}

fn default_linking_config() -> LinkingConfig {
    LinkingConfig {
        secret_ttl_secs: default_secret_ttl_secs(),
        sweep_limit: default_sweep_limit(),
        secret_len: default_secret_len(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "token"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("funnelbot.db"));
        assert_eq!(config.linking.secret_ttl(), Duration::from_secs(60));
        assert_eq!(config.linking.sweep_limit, 256);
        assert_eq!(config.linking.secret_len, 48);
    }

    #[test]
    fn linking_section_overrides_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "token"

            [linking]
            secret_ttl_secs = 5
            sweep_limit = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.linking.secret_ttl(), Duration::from_secs(5));
        assert_eq!(config.linking.sweep_limit, 16);
        assert_eq!(config.linking.secret_len, 48);
    }
}
