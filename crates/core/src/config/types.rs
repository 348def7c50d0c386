use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::manager::SyncManagerConfig;
use crate::syncer::SyncerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Admin API key, required when method = "api_key".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("hubsync.db")
}

/// Mirror sync configuration: worker manager plus sync worker settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(flatten)]
    pub manager: SyncManagerConfig,
    #[serde(flatten)]
    pub syncer: SyncerConfig,
}

/// Config view safe to expose over the API: secrets are masked.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth_method: AuthMethod,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth_method: config.auth.method,
            server: config.server.clone(),
            database: config.database.clone(),
            sync: config.sync.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.port, 8080);
        assert_eq!(server.host.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_sync_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.manager.worker_count, 4);
        assert_eq!(sync.manager.dispatch_retry_ms, 5000);
        assert_eq!(sync.syncer.batch_timeout_secs, 30);
    }

    #[test]
    fn test_sanitized_config_has_no_api_key() {
        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some("secret".to_string()),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
        };
        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("api_key"));
    }
}
