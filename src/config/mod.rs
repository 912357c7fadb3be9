use std::env;

use crate::engine::EngineSettings;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    /// JSON device catalog; the built-in catalog is used when unset
    pub catalog_path: Option<String>,
    pub staged_ztp: bool,
    pub fabric_mtu: Option<u32>,
    pub pod_file: String,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    /// A `.env` file in the working directory is honored.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            db_path: get_env("DB_PATH", "/data/fabric.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            catalog_path: get_optional_env("CATALOG_PATH"),
            staged_ztp: parse_bool(&get_env("STAGED_ZTP", "false")),
            fabric_mtu: get_optional_env("FABRIC_MTU").and_then(|v| v.parse().ok()),
            pod_file: get_env("POD_FILE", "/data/pod.json"),
        }
    }

    /// Engine-relevant subset of the configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            staged_ztp: self.staged_ztp,
            fabric_mtu: self.fabric_mtu,
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_engine_settings_projection() {
        let cfg = Config {
            db_path: ":memory:".to_string(),
            db_max_connections: 1,
            catalog_path: None,
            staged_ztp: true,
            fabric_mtu: Some(9192),
            pod_file: "pod.json".to_string(),
        };
        assert_eq!(
            cfg.engine_settings(),
            EngineSettings {
                staged_ztp: true,
                fabric_mtu: Some(9192)
            }
        );
    }
}
