use crate::domain::TradeScope;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// Base URL of the instrument search service; `None` disables lookups.
    pub instrument_lookup_url: Option<String>,
    pub lookup_timeout: Duration,
    pub micro_hint_ttl: Duration,
    pub recalc_concurrency: usize,
    pub recalc_scope: TradeScope,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let instrument_lookup_url = env_map
            .get("INSTRUMENT_LOOKUP_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let lookup_timeout_ms = parse_u64(&env_map, "LOOKUP_TIMEOUT_MS", "3000")?;
        let micro_hint_ttl_secs = parse_u64(&env_map, "MICRO_HINT_TTL_SECS", "86400")?;

        let recalc_concurrency = env_map
            .get("RECALC_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("8")
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "RECALC_CONCURRENCY".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let recalc_scope = env_map
            .get("RECALC_SCOPE")
            .map(|s| s.as_str())
            .unwrap_or("all")
            .parse::<TradeScope>()
            .map_err(|e| {
                ConfigError::InvalidValue(
                    "RECALC_SCOPE".to_string(),
                    format!("must be all or active, got {}", e.value),
                )
            })?;

        Ok(Config {
            database_path,
            instrument_lookup_url,
            lookup_timeout: Duration::from_millis(lookup_timeout_ms),
            micro_hint_ttl: Duration::from_secs(micro_hint_ttl_secs),
            recalc_concurrency,
            recalc_scope,
        })
    }
}

fn parse_u64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.database_path, "/tmp/test.db");
        assert_eq!(config.instrument_lookup_url, None);
        assert_eq!(config.lookup_timeout, Duration::from_millis(3000));
        assert_eq!(config.micro_hint_ttl, Duration::from_secs(86_400));
        assert_eq!(config.recalc_concurrency, 8);
        assert_eq!(config.recalc_scope, TradeScope::All);
    }

    #[test]
    fn test_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "INSTRUMENT_LOOKUP_URL".to_string(),
            "https://query1.finance.yahoo.com/".to_string(),
        );
        env_map.insert("LOOKUP_TIMEOUT_MS".to_string(), "250".to_string());
        env_map.insert("RECALC_CONCURRENCY".to_string(), "2".to_string());
        env_map.insert("RECALC_SCOPE".to_string(), "active".to_string());

        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.instrument_lookup_url.as_deref(),
            Some("https://query1.finance.yahoo.com")
        );
        assert_eq!(config.lookup_timeout, Duration::from_millis(250));
        assert_eq!(config.recalc_concurrency, 2);
        assert_eq!(config.recalc_scope, TradeScope::Active);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_blank_lookup_url_disables_lookups() {
        let mut env_map = setup_required_env();
        env_map.insert("INSTRUMENT_LOOKUP_URL".to_string(), "  ".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.instrument_lookup_url, None);
    }

    #[test]
    fn test_invalid_lookup_timeout() {
        let mut env_map = setup_required_env();
        env_map.insert("LOOKUP_TIMEOUT_MS".to_string(), "soon".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "LOOKUP_TIMEOUT_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("RECALC_CONCURRENCY".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RECALC_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_recalc_scope() {
        let mut env_map = setup_required_env();
        env_map.insert("RECALC_SCOPE".to_string(), "deleted".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RECALC_SCOPE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
