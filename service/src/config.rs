use std::str::FromStr;

pub const REDIS_URL: &str = "NMC_REDIS_URL";
pub const REDIS_MIN_IDLE: &str = "NMC_REDIS_MIN_IDLE";
pub const KEY_PREFIX: &str = "NMC_KEY_PREFIX";
pub const CHANGE_CAPACITY: &str = "NMC_CHANGE_CAPACITY";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("`{name}` must be a non-negative number, got `{value}`")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Absent means the in-memory store.
    pub redis_url: Option<String>,
    pub redis_min_idle: u32,
    pub key_prefix: String,
    /// Buffer of the change notification channel feeding live queries.
    pub change_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            redis_url: None,
            redis_min_idle: 4,
            key_prefix: "nmc".to_string(),
            change_capacity: 64,
        }
    }
}

fn parse_number<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => match value.trim().parse() {
            Ok(number) => Ok(number),
            Err(_) => Err(ConfigError::InvalidNumber { name, value }),
        },
        None => Ok(default),
    }
}

impl ServiceConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            tracing::debug!("no .env loaded: {}", err);
        }
        ServiceConfig::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServiceConfig::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(ServiceConfig {
            redis_url: non_empty(REDIS_URL),
            redis_min_idle: parse_number(
                REDIS_MIN_IDLE,
                non_empty(REDIS_MIN_IDLE),
                defaults.redis_min_idle,
            )?,
            key_prefix: non_empty(KEY_PREFIX).unwrap_or(defaults.key_prefix),
            change_capacity: parse_number(
                CHANGE_CAPACITY,
                non_empty(CHANGE_CAPACITY),
                defaults.change_capacity,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (REDIS_URL, "redis://localhost:6379"),
            (REDIS_MIN_IDLE, "2"),
            (KEY_PREFIX, "staging"),
            (CHANGE_CAPACITY, " 128 "),
        ]))
        .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.redis_min_idle, 2);
        assert_eq!(config.key_prefix, "staging");
        assert_eq!(config.change_capacity, 128);
    }

    #[test]
    fn test_blank_url_means_memory() {
        let config = ServiceConfig::from_lookup(lookup(&[(REDIS_URL, "  ")])).unwrap();
        assert_eq!(config.redis_url, None);
    }

    #[test]
    fn test_invalid_number() {
        let err = ServiceConfig::from_lookup(lookup(&[(REDIS_MIN_IDLE, "four")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                name: REDIS_MIN_IDLE,
                value: "four".to_string()
            }
        );
    }
}
