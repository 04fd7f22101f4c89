use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use crate::store::DurabilityMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(anyhow!("LOG_FORMAT must be one of: pretty, json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub durability: DurabilityMode,
    pub checkpoint_every: usize,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub session_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub cors_allow_origin: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: None,
            durability: DurabilityMode::Async,
            checkpoint_every: 500,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: "http://localhost:8080".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            session_ttl_hours: 168,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_allow_origin: "*".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// One year; larger values overflow the session expiry arithmetic.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so callers other than the
    /// process environment can feed it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let durability = match lookup("DURABILITY") {
            Some(raw) => raw.parse::<DurabilityMode>().map_err(|e| anyhow!(e))?,
            None => defaults.durability,
        };

        let bcrypt_cost = parse_var(&lookup, "BCRYPT_COST", defaults.bcrypt_cost)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(anyhow!("BCRYPT_COST must be between 4 and 31"));
        }

        let session_ttl_hours =
            parse_var(&lookup, "SESSION_TTL_HOURS", defaults.session_ttl_hours)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(anyhow!(
                "SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}"
            ));
        }

        Ok(Self {
            host: lookup("APP_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "APP_PORT", defaults.port)?,
            data_dir: lookup("DATA_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            durability,
            checkpoint_every: parse_var(&lookup, "CHECKPOINT_EVERY", defaults.checkpoint_every)?,
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: lookup("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            session_ttl_hours,
            bcrypt_cost,
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN").unwrap_or(defaults.cors_allow_origin),
            log_format: match lookup("LOG_FORMAT") {
                Some(raw) => raw.parse()?,
                None => defaults.log_format,
            },
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.max_upload_bytes, 5_242_880);
        assert_eq!(config.durability, DurabilityMode::Async);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn overrides_are_read_from_the_lookup() {
        let config = config_from(&[
            ("APP_PORT", " 9090 "),
            ("DATA_DIR", "/var/lib/foodshare"),
            ("DURABILITY", "sync"),
            ("SESSION_TTL_HOURS", "24"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/foodshare")));
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = config_from(&[("APP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("APP_PORT must be a valid u16"));

        let err = config_from(&[("MAX_UPLOAD_BYTES", "-1")]).unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn session_ttl_must_stay_in_range() {
        for raw in ["0", "-5", "9223372036854775807"] {
            let err = config_from(&[("SESSION_TTL_HOURS", raw)]).unwrap_err();
            assert_eq!(
                err.to_string(),
                "SESSION_TTL_HOURS must be between 1 and 8760"
            );
        }
        assert!(config_from(&[("SESSION_TTL_HOURS", "8760")]).is_ok());
    }

    #[test]
    fn bcrypt_cost_is_bounded() {
        let err = config_from(&[("BCRYPT_COST", "3")]).unwrap_err();
        assert_eq!(err.to_string(), "BCRYPT_COST must be between 4 and 31");
    }
}
