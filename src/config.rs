use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_QPS, ENV_API_KEY, ENV_BASE_URL, ENV_DATABASE_URL,
    ENV_RATE_LIMIT_QPS, MIN_QPS,
};
use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Process configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_key: String,
    pub base_url: String,
    pub qps: f64,
    pub http: HttpSettings,
}

/// Optional tunables file (`--config`). Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_factor_secs: f64,
    pub backoff_max_secs: f64,
    pub rate_limit_cooldown_secs: f64,
    pub min_qps: f64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 5,
            backoff_factor_secs: 0.7,
            backoff_max_secs: 120.0,
            rate_limit_cooldown_secs: 2.0,
            min_qps: MIN_QPS,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Tunables {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let tunables: Tunables = toml::from_str(&content)?;
        Ok(tunables)
    }
}

impl Config {
    /// Load from the process environment, optionally layering a tunables file.
    pub fn load(tunables_path: Option<&Path>) -> Result<Self> {
        let tunables = match tunables_path {
            Some(path) => Tunables::load(path)?,
            None => Tunables::default(),
        };
        Self::from_lookup(|key| std::env::var(key).ok(), tunables)
    }

    pub fn from_lookup<F>(lookup: F, tunables: Tunables) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EtlError::Config(format!("{} is not set in environment", key)))
        };

        let database_url = required(ENV_DATABASE_URL)?;
        let api_key = required(ENV_API_KEY)?;
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // zero and negative values are floored to `http.min_qps` by the rate limiter
        let qps = match lookup(ENV_RATE_LIMIT_QPS) {
            Some(raw) => raw.trim().parse::<f64>().map_err(|e| {
                EtlError::Config(format!(
                    "{} must be a number, got '{}': {}",
                    ENV_RATE_LIMIT_QPS, raw, e
                ))
            })?,
            None => DEFAULT_QPS,
        };
        if !qps.is_finite() {
            return Err(EtlError::Config(format!(
                "{} must be a finite number, got {}",
                ENV_RATE_LIMIT_QPS, qps
            )));
        }

        Ok(Self {
            database_url,
            api_key,
            base_url,
            qps,
            http: tunables.http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ManualClock;
    use crate::pipeline::ingestion::RateLimiter;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let vars = env(&[(ENV_DATABASE_URL, ":memory:"), (ENV_API_KEY, "secret")]);
        let cfg = Config::from_lookup(|k| vars.get(k).cloned(), Tunables::default()).unwrap();

        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.qps, DEFAULT_QPS);
        assert_eq!(cfg.http.max_retries, 5);
        assert_eq!(cfg.http.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let vars = env(&[(ENV_DATABASE_URL, ":memory:")]);
        let err = Config::from_lookup(|k| vars.get(k).cloned(), Tunables::default()).unwrap_err();
        assert!(matches!(err, EtlError::Config(ref m) if m.contains(ENV_API_KEY)));
    }

    #[test]
    fn test_overrides_and_bad_qps() {
        let vars = env(&[
            (ENV_DATABASE_URL, "sqlite://etl.db"),
            (ENV_API_KEY, "secret"),
            (ENV_BASE_URL, "http://localhost:8080/api"),
            (ENV_RATE_LIMIT_QPS, "10"),
        ]);
        let cfg = Config::from_lookup(|k| vars.get(k).cloned(), Tunables::default()).unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8080/api");
        assert_eq!(cfg.qps, 10.0);

        let bad = env(&[
            (ENV_DATABASE_URL, ":memory:"),
            (ENV_API_KEY, "secret"),
            (ENV_RATE_LIMIT_QPS, "fast"),
        ]);
        assert!(Config::from_lookup(|k| bad.get(k).cloned(), Tunables::default()).is_err());

        let inf = env(&[
            (ENV_DATABASE_URL, ":memory:"),
            (ENV_API_KEY, "secret"),
            (ENV_RATE_LIMIT_QPS, "inf"),
        ]);
        assert!(Config::from_lookup(|k| inf.get(k).cloned(), Tunables::default()).is_err());
    }

    #[test]
    fn test_zero_and_negative_qps_fall_to_floor() {
        for raw in ["0", "-2.5"] {
            let vars = env(&[
                (ENV_DATABASE_URL, ":memory:"),
                (ENV_API_KEY, "secret"),
                (ENV_RATE_LIMIT_QPS, raw),
            ]);
            let cfg = Config::from_lookup(|k| vars.get(k).cloned(), Tunables::default()).unwrap();
            assert_eq!(cfg.qps, raw.parse::<f64>().unwrap());

            let limiter = RateLimiter::from_qps(
                cfg.qps,
                cfg.http.min_qps,
                Arc::new(ManualClock::new()),
            );
            assert_eq!(limiter.min_interval(), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_tunables_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nmax_retries = 2\nbackoff_factor_secs = 0.1").unwrap();

        let tunables = Tunables::load(file.path()).unwrap();
        assert_eq!(tunables.http.max_retries, 2);
        assert_eq!(tunables.http.backoff_factor_secs, 0.1);
        assert_eq!(tunables.http.timeout_secs, 30);
    }
}
