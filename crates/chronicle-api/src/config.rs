//! Server configuration.
//!
//! Values come from built-in defaults, then an optional YAML file named by
//! `CHRONICLE_CONFIG`, then environment variables; later sources win.

use std::str::FromStr;
use std::time::Duration;

use chronicle_replay::ReplayConfig;
use serde::Deserialize;

use crate::error::AppError;

/// Everything the server binary needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Pool size.
    pub db_max_connections: u32,
    /// Apply pending migrations on startup.
    pub run_migrations: bool,
    /// OTLP gRPC endpoint; span export is off when absent.
    pub otlp_endpoint: Option<String>,
    /// Event types routed to the audit-log replay handler.
    pub replay_event_types: Vec<String>,
    /// Replay engine tunables.
    pub replay: ReplayConfig,
}

/// Shape of the optional YAML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    replay: ReplaySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplaySection {
    event_types: Option<Vec<String>>,
    default_batch_size: Option<u32>,
    max_batch_size: Option<u32>,
    fetch_timeout_ms: Option<u64>,
    dispatch_timeout_ms: Option<u64>,
    max_fetch_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    max_retry_backoff_ms: Option<u64>,
    fail_fast: Option<bool>,
    max_concurrent_streams: Option<usize>,
    max_recorded_failures: Option<usize>,
}

impl ReplaySection {
    fn apply(self, replay: &mut ReplayConfig) {
        if let Some(v) = self.default_batch_size {
            replay.default_batch_size = v;
        }
        if let Some(v) = self.max_batch_size {
            replay.max_batch_size = v;
        }
        if let Some(v) = self.fetch_timeout_ms {
            replay.fetch_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.dispatch_timeout_ms {
            replay.dispatch_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.max_fetch_retries {
            replay.max_fetch_retries = v;
        }
        if let Some(v) = self.retry_backoff_ms {
            replay.retry_backoff = Duration::from_millis(v);
        }
        if let Some(v) = self.max_retry_backoff_ms {
            replay.max_retry_backoff = Duration::from_millis(v);
        }
        if let Some(v) = self.fail_fast {
            replay.fail_fast = v;
        }
        if let Some(v) = self.max_concurrent_streams {
            replay.max_concurrent_streams = v;
        }
        if let Some(v) = self.max_recorded_failures {
            replay.max_recorded_failures = v;
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable or file.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, loading the YAML file named by
    /// `CHRONICLE_CONFIG` from disk.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable or file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let file = match lookup("CHRONICLE_CONFIG") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("CHRONICLE_CONFIG: cannot read {path}: {e}"))
            })?),
            None => None,
        };
        Self::from_sources(lookup, file.as_deref())
    }

    /// Builds configuration from `lookup` layered over an optional YAML
    /// document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable or file.
    pub fn from_sources(
        lookup: impl Fn(&str) -> Option<String>,
        yaml: Option<&str>,
    ) -> Result<Self, AppError> {
        let file: FileConfig = match yaml {
            Some(text) => serde_yaml::from_str(text)
                .map_err(|e| AppError::Config(format!("CHRONICLE_CONFIG: {e}")))?,
            None => FileConfig::default(),
        };

        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".into())
        })?;

        let mut replay_event_types = file.replay.event_types.clone().unwrap_or_default();
        let mut replay = ReplayConfig::default();
        file.replay.apply(&mut replay);

        if let Some(list) = lookup("REPLAY_EVENT_TYPES") {
            replay_event_types = list
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect();
        }
        override_with(&lookup, "REPLAY_DEFAULT_BATCH_SIZE", &mut replay.default_batch_size)?;
        override_with(&lookup, "REPLAY_MAX_BATCH_SIZE", &mut replay.max_batch_size)?;
        override_millis(&lookup, "REPLAY_FETCH_TIMEOUT_MS", &mut replay.fetch_timeout)?;
        override_millis(&lookup, "REPLAY_DISPATCH_TIMEOUT_MS", &mut replay.dispatch_timeout)?;
        override_with(&lookup, "REPLAY_MAX_FETCH_RETRIES", &mut replay.max_fetch_retries)?;
        override_millis(&lookup, "REPLAY_RETRY_BACKOFF_MS", &mut replay.retry_backoff)?;
        override_millis(
            &lookup,
            "REPLAY_MAX_RETRY_BACKOFF_MS",
            &mut replay.max_retry_backoff,
        )?;
        override_with(&lookup, "REPLAY_FAIL_FAST", &mut replay.fail_fast)?;
        override_with(
            &lookup,
            "REPLAY_MAX_CONCURRENT_STREAMS",
            &mut replay.max_concurrent_streams,
        )?;
        override_with(
            &lookup,
            "REPLAY_MAX_RECORDED_FAILURES",
            &mut replay.max_recorded_failures,
        )?;
        replay
            .validate()
            .map_err(|e| AppError::Config(format!("replay settings: {e}")))?;

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
            replay_event_types,
            replay,
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{key} must be a valid value: {e}")))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| parse(key, &raw))
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<(), AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = parse(key, &raw)?;
    }
    Ok(())
}

fn override_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut Duration,
) -> Result<(), AppError> {
    if let Some(raw) = lookup(key) {
        *target = Duration::from_millis(parse(key, &raw)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config = AppConfig::from_sources(env(&[("DATABASE_URL", "postgres://db")]), None)
            .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_max_connections, 10);
        assert!(config.run_migrations);
        assert!(config.otlp_endpoint.is_none());
        assert!(config.replay_event_types.is_empty());
        assert_eq!(config.replay, ReplayConfig::default());
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = AppConfig::from_sources(env(&[]), None);

        match result {
            Err(AppError::Config(msg)) => assert!(msg.contains("DATABASE_URL")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_port_names_the_variable() {
        let result = AppConfig::from_sources(
            env(&[("DATABASE_URL", "postgres://db"), ("PORT", "http")]),
            None,
        );

        match result {
            Err(AppError::Config(msg)) => assert!(msg.starts_with("PORT")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_overrides_yaml_file() {
        // Arrange
        let yaml = "
replay:
  event_types: [OrderPlaced]
  default_batch_size: 200
  dispatch_timeout_ms: 2500
  fail_fast: true
";
        let lookup = env(&[
            ("DATABASE_URL", "postgres://db"),
            ("REPLAY_DEFAULT_BATCH_SIZE", "50"),
            ("REPLAY_EVENT_TYPES", "OrderPlaced, OrderShipped,"),
        ]);

        // Act
        let config = AppConfig::from_sources(lookup, Some(yaml)).unwrap();

        // Assert
        assert_eq!(config.replay.default_batch_size, 50);
        assert_eq!(config.replay.dispatch_timeout, Duration::from_millis(2500));
        assert!(config.replay.fail_fast);
        assert_eq!(config.replay_event_types, vec!["OrderPlaced", "OrderShipped"]);
    }

    #[test]
    fn test_unknown_yaml_key_is_rejected() {
        let result = AppConfig::from_sources(
            env(&[("DATABASE_URL", "postgres://db")]),
            Some("replay:\n  batch: 10\n"),
        );

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_inconsistent_replay_settings_are_rejected() {
        let result = AppConfig::from_sources(
            env(&[
                ("DATABASE_URL", "postgres://db"),
                ("REPLAY_MAX_BATCH_SIZE", "10"),
                ("REPLAY_DEFAULT_BATCH_SIZE", "20"),
            ]),
            None,
        );

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
