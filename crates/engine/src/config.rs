//! `EngineConfig`: layered configuration for the engine and
//! its ambient collaborators, loaded the way a homeserver loads its own
//! `ServerConfig` — a TOML file overridden by prefixed environment
//! variables, via `figment`. Unset optional values fall back to the
//! defaults documented below; a malformed file or a missing mandatory field
//! (`db.url`) fails fast at startup rather than degrading silently.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use roomstream_data::DbConfig;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

fn default_max_batch_size() -> i64 {
    1000
}

fn default_fanout_concurrency() -> usize {
    20
}

fn default_change_cache_capacity() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamConfig {
    /// Lower clamp applied to `limit` for the appservice stream (application
    /// services tolerate large batches); also used as the default when the
    /// caller passes zero or none.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: i64,
    /// Bound on concurrent per-room queries in the cross-room fan-out.
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
    /// Capacity of each `ChangeCache` instance (room and membership).
    #[serde(default = "default_change_cache_capacity")]
    pub change_cache_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            fanout_concurrency: default_fanout_concurrency(),
            change_cache_capacity: default_change_cache_capacity(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl EngineConfig {
    /// Loads configuration from `path` (defaulting to `roomstream.toml`),
    /// overridden by `ROOMSTREAM_`-prefixed environment variables. Mirrors
    /// a homeserver's `config::init` except it returns the error instead of
    /// exiting the process, so callers (including tests) can handle a
    /// malformed config themselves.
    pub fn load(path: Option<&str>) -> EngineResult<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.unwrap_or("roomstream.toml")))
            .merge(Env::prefixed("ROOMSTREAM_").split("_").global());

        figment
            .extract()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_db_url_fails_fast() {
        // No config file, no environment overrides: `db.url` has no default
        // and extraction must fail rather than substitute an empty string.
        let result: Result<EngineConfig, _> = Figment::new().extract();
        assert!(result.is_err());
    }

    #[test]
    fn stream_defaults_are_sane() {
        let stream = StreamConfig::default();
        assert_eq!(stream.max_batch_size, 1000);
        assert_eq!(stream.fanout_concurrency, 20);
    }
}
