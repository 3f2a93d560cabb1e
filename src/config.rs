use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::crypto::DEFAULT_ITERATIONS;
use crate::media::DEFAULT_MAX_IMAGE_BYTES;

/// Application-level constants
pub const APP_NAME: &str = "Curesio";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DB_FILE_NAME: &str = "curesio.db";
pub const MEDIA_DIR_NAME: &str = "media";

/// Fallback tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "curesio=info,curesio_lib=info,tower_http=info"
}

/// Default data directory: `<platform data dir>/curesio`, or `./data` when
/// the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("curesio"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime configuration, read from `CURESIO_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub max_image_bytes: usize,
    pub password_iterations: u32,
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            bind_addr: DEFAULT_BIND.parse().unwrap_or(SocketAddr::from(([127, 0, 0, 1], 8000))),
            db_path: data_dir.join(DB_FILE_NAME),
            media_dir: data_dir.join(MEDIA_DIR_NAME),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            password_iterations: DEFAULT_ITERATIONS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup("CURESIO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);
        let mut config = Self::with_data_dir(&data_dir);

        if let Some(raw) = lookup("CURESIO_BIND") {
            config.bind_addr = parse("CURESIO_BIND", raw)?;
        }
        if let Some(raw) = lookup("CURESIO_DB_PATH") {
            config.db_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("CURESIO_MEDIA_DIR") {
            config.media_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("CURESIO_MAX_IMAGE_BYTES") {
            config.max_image_bytes = parse("CURESIO_MAX_IMAGE_BYTES", raw)?;
        }
        if let Some(raw) = lookup("CURESIO_PASSWORD_ITERATIONS") {
            config.password_iterations = parse("CURESIO_PASSWORD_ITERATIONS", raw)?;
            if config.password_iterations == 0 {
                return Err(ConfigError::Invalid {
                    var: "CURESIO_PASSWORD_ITERATIONS",
                    value: "0".into(),
                });
            }
        }
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_live_under_data_dir() {
        let config = Config::from_lookup(lookup(&[("CURESIO_DATA_DIR", "/srv/curesio")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/srv/curesio/curesio.db"));
        assert_eq!(config.media_dir, PathBuf::from("/srv/curesio/media"));
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_image_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn explicit_paths_override_data_dir() {
        let config = Config::from_lookup(lookup(&[
            ("CURESIO_DATA_DIR", "/srv/curesio"),
            ("CURESIO_DB_PATH", "/tmp/other.db"),
            ("CURESIO_BIND", "0.0.0.0:9000"),
            ("CURESIO_PASSWORD_ITERATIONS", "1000"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.media_dir, PathBuf::from("/srv/curesio/media"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.password_iterations, 1000);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("CURESIO_MAX_IMAGE_BYTES", "lots")])).unwrap_err();
        assert!(err.to_string().contains("CURESIO_MAX_IMAGE_BYTES"));
        assert!(Config::from_lookup(lookup(&[("CURESIO_PASSWORD_ITERATIONS", "0")])).is_err());
    }

    #[test]
    fn app_name_is_curesio() {
        assert_eq!(APP_NAME, "Curesio");
    }
}
