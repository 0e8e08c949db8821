use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

use crate::{booking::DEFAULT_DRIVER_PLACEHOLDER, cache::CacheSettings};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub google_maps_api_key: String,
    pub google_maps_api_base: String,
    pub listen_addr: SocketAddr,
    pub request_timeout: Duration,
    pub driver_placeholder: String,
    pub cache: CacheSettings,
    pub session_path: PathBuf,
    /// how long a ride is kept after it was last looked at
    pub ride_idle_timeout: Duration,
    /// logs go to stdout only when unset
    pub log_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // empty values count as unset
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let google_maps_api_key =
            get("GOOGLE_MAPS_API_KEY").ok_or(ConfigError::Missing("GOOGLE_MAPS_API_KEY"))?;

        let timeout_secs: u64 = parse(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(10);
        let ride_idle_secs: u64 = parse(&get, "RIDE_IDLE_TIMEOUT_SECS")?.unwrap_or(1800);

        Ok(Self {
            api_base_url: get("SMARTRIDE_API_BASE_URL")
                .unwrap_or_else(|| "http://localhost:5000/api".to_string()),
            google_maps_api_key,
            google_maps_api_base: get("GOOGLE_MAPS_API_BASE")
                .unwrap_or_else(|| "https://maps.googleapis.com".to_string()),
            listen_addr: parse(&get, "LISTEN_ADDR")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000))),
            request_timeout: Duration::from_secs(timeout_secs),
            driver_placeholder: get("DRIVER_PLACEHOLDER")
                .unwrap_or_else(|| DEFAULT_DRIVER_PLACEHOLDER.to_string()),
            cache: CacheSettings {
                max_capacity: parse(&get, "QUOTE_CACHE_MAX_CAPACITY")?,
                time_to_live: parse(&get, "QUOTE_CACHE_TTL_SECS")?.map(Duration::from_secs),
            },
            session_path: get("SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/session.json")),
            ride_idle_timeout: Duration::from_secs(ride_idle_secs),
            log_path: get("LOG_PATH").map(PathBuf::from),
        })
    }
}

fn parse<T: FromStr>(
    get: impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}
