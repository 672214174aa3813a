//! Environment-driven server configuration.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

pub struct Config {
    /// Filesystem path of the rocksdb store.
    pub db_path: String,
    pub bind_addr: SocketAddr,
    /// When set, a granted fetch also counts the view. The default defers
    /// counting to the view endpoint, fired by clients on reveal.
    pub count_on_fetch: bool,
    pub reap_interval: Duration,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self {
            db_path: env::var("PASTEGATE_DB_PATH").unwrap_or_else(|_| "database".to_owned()),
            bind_addr: parse_or("PASTEGATE_BIND_ADDR", ([0, 0, 0, 0], 8080).into()),
            count_on_fetch: parse_or("PASTEGATE_COUNT_ON_FETCH", false),
            reap_interval: Duration::from_secs(parse_or("PASTEGATE_REAP_INTERVAL_SECS", 300)),
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("invalid {} value {:?} ({}), using default {}", key, raw, e, default);
            default
        }),
        Err(_) => {
            info!("{} not set, using default: {}", key, default);
            default
        }
    }
}
