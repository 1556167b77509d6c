// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const ENV_STORE_URI: &str = "MONGODB_URI";
pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "HOST";
pub const ENV_WORKERS: &str = "SEQBENCH_WORKERS";
pub const ENV_STORE_TIMEOUT_MS: &str = "SEQBENCH_STORE_TIMEOUT_MS";
pub const ENV_MAX_POOL_SIZE: &str = "MONGODB_MAX_POOL_SIZE";
/// Set by the supervisor on each child it launches.
pub const ENV_WORKER_SLOT: &str = "SEQBENCH_WORKER_SLOT";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub store_uri: String,
    pub bind_addr: SocketAddr,
    /// Worker processes to keep alive. Defaults to the available cores.
    pub workers: usize,
    pub store_timeout: Duration,
    pub max_pool_size: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            store_uri: String::new(),
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000),
            workers: available_cores(),
            store_timeout: seqbench::config::DEFAULT_STORE_TIMEOUT,
            max_pool_size: 100,
        }
    }
}

impl NodeConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Only the store URI is mandatory.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store_uri = lookup(ENV_STORE_URI)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_STORE_URI))?;

        let host: IpAddr = parse_or(&lookup, ENV_HOST, defaults.bind_addr.ip())?;
        let port: u16 = parse_or(&lookup, ENV_PORT, defaults.bind_addr.port())?;

        let workers: usize = parse_or(&lookup, ENV_WORKERS, defaults.workers)?;
        if workers == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_WORKERS,
                value: "0".into(),
            });
        }

        let timeout_ms: u64 =
            parse_or(&lookup, ENV_STORE_TIMEOUT_MS, defaults.store_timeout.as_millis() as u64)?;
        let max_pool_size: u32 = parse_or(&lookup, ENV_MAX_POOL_SIZE, defaults.max_pool_size)?;

        Ok(Self {
            store_uri,
            bind_addr: SocketAddr::new(host, port),
            workers,
            store_timeout: Duration::from_millis(timeout_ms),
            max_pool_size,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
