//! Process configuration from `BATTLELOG_*` environment variables.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::parallel::WorkerPool;

pub const BIND_VAR: &str = "BATTLELOG_BIND";
pub const WORKERS_VAR: &str = "BATTLELOG_WORKERS";
pub const MAX_BODY_VAR: &str = "BATTLELOG_MAX_BODY_BYTES";

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Worker threads for batch parsing; 0 uses the rayon default.
    pub workers: usize,
    /// Largest request body the server accepts.
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            workers: 0,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values keep the
    /// default and are reported.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let bind_addr = lookup(BIND_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.bind_addr);
        Self {
            bind_addr,
            workers: parsed_or(&lookup, WORKERS_VAR, defaults.workers),
            max_body_bytes: parsed_or(&lookup, MAX_BODY_VAR, defaults.max_body_bytes),
        }
    }

    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::with_workers(self.workers)
    }
}

fn parsed_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    raw.trim().parse::<T>().unwrap_or_else(|_| {
        warn!(variable = name, value = raw.as_str(), %default, "invalid value, using default");
        default
    })
}
