//! Connection configuration loaded from the environment.
//!
//! `DATABASE_URL` addresses the database Loads write into. The meta-tables
//! (`run`/`gen_run`/`repeats`/`row_errors`, §4.6) have their own bookkeeping
//! lifecycle — a run needs to record its own status even when a Load target
//! is unreachable — so they resolve their connection independently via
//! [`DbConfig::meta`], which only falls back to `DATABASE_URL` when
//! `META_DATABASE_URL` is unset (the common single-instance deployment).

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let min_connections = env::var("DATABASE_MIN_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(2);
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(16);
        Self { url, min_connections, max_connections }
    }

    /// Resolves the meta-tables' own connection settings: `META_DATABASE_URL`
    /// falls back to this config's `url`, and `META_DATABASE_MIN/MAX_CONNECTIONS`
    /// each fall back to this config's own pool size rather than a hardcoded
    /// default, so a deployment that only overrides the URL doesn't also have
    /// to repeat its pool sizing.
    pub fn meta(&self) -> Self {
        let url = env::var("META_DATABASE_URL").unwrap_or_else(|_| self.url.clone());
        let min_connections = env::var("META_DATABASE_MIN_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.min_connections);
        let max_connections = env::var("META_DATABASE_MAX_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_connections);
        Self { url, min_connections, max_connections }
    }
}

pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
