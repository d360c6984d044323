// Server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. All timing knobs are plain durations so the reaper and
// the store never re-parse anything at runtime.

use std::net::SocketAddr;
use std::time::Duration;

pub(crate) const DEFAULT_SESSION_IDLE_TIMEOUT_MS: u64 = 1_800_000;
pub(crate) const DEFAULT_SESSION_MAX_AGE_MS: u64 = 14_400_000;
pub(crate) const DEFAULT_REAP_INTERVAL_MS: u64 = 300_000;

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to sensible development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `codepair_server=debug`).
    pub log_filter: String,
    /// Base URL for generated session share links.
    pub share_link_base_url: String,
    /// Sessions idle longer than this are reclaimed.
    pub session_idle_timeout: Duration,
    /// Sessions older than this are reclaimed regardless of activity.
    pub session_max_age: Duration,
    /// How often the reclamation task scans the store.
    pub reap_interval: Duration,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CODEPAIR_HOST` | `0.0.0.0` |
    /// | `CODEPAIR_PORT` | `8080` |
    /// | `CODEPAIR_CORS_ORIGINS` | *(none — cors.rs uses dev defaults)* |
    /// | `CODEPAIR_LOG_FILTER` | `info` |
    /// | `CODEPAIR_SHARE_LINK_BASE_URL` | `http://localhost:5173/session` |
    /// | `CODEPAIR_SESSION_IDLE_TIMEOUT_MS` | `1800000` (30 min) |
    /// | `CODEPAIR_SESSION_MAX_AGE_MS` | `14400000` (4 h) |
    /// | `CODEPAIR_REAP_INTERVAL_MS` | `300000` (5 min) |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("CODEPAIR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("CODEPAIR_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let cors_origins = env("CODEPAIR_CORS_ORIGINS").ok();

        let log_filter = env("CODEPAIR_LOG_FILTER").unwrap_or_else(|_| "info".into());

        let share_link_base_url = env("CODEPAIR_SHARE_LINK_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173/session".into());

        let session_idle_timeout = duration_ms(
            &env,
            "CODEPAIR_SESSION_IDLE_TIMEOUT_MS",
            DEFAULT_SESSION_IDLE_TIMEOUT_MS,
        );
        let session_max_age =
            duration_ms(&env, "CODEPAIR_SESSION_MAX_AGE_MS", DEFAULT_SESSION_MAX_AGE_MS);
        let reap_interval = duration_ms(&env, "CODEPAIR_REAP_INTERVAL_MS", DEFAULT_REAP_INTERVAL_MS);

        Self {
            listen_addr,
            cors_origins,
            log_filter,
            share_link_base_url,
            session_idle_timeout,
            session_max_age,
            reap_interval,
        }
    }

    /// Share link for a session id, e.g. `http://localhost:5173/session/{id}`.
    pub fn share_url(&self, session_id: uuid::Uuid) -> String {
        format!("{}/{}", self.share_link_base_url.trim_end_matches('/'), session_id)
    }
}

fn duration_ms<F>(env: &F, key: &str, default_ms: u64) -> Duration
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let ms = env(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}
