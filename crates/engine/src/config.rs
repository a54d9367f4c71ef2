//! Environment-driven engine configuration.
//!
//! All knobs come from `GRIDHALL_*` environment variables (a `.env` file is
//! honored in development, see `main`). Missing or unparseable values fall
//! back to the documented defaults rather than aborting startup.

use std::str::FromStr;
use std::time::Duration;

/// Which overlay store backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayBackendKind {
    /// In-process maps; overlay state dies with the process.
    Memory,
    /// Shared SQLite database; overlay state survives restarts and can be
    /// served by several engine processes at once.
    Sqlite,
}

impl FromStr for OverlayBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown overlay backend '{}'", other)),
        }
    }
}

/// Typed snapshot of the engine's environment configuration.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub port: u16,
    pub bind_addr: String,
    /// CORS origin list; `None` or `"*"` means permissive.
    pub cors_origin: Option<String>,
    pub overlay_backend: OverlayBackendKind,
    /// SQLite database path, used only with the sqlite backend.
    pub overlay_db: String,
    /// Tables with no overlay activity for this long get swept.
    pub overlay_max_idle: Duration,
    /// How often the idle reaper wakes up.
    pub reaper_interval: Duration,
    /// Development credential seed list: comma-separated `token=user-uuid`
    /// pairs, consumed by the bearer registry.
    pub auth_tokens: String,
    /// When set, startup seeds one demo table owned by this user so a fresh
    /// process has something to join. Development only.
    pub seed_gm: Option<uuid::Uuid>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            port: 8443,
            bind_addr: "0.0.0.0".to_string(),
            cors_origin: None,
            overlay_backend: OverlayBackendKind::Memory,
            overlay_db: "gridhall-overlays.db".to_string(),
            overlay_max_idle: Duration::from_secs(3600),
            reaper_interval: Duration::from_secs(300),
            auth_tokens: String::new(),
            seed_gm: None,
        }
    }
}

impl AppSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let overlay_backend = match std::env::var("GRIDHALL_OVERLAY_BACKEND") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Falling back to the memory overlay backend");
                defaults.overlay_backend
            }),
            Err(_) => defaults.overlay_backend,
        };

        Self {
            port: env_parsed("GRIDHALL_PORT", defaults.port),
            bind_addr: env_string("GRIDHALL_BIND_ADDR", &defaults.bind_addr),
            cors_origin: std::env::var("GRIDHALL_CORS_ORIGIN").ok(),
            overlay_backend,
            overlay_db: env_string("GRIDHALL_OVERLAY_DB", &defaults.overlay_db),
            overlay_max_idle: Duration::from_secs(env_parsed(
                "GRIDHALL_OVERLAY_MAX_IDLE_SECS",
                defaults.overlay_max_idle.as_secs(),
            )),
            reaper_interval: Duration::from_secs(env_parsed(
                "GRIDHALL_REAPER_INTERVAL_SECS",
                defaults.reaper_interval.as_secs(),
            )),
            auth_tokens: env_string("GRIDHALL_AUTH_TOKENS", &defaults.auth_tokens),
            seed_gm: match std::env::var("GRIDHALL_SEED_GM") {
                Ok(raw) => match raw.parse() {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed GRIDHALL_SEED_GM");
                        None
                    }
                },
                Err(_) => None,
            },
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_known_names() {
        assert_eq!(
            "memory".parse::<OverlayBackendKind>().unwrap(),
            OverlayBackendKind::Memory
        );
        assert_eq!(
            "SQLite".parse::<OverlayBackendKind>().unwrap(),
            OverlayBackendKind::Sqlite
        );
        assert!("redis".parse::<OverlayBackendKind>().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = AppSettings::default();
        assert_eq!(settings.port, 8443);
        assert_eq!(settings.bind_addr, "0.0.0.0");
        assert_eq!(settings.overlay_backend, OverlayBackendKind::Memory);
        assert_eq!(settings.overlay_max_idle, Duration::from_secs(3600));
        assert_eq!(settings.reaper_interval, Duration::from_secs(300));
        assert!(settings.cors_origin.is_none());
    }
}
