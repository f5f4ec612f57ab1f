use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub mode: AppMode,
    /// 5-field cron expression for the recurring report computation.
    pub report_schedule: String,
    pub duckdb_memory_limit: String,
    pub rate_limit_disable: bool,
}

/// Debug mode enables the ping `date` override and disables rate limits so
/// integration tests can replay historical fixtures.
#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Production,
    Debug,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("PULSE_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid PULSE_PORT: {e}"))?,
            data_dir: std::env::var("PULSE_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            mode: {
                let raw = std::env::var("PULSE_ENV").unwrap_or_else(|_| "production".to_string());
                match raw.as_str() {
                    "debug" | "test" => AppMode::Debug,
                    "production" => AppMode::Production,
                    other => return Err(format!("invalid PULSE_ENV: {other}")),
                }
            },
            report_schedule: std::env::var("PULSE_REPORT_SCHEDULE")
                .unwrap_or_else(|_| "30 23 * * 6".to_string()),
            duckdb_memory_limit: std::env::var("PULSE_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            rate_limit_disable: std::env::var("PULSE_RATE_LIMIT_DISABLE")
                .map(|v| v == "true")
                .unwrap_or(false),
        })
    }

    pub fn is_debug(&self) -> bool {
        self.mode == AppMode::Debug
    }

    /// Rate limits are off in debug mode or when explicitly disabled.
    pub fn rate_limits_enabled(&self) -> bool {
        !self.is_debug() && !self.rate_limit_disable
    }
}

/// Shared handle to the current configuration snapshot.
///
/// Components read an immutable `Arc<Config>` per use and never hold a
/// mutable live object. An external collaborator (SIGHUP handler, file
/// watcher) calls [`ConfigHandle::reload`], which re-reads the environment,
/// re-validates, and atomically swaps the snapshot; a failed reload leaves
/// the previous snapshot in place.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The current snapshot. Cheap; callers should not cache it across
    /// await points longer than one logical operation.
    pub fn current(&self) -> Arc<Config> {
        Arc::clone(&self.inner.read().expect("config lock poisoned"))
    }

    /// Re-read and validate the environment, then swap the snapshot.
    pub fn reload(&self) -> Result<(), String> {
        let fresh = Config::from_env()?;
        let mut slot = self.inner.write().expect("config lock poisoned");
        *slot = Arc::new(fresh);
        Ok(())
    }
}
