use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use pulse_core::config::{Config, ConfigHandle};
use pulse_duckdb::DuckDbBackend;

/// General limiter: 100 requests per IP per 10-second window.
const GENERAL_WINDOW: Duration = Duration::from_secs(10);
const GENERAL_MAX: usize = 100;

/// Ping limiter: one accepted `POST /ping` per IP per 24 hours.
const PING_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// Constructed once in `main` and passed by `Arc`; no ambient globals.
/// All fields are cheap to clone, heavy resources live behind `Arc`.
pub struct AppState {
    /// The DuckDB event store. Internally `Arc<tokio::sync::Mutex<Connection>>`,
    /// already async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Current configuration snapshot; swapped atomically on reload.
    pub config: ConfigHandle,

    /// Per-IP sliding-window rate limiter applied across API routes.
    ///
    /// Key: IP address string. Value: deque of request timestamps within
    /// the last window.
    rate_limiter: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,

    /// Last accepted ping time per IP, for the one-ping-per-day limit.
    ping_limiter: Arc<Mutex<HashMap<String, Instant>>>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given backend and config.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            config: ConfigHandle::new(config),
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
            ping_limiter: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether `ip` is within the general request limit.
    ///
    /// Returns `true` if the request should proceed, `false` if it should
    /// be rejected with 429. Slides the window on every call. Always passes
    /// when rate limits are disabled (debug mode).
    pub async fn check_rate_limit(&self, ip: &str) -> bool {
        if !self.config.current().rate_limits_enabled() {
            return true;
        }
        let mut map = self.rate_limiter.lock().await;
        let window = map.entry(ip.to_string()).or_default();
        let cutoff = Instant::now() - GENERAL_WINDOW;
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }
        if window.len() >= GENERAL_MAX {
            return false;
        }
        window.push_back(Instant::now());
        true
    }

    /// Check whether `ip` may submit another ping today.
    ///
    /// Pings over the limit are *silently dropped* (the route still answers
    /// 204): heartbeat clients are fire-and-forget, and the per-day dedup
    /// makes extra pings worthless anyway. Always passes in debug mode so
    /// tests can replay fixtures.
    pub async fn allow_ping(&self, ip: &str) -> bool {
        if !self.config.current().rate_limits_enabled() {
            return true;
        }
        let mut map = self.ping_limiter.lock().await;
        let now = Instant::now();
        match map.get(ip) {
            Some(last) if now.duration_since(*last) < PING_WINDOW => false,
            _ => {
                map.insert(ip.to_string(), now);
                true
            }
        }
    }
}
