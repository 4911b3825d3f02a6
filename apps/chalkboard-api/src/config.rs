use std::path::PathBuf;
use std::time::Duration;

/// Chalkboard API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Directory holding `chalkboard.html` and the `js/` assets.
    pub static_dir: PathBuf,
    /// Bound of the hub's inbound event queue.
    pub event_queue_capacity: usize,
    /// Frames buffered per subscriber before writes start to wait.
    pub subscriber_buffer: usize,
    /// How long the hub waits on a full subscriber before dropping it.
    pub write_timeout: Duration,
    /// Keep-alive period for idle streams. `None` disables the heartbeat.
    pub heartbeat_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            static_dir: std::env::var("STATIC_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            event_queue_capacity: parsed_var("EVENT_QUEUE_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.event_queue_capacity),
            subscriber_buffer: parsed_var("SUBSCRIBER_BUFFER")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.subscriber_buffer),
            write_timeout: parsed_var("WRITE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
            heartbeat_interval: match parsed_var::<u64>("HEARTBEAT_INTERVAL_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.heartbeat_interval,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: PathBuf::from("static"),
            event_queue_capacity: 256,
            subscriber_buffer: 64,
            write_timeout: Duration::from_millis(5000),
            heartbeat_interval: Some(Duration::from_secs(30)),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
