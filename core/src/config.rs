use std::time::Duration;

use strata_proto::LogLevel;

/// Process-level options, injected explicitly into the supervisor and the
/// components that need them. There is no process-global configuration
/// state; embedders construct one of these and pass it down.
#[derive(Debug, Clone)]
pub struct Config {
    /// host:port of the key-value backend.
    pub backend_address: String,
    /// Backend credential; may be empty.
    pub backend_password: String,
    /// Tenant string for leadership keys and the log stream.
    pub application: String,
    /// Records below this severity are not persisted to the log ring.
    pub log_level: LogLevel,
    /// Max entries retained on the backend log stream.
    pub log_ring_length: usize,
    /// Use the host identifier as the instance id instead of a random one.
    pub in_container: bool,
    /// Leadership lease duration; also the candidate beacon TTL.
    pub lease_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_address: "redis:6379".to_string(),
            backend_password: String::new(),
            application: "MyApp".to_string(),
            log_level: LogLevel::Info,
            log_ring_length: 100,
            in_container: false,
            lease_timeout: Duration::from_secs(3),
        }
    }
}
