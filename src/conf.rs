use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub source_dsn: String,
    pub source_queue: String,
    pub bus_dsn: String,
    pub bus_exchange: String,
    pub bus_routing_key: String,
    pub blob_endpoint: String,
    pub blob_container: String,
    pub blob_access_token: Option<String>,
    pub health_port: u16,
}

impl Config {
    /// Build a configuration from environment variables.
    ///
    /// Required variables: `SOURCE_DSN`, `BUS_DSN`, `BLOB_ENDPOINT`.
    /// Optional variables: `SOURCE_QUEUE`, `BUS_EXCHANGE`, `BUS_ROUTING_KEY`,
    /// `BLOB_CONTAINER`, `BLOB_ACCESS_TOKEN`, `HEALTH_PORT`.
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or if
    /// `HEALTH_PORT` cannot be parsed to a valid `u16` when provided.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            source_dsn: std::env::var("SOURCE_DSN")
                .context("SOURCE_DSN environment variable not set")?,
            source_queue: std::env::var("SOURCE_QUEUE").unwrap_or_else(|_| "inbound".to_string()),
            bus_dsn: std::env::var("BUS_DSN").context("BUS_DSN environment variable not set")?,
            // Empty string is the broker's default exchange.
            bus_exchange: std::env::var("BUS_EXCHANGE").unwrap_or_default(),
            bus_routing_key: std::env::var("BUS_ROUTING_KEY")
                .unwrap_or_else(|_| "outbound".to_string()),
            blob_endpoint: std::env::var("BLOB_ENDPOINT")
                .context("BLOB_ENDPOINT environment variable not set")?,
            blob_container: std::env::var("BLOB_CONTAINER")
                .unwrap_or_else(|_| "messages".to_string()),
            blob_access_token: std::env::var("BLOB_ACCESS_TOKEN").ok(),
            health_port: std::env::var("HEALTH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    // Global mutex to serialize environment-variable dependent tests
    static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_MUTEX.get_or_init(|| Mutex::new(()))
    }

    fn clear_env() {
        for (k, _) in std::env::vars() {
            // Only clear the vars we might read to avoid surprising the environment
            match k.as_str() {
                "SOURCE_DSN" | "SOURCE_QUEUE" | "BUS_DSN" | "BUS_EXCHANGE" | "BUS_ROUTING_KEY"
                | "BLOB_ENDPOINT" | "BLOB_CONTAINER" | "BLOB_ACCESS_TOKEN" | "HEALTH_PORT" => {
                    unsafe { std::env::remove_var(k) };
                }
                _ => {}
            }
        }
    }

    #[test]
    fn from_env_errors_when_required_missing() {
        let _g = env_lock().lock().unwrap();
        clear_env();

        let err = Config::from_env().unwrap_err();
        let s = format!("{err:#}");
        assert!(s.contains("SOURCE_DSN"));

        unsafe { std::env::set_var("SOURCE_DSN", "amqp://src") };
        let err = Config::from_env().unwrap_err();
        let s = format!("{err:#}");
        assert!(s.contains("BUS_DSN"));

        unsafe { std::env::set_var("BUS_DSN", "amqp://bus") };
        let err = Config::from_env().unwrap_err();
        let s = format!("{err:#}");
        assert!(s.contains("BLOB_ENDPOINT"));
    }

    #[test]
    fn from_env_uses_defaults_for_optionals() {
        let _g = env_lock().lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("SOURCE_DSN", "amqp://src") };
        unsafe { std::env::set_var("BUS_DSN", "amqp://bus") };
        unsafe { std::env::set_var("BLOB_ENDPOINT", "https://blobs.example.com") };

        let cfg = Config::from_env().expect("should parse");
        assert_eq!(cfg.source_queue, "inbound");
        assert_eq!(cfg.bus_exchange, "");
        assert_eq!(cfg.bus_routing_key, "outbound");
        assert_eq!(cfg.blob_container, "messages");
        assert_eq!(cfg.blob_access_token, None);
        assert_eq!(cfg.health_port, 8080);
    }

    #[test]
    fn from_env_parses_overrides() {
        let _g = env_lock().lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("SOURCE_DSN", "amqp://src") };
        unsafe { std::env::set_var("BUS_DSN", "amqp://bus") };
        unsafe { std::env::set_var("BLOB_ENDPOINT", "https://blobs.example.com") };
        unsafe { std::env::set_var("SOURCE_QUEUE", "q1") };
        unsafe { std::env::set_var("BUS_EXCHANGE", "ex1") };
        unsafe { std::env::set_var("BUS_ROUTING_KEY", "rk1") };
        unsafe { std::env::set_var("BLOB_CONTAINER", "c1") };
        unsafe { std::env::set_var("BLOB_ACCESS_TOKEN", "t1") };
        unsafe { std::env::set_var("HEALTH_PORT", "9000") };

        let cfg = Config::from_env().expect("should parse");
        assert_eq!(cfg.source_queue, "q1");
        assert_eq!(cfg.bus_exchange, "ex1");
        assert_eq!(cfg.bus_routing_key, "rk1");
        assert_eq!(cfg.blob_container, "c1");
        assert_eq!(cfg.blob_access_token.as_deref(), Some("t1"));
        assert_eq!(cfg.health_port, 9000);
    }
}
