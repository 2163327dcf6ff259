/// Application configuration module
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Unset means reports live in memory for the lifetime of the process
    pub database_url: Option<String>,
    pub http_addr: String,
    pub command_addr: String,
    pub command_pool_size: usize,
    pub probe: ProbeConfig,
    pub weather_tolerance: f64,
    pub weather_api_url: Option<String>,
}

/// Target of the availability probe
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env_opt("DATABASE_URL");

        let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let command_addr =
            env::var("COMMAND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let command_pool_size = env_parse("COMMAND_POOL_SIZE", 10usize).max(1);

        let probe = ProbeConfig {
            host: env::var("PROBE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PROBE_PORT", 5000u16),
            timeout: Duration::from_millis(env_parse("PROBE_TIMEOUT_MS", 3000u64)),
        };

        let weather_tolerance = env_parse("WEATHER_TOLERANCE", 0.01f64);
        let weather_api_url = env_opt("WEATHER_API_URL");

        Ok(Self {
            database_url,
            http_addr,
            command_addr,
            command_pool_size,
            probe,
            weather_tolerance,
            weather_api_url,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
