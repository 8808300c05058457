use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::ResourceFamily;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_WORKER_POOL_SIZE: usize = 4;
const DEFAULT_WORKER_QUEUE_DEPTH: usize = 16;
const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 5_000;

/// Gateway configuration. Built once at startup and handed to each component;
/// nothing reads it through a global.
#[derive(Debug, Clone)]
pub struct Config {
    // HTTP
    pub host: String,
    pub port: u16,

    // Worker pool
    pub worker_pool_size: usize,
    pub worker_queue_depth: usize,
    pub dispatch_timeout: Duration,

    // Store
    pub database_url: Option<String>,

    // Auth
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,

    // Bus addresses
    pub user_bus_address: String,
    pub blog_bus_address: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let values: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&values)
    }

    /// Load configuration from a static key-value map.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(values, key);

        let port = if let Some(raw) = get("API_PORT") {
            parse_number("API_PORT", raw)?
        } else if let Some(raw) = get("port") {
            parse_number("port", raw)?
        } else if let Some(raw) = get("PORT") {
            parse_number("PORT", raw)?
        } else {
            DEFAULT_PORT
        };

        let worker_pool_size = match get("WORKER_POOL_SIZE") {
            Some(raw) => parse_number("WORKER_POOL_SIZE", raw)?,
            None => DEFAULT_WORKER_POOL_SIZE,
        };
        if worker_pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_POOL_SIZE",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }

        let worker_queue_depth = match get("WORKER_QUEUE_DEPTH") {
            Some(raw) => parse_number("WORKER_QUEUE_DEPTH", raw)?,
            None => DEFAULT_WORKER_QUEUE_DEPTH,
        };
        if worker_queue_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_QUEUE_DEPTH",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }

        let timeout_ms: u64 = match get("DISPATCH_TIMEOUT_MS") {
            Some(raw) => parse_number("DISPATCH_TIMEOUT_MS", raw)?,
            None => DEFAULT_DISPATCH_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "DISPATCH_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be greater than zero",
            });
        }

        let config = Self {
            host: get("API_HOST").unwrap_or(DEFAULT_HOST).to_string(),
            port,
            worker_pool_size,
            worker_queue_depth,
            dispatch_timeout: Duration::from_millis(timeout_ms),
            database_url: get("DATABASE_URL").map(str::to_string),
            jwt_secret: get("JWT_SECRET")
                .ok_or(ConfigError::Missing { key: "JWT_SECRET" })?
                .to_string(),
            jwt_issuer: get("JWT_ISSUER").map(str::to_string),
            user_bus_address: get("USER_BUS_ADDRESS").unwrap_or("user-ops").to_string(),
            blog_bus_address: get("BLOG_BUS_ADDRESS").unwrap_or("blog-ops").to_string(),
        };

        if config.user_bus_address == config.blog_bus_address {
            return Err(ConfigError::Invalid {
                key: "BLOG_BUS_ADDRESS",
                value: config.blog_bus_address,
                reason: "must differ from USER_BUS_ADDRESS",
            });
        }

        Ok(config)
    }

    /// Bus address the workers of `family` listen on.
    pub fn bus_address(&self, family: ResourceFamily) -> &str {
        match family {
            ResourceFamily::User => &self.user_bus_address,
            ResourceFamily::Blog => &self.blog_bus_address,
        }
    }

    /// Store pool size: one connection per worker across both families,
    /// plus headroom.
    pub fn store_max_connections(&self) -> u32 {
        let workers = self.worker_pool_size.saturating_mul(ResourceFamily::ALL.len());
        u32::try_from(workers.saturating_add(2)).unwrap_or(u32::MAX)
    }

    pub fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n: usize = val.chars().take(3).map(char::len_utf8).sum();
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  API: {}:{}", self.host, self.port);
        tracing::info!(
            "  WORKER_POOL_SIZE: {} (queue depth {})",
            self.worker_pool_size,
            self.worker_queue_depth
        );
        tracing::info!("  DISPATCH_TIMEOUT: {:?}", self.dispatch_timeout);
        tracing::info!(
            "  DATABASE_URL: {}",
            self.database_url.as_deref().map(preview).unwrap_or_else(|| "<not set>".to_string())
        );
        tracing::info!("  JWT_SECRET: {}", preview(&self.jwt_secret));
        tracing::info!(
            "  BUS: user={} blog={}",
            self.user_bus_address,
            self.blog_bus_address
        );
    }
}

fn lookup<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: "must be a non-negative integer",
    })
}
