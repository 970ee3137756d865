//! Immutable gateway configuration, loaded once from the environment.

use std::{num::NonZeroU32, path::PathBuf, time::Duration};

use keel_core::Environment;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A variable was set to a value that cannot be used.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Complete gateway configuration.
///
/// Built exactly once at startup and shared behind an `Arc`; never mutated
/// afterwards.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Environment name as configured, reported by the health endpoint.
    pub environment_name: String,
    pub api_version: String,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn environment(&self) -> Environment {
        Environment::from_name(&self.environment_name)
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub rate_limit: RateLimitConfig,
    pub slow_down: SlowDownConfig,
}

/// Hard per-client request budget on the `/api` routes.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: NonZeroU32,
}

/// Soft per-client budget: requests past `delay_after` in a window are
/// delayed by `delay` instead of rejected.
#[derive(Debug, Clone)]
pub struct SlowDownConfig {
    pub window: Duration,
    pub delay_after: NonZeroU32,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub origins: Vec<String>,
    pub credentials: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub file_path: PathBuf,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub struct FeaturesConfig {
    pub rate_limiting: bool,
    pub compression: bool,
    /// Request trace layer and the log file sink.
    pub logging: bool,
}

const DEFAULT_WINDOW: Duration = Duration::from_millis(900_000);
const DEFAULT_LIMIT: NonZeroU32 = match NonZeroU32::new(100) {
    Some(n) => n,
    None => panic!("default limit must be non-zero"),
};

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_owned(),
                port: 3001,
                environment_name: "development".to_owned(),
                api_version: "v1".to_owned(),
                trust_proxy: false,
            },
            security: SecurityConfig {
                rate_limit: RateLimitConfig { window: DEFAULT_WINDOW, max_requests: DEFAULT_LIMIT },
                slow_down: SlowDownConfig {
                    window: DEFAULT_WINDOW,
                    delay_after: DEFAULT_LIMIT,
                    delay: Duration::from_millis(500),
                },
            },
            cors: CorsConfig {
                origins: vec!["http://localhost:3000".to_owned()],
                credentials: false,
            },
            logging: LoggingConfig {
                level: "info".to_owned(),
                file_path: PathBuf::from("./logs/app.log"),
                format: LogFormat::Compact,
            },
            features: FeaturesConfig { rate_limiting: true, compression: true, logging: true },
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if any variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// variables it does not return.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if any variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Vars(&lookup);

        let server = ServerConfig {
            host: env.string("KEEL_HOST").unwrap_or(defaults.server.host),
            port: env.parse("PORT")?.unwrap_or(defaults.server.port),
            environment_name: env
                .string("KEEL_ENV")
                .or_else(|| env.string("NODE_ENV"))
                .unwrap_or(defaults.server.environment_name),
            api_version: env.string("API_VERSION").unwrap_or(defaults.server.api_version),
            trust_proxy: env.string("TRUST_PROXY").is_some_and(|v| v == "true"),
        };

        let rate_limit = RateLimitConfig {
            window: env.window("RATE_LIMIT_WINDOW_MS")?.unwrap_or(DEFAULT_WINDOW),
            max_requests: env.parse("RATE_LIMIT_MAX_REQUESTS")?.unwrap_or(DEFAULT_LIMIT),
        };
        let slow_down = SlowDownConfig {
            window: env.window("SLOW_DOWN_WINDOW_MS")?.unwrap_or(DEFAULT_WINDOW),
            delay_after: env.parse("SLOW_DOWN_DELAY_AFTER")?.unwrap_or(DEFAULT_LIMIT),
            delay: env
                .parse::<u64>("SLOW_DOWN_DELAY_MS")?
                .map_or(defaults.security.slow_down.delay, Duration::from_millis),
        };

        let cors = CorsConfig {
            origins: env.string("CORS_ORIGIN").map_or(defaults.cors.origins, |raw| {
                raw.split(',').map(|o| o.trim().to_owned()).filter(|o| !o.is_empty()).collect()
            }),
            credentials: env.string("CORS_CREDENTIALS").is_some_and(|v| v == "true"),
        };

        let logging = LoggingConfig {
            level: env.string("LOG_LEVEL").unwrap_or(defaults.logging.level),
            file_path: env.string("LOG_FILE_PATH").map_or(defaults.logging.file_path, PathBuf::from),
            format: match env.string("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Compact,
            },
        };

        let features = FeaturesConfig {
            rate_limiting: env.enabled_unless_false("ENABLE_RATE_LIMITING"),
            compression: env.enabled_unless_false("ENABLE_COMPRESSION"),
            logging: env.enabled_unless_false("ENABLE_LOGGING"),
        };

        Ok(Self {
            server,
            security: SecurityConfig { rate_limit, slow_down },
            cors,
            logging,
            features,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, var: &str) -> Option<String> {
        (self.0)(var)
    }

    fn parse<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(var)
            .map(|value| {
                value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                    var,
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn window(&self, var: &'static str) -> Result<Option<Duration>, ConfigError> {
        match self.parse::<u64>(var)? {
            Some(0) => Err(ConfigError::Invalid {
                var,
                value: "0".to_owned(),
                reason: "window must be greater than zero".to_owned(),
            }),
            other => Ok(other.map(Duration::from_millis)),
        }
    }

    fn enabled_unless_false(&self, var: &str) -> bool {
        self.string(var).is_none_or(|v| v != "false")
    }
}
