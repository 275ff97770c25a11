use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::storage::MAX_RANGE_DAYS;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite settings.
    pub database: DatabaseConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
    /// Reporting window defaults.
    pub analytics: AnalyticsConfig,
    /// Health scoring behaviour.
    pub health: HealthConfig,
    /// Sentiment enrichment endpoint.
    pub sentiment: SentimentConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Analytics window defaults
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Length of the default reporting window ending at "now".
    pub default_range_days: i64,
    /// Ranges longer than this are bucketed per week instead of per day.
    pub weekly_bucket_after_days: i64,
}

/// Health scoring behaviour
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Recalculate a contact's score when it is created or a key field changes.
    pub recalc_on_update: bool,
}

/// Sentiment enrichment endpoint. Disabled when `api_url` is unset.
#[derive(Debug, Clone)]
pub struct SentimentConfig {
    /// Endpoint URL. Unset disables enrichment.
    pub api_url: Option<String>,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/crm.db".to_string()),
            ),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?.unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let analytics = AnalyticsConfig {
            default_range_days: parse_var("ANALYTICS_DEFAULT_RANGE_DAYS")?.unwrap_or(30),
            weekly_bucket_after_days: parse_var("ANALYTICS_WEEKLY_BUCKET_AFTER_DAYS")?
                .unwrap_or(90),
        };
        if analytics.default_range_days <= 0 {
            return Err(AppError::Config {
                message: "ANALYTICS_DEFAULT_RANGE_DAYS must be positive".to_string(),
            });
        }
        if analytics.default_range_days > MAX_RANGE_DAYS {
            return Err(AppError::Config {
                message: format!("ANALYTICS_DEFAULT_RANGE_DAYS must not exceed {MAX_RANGE_DAYS}"),
            });
        }

        let health = HealthConfig {
            recalc_on_update: parse_var("HEALTH_RECALC_ON_UPDATE")?.unwrap_or(true),
        };

        let sentiment = SentimentConfig {
            api_url: env::var("SENTIMENT_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            api_key: env::var("SENTIMENT_API_KEY").ok(),
            timeout_ms: parse_var("SENTIMENT_TIMEOUT_MS")?.unwrap_or(5000),
        };

        Ok(Config {
            database,
            logging,
            analytics,
            health,
            sentiment,
        })
    }
}

/// Read an optional variable, rejecting values that are present but unparseable.
fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| AppError::Config {
            message: format!("{} has an invalid value: {}", name, raw),
        }),
        Err(_) => Ok(None),
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/crm.db"),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_range_days: 30,
            weekly_bucket_after_days: 90,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            recalc_on_update: true,
        }
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            timeout_ms: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            analytics: AnalyticsConfig::default(),
            health: HealthConfig::default(),
            sentiment: SentimentConfig::default(),
        }
    }
}
