use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the marketplace core.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub store: StoreConfig,
    pub marketplace: MarketplaceConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let directory = PathBuf::from(
            env::var("ICATERYOU_STORE_DIR").unwrap_or_else(|_| ".icateryou".to_string()),
        );
        let key_prefix = env::var("ICATERYOU_KEY_PREFIX")
            .unwrap_or_else(|_| StoreConfig::DEFAULT_KEY_PREFIX.to_string());
        if !key_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidKeyPrefix(key_prefix));
        }

        let require_verified_providers = match env::var("ICATERYOU_REQUIRE_VERIFIED_PROVIDERS") {
            Ok(value) => parse_flag(&value)
                .ok_or(ConfigError::InvalidFlag("ICATERYOU_REQUIRE_VERIFIED_PROVIDERS"))?,
            Err(_) => false,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            store: StoreConfig {
                directory,
                key_prefix,
            },
            marketplace: MarketplaceConfig {
                require_verified_providers,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Where and under which key namespace marketplace state is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub directory: PathBuf,
    pub key_prefix: String,
}

impl StoreConfig {
    pub const DEFAULT_KEY_PREFIX: &'static str = "icateryou_";
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".icateryou"),
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Business rules the façade enforces on top of the core workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketplaceConfig {
    /// Refuse `add_service` for providers that have not been approved yet.
    pub require_verified_providers: bool,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidKeyPrefix(String),
    InvalidFlag(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidKeyPrefix(value) => write!(
                f,
                "ICATERYOU_KEY_PREFIX '{}' may only contain ASCII letters, digits, '_' or '-'",
                value
            ),
            ConfigError::InvalidFlag(name) => {
                write!(f, "{} must be one of true/false/1/0/yes/no/on/off", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
