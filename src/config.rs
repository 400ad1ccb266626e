//! Application configuration module
//! Loads every setting from the environment once at startup. The resulting
//! value is handed to constructors; nothing below `main` reads the environment.

use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` when `SKIP_EXTERNALS=true`; the in-memory store is used then.
    pub database: Option<DatabaseConfig>,
    pub logging: LoggingConfig,
    pub processor: ProcessorConfig,
    pub checkout: CheckoutConfig,
    pub reconciliation: ReconciliationConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Which processor deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorEnvironment {
    Sandbox,
    Production,
}

impl ProcessorEnvironment {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProcessorEnvironment::Sandbox => "https://sandbox.wompi.co/v1",
            ProcessorEnvironment::Production => "https://production.wompi.co/v1",
        }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, ProcessorEnvironment::Sandbox)
    }
}

/// Payment processor credentials and client behaviour
#[derive(Clone)]
pub struct ProcessorConfig {
    pub environment: ProcessorEnvironment,
    pub base_url: String,
    pub public_key: String,
    pub private_key: String,
    /// Shared secret for the request integrity hash and webhook signatures.
    pub integrity_secret: String,
    pub currency: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// Where the bank sends the payer back; the reference is appended.
    pub redirect_base_url: Option<String>,
    pub payment_description: String,
}

// Keys and secrets stay out of logs.
impl std::fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("public_key", &"<redacted>")
            .field("private_key", &"<redacted>")
            .field("integrity_secret", &"<redacted>")
            .field("currency", &self.currency)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("poll_interval", &self.poll_interval)
            .field("poll_attempts", &self.poll_attempts)
            .field("redirect_base_url", &self.redirect_base_url)
            .finish()
    }
}

/// Checkout validation rules
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub min_amount_in_cents: i64,
    /// Bank codes accepted in sandbox mode.
    pub sandbox_bank_codes: Vec<String>,
}

/// Background read-back of transactions still pending
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub min_age: Duration,
    pub batch_size: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let skip_externals = env::var("SKIP_EXTERNALS")
            .unwrap_or_else(|_| "false".to_string())
            .eq_ignore_ascii_case("true");

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: if skip_externals {
                None
            } else {
                Some(DatabaseConfig::from_env()?)
            },
            logging: LoggingConfig::from_env()?,
            processor: ProcessorConfig::from_env()?,
            checkout: CheckoutConfig::from_env()?,
            reconciliation: ReconciliationConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.logging.validate()?;
        self.processor.validate()?;
        self.checkout.validate(self.processor.environment)?;
        self.reconciliation.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("SERVER_PORT", 3000)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", 2)?,
            connection_timeout: parse_var("DB_CONNECTION_TIMEOUT", 30)?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("WOMPI_ENV")
            .unwrap_or_else(|_| "sandbox".to_string())
            .to_lowercase()
            .as_str()
        {
            "sandbox" => ProcessorEnvironment::Sandbox,
            "production" => ProcessorEnvironment::Production,
            _ => return Err(ConfigError::InvalidValue("WOMPI_ENV".to_string())),
        };

        Ok(ProcessorConfig {
            environment,
            base_url: env::var("WOMPI_BASE_URL")
                .unwrap_or_else(|_| environment.default_base_url().to_string()),
            public_key: required_var("WOMPI_PUBLIC_KEY")?,
            private_key: required_var("WOMPI_PRIVATE_KEY")?,
            integrity_secret: required_var("WOMPI_INTEGRITY_SECRET")?,
            currency: env::var("WOMPI_CURRENCY").unwrap_or_else(|_| "COP".to_string()),
            request_timeout: Duration::from_secs(parse_var("WOMPI_REQUEST_TIMEOUT_SECS", 10)?),
            max_retries: parse_var("WOMPI_MAX_RETRIES", 2)?,
            poll_interval: Duration::from_millis(parse_var("WOMPI_POLL_INTERVAL_MS", 2000)?),
            poll_attempts: parse_var("WOMPI_POLL_ATTEMPTS", 5)?,
            redirect_base_url: env::var("PAYMENT_REDIRECT_BASE_URL").ok(),
            payment_description: env::var("PAYMENT_DESCRIPTION")
                .unwrap_or_else(|_| "Pago a Tienda Wompi".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "WOMPI_BASE_URL must be a valid URL".to_string(),
            ));
        }

        for (name, value) in [
            ("WOMPI_PUBLIC_KEY", &self.public_key),
            ("WOMPI_PRIVATE_KEY", &self.private_key),
            ("WOMPI_INTEGRITY_SECRET", &self.integrity_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingVariable(name.to_string()));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "WOMPI_REQUEST_TIMEOUT_SECS".to_string(),
            ));
        }

        if self.poll_attempts == 0 {
            return Err(ConfigError::InvalidValue("WOMPI_POLL_ATTEMPTS".to_string()));
        }

        if self.currency.len() != 3 {
            return Err(ConfigError::InvalidValue("WOMPI_CURRENCY".to_string()));
        }

        Ok(())
    }
}

impl CheckoutConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CheckoutConfig {
            min_amount_in_cents: parse_var("MIN_AMOUNT_IN_CENTS", 150_000)?,
            sandbox_bank_codes: env::var("SANDBOX_BANK_CODES")
                .unwrap_or_else(|_| "1,2".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// The bank whitelist is only enforced in sandbox, where an empty one
    /// would reject every checkout.
    pub fn validate(&self, environment: ProcessorEnvironment) -> Result<(), ConfigError> {
        if self.min_amount_in_cents <= 0 {
            return Err(ConfigError::InvalidValue("MIN_AMOUNT_IN_CENTS".to_string()));
        }

        if environment.is_sandbox() && self.sandbox_bank_codes.is_empty() {
            return Err(ConfigError::InvalidValue("SANDBOX_BANK_CODES".to_string()));
        }

        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            min_age: Duration::from_secs(120),
            batch_size: 50,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(ReconciliationConfig {
            enabled: env::var("RECONCILE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                != "false",
            interval: Duration::from_secs(parse_var(
                "RECONCILE_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            min_age: Duration::from_secs(parse_var(
                "RECONCILE_MIN_AGE_SECS",
                defaults.min_age.as_secs(),
            )?),
            batch_size: parse_var("RECONCILE_BATCH_SIZE", defaults.batch_size)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "RECONCILE_INTERVAL_SECS".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue("RECONCILE_BATCH_SIZE".to_string()));
        }

        Ok(())
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
