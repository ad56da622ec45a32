use std::fmt;
use thiserror::Error;

const SANDBOX_TMN_CODE: &str = "SANDBOX1";
const SANDBOX_HASH_SECRET: &str = "SANDBOXHASHSECRETNOTFORPRODUCTION";
const SANDBOX_PAYMENT_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";
const SANDBOX_API_URL: &str = "https://sandbox.vnpayment.vn/merchant_webapi/api/transaction";
const SANDBOX_RETURN_URL: &str = "http://localhost:3000/payment/vnpay-return";

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    /// Reads `APP_ENV`; unset means development.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        match std::env::var("APP_ENV") {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::Development),
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "dev" | "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "prod" | "production" => Ok(Self::Production),
            other => Err(ConfigurationError::Invalid {
                key: "APP_ENV",
                reason: format!("unknown environment '{}'", other),
            }),
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vnpay: VnpayConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service keeps payments in memory (non-production only).
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Merchant settings shared by the URL builder and the callback verifier.
#[derive(Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub payment_url: String,
    pub api_url: String,
    pub return_url: String,
}

impl fmt::Debug for VnpayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VnpayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"<redacted>")
            .field("payment_url", &self.payment_url)
            .field("api_url", &self.api_url)
            .field("return_url", &self.return_url)
            .finish()
    }
}

#[cfg(test)]
impl VnpayConfig {
    pub fn sandbox() -> Self {
        Self {
            tmn_code: SANDBOX_TMN_CODE.to_string(),
            hash_secret: SANDBOX_HASH_SECRET.to_string(),
            payment_url: SANDBOX_PAYMENT_URL.to_string(),
            api_url: SANDBOX_API_URL.to_string(),
            return_url: SANDBOX_RETURN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default().separator("_"))
            .build()?;

        Self::from_settings(&settings)
    }

    /// Resolves typed settings from an already-built source. Outside
    /// production, absent gateway settings fall back to sandbox values;
    /// in production they are a hard failure.
    pub fn from_settings(settings: &config::Config) -> Result<Self, ConfigurationError> {
        let environment = match lookup(settings, "app.env") {
            Some(value) => AppEnvironment::parse(&value)?,
            None => AppEnvironment::Development,
        };

        let database_url = lookup(settings, "database.url");
        if environment.is_production() && database_url.is_none() {
            return Err(ConfigurationError::Missing("DATABASE_URL"));
        }

        let vnpay = VnpayConfig {
            tmn_code: resolve(settings, environment, "vnpay.tmn.code", "VNPAY_TMN_CODE", SANDBOX_TMN_CODE)?,
            hash_secret: resolve(
                settings,
                environment,
                "vnpay.hash.secret",
                "VNPAY_HASH_SECRET",
                SANDBOX_HASH_SECRET,
            )?,
            payment_url: resolve(settings, environment, "vnpay.url", "VNPAY_URL", SANDBOX_PAYMENT_URL)?,
            api_url: resolve(settings, environment, "vnpay.api.url", "VNPAY_API_URL", SANDBOX_API_URL)?,
            return_url: resolve(
                settings,
                environment,
                "vnpay.return.url",
                "VNPAY_RETURN_URL",
                SANDBOX_RETURN_URL,
            )?,
        };

        for (key, value) in [
            ("VNPAY_URL", &vnpay.payment_url),
            ("VNPAY_API_URL", &vnpay.api_url),
            ("VNPAY_RETURN_URL", &vnpay.return_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigurationError::Invalid {
                key,
                reason: e.to_string(),
            })?;
        }

        Ok(Config {
            environment,
            server: ServerConfig {
                host: lookup(settings, "host").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: int_or(settings, "port", 8080, "PORT")?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: int_or(settings, "database.max.connections", 10, "DATABASE_MAX_CONNECTIONS")?,
            },
            vnpay,
            rate_limit: RateLimitConfig {
                requests_per_second: int_or(
                    settings,
                    "rate.limit.requests.per.second",
                    100,
                    "RATE_LIMIT_REQUESTS_PER_SECOND",
                )?,
                burst_size: int_or(settings, "rate.limit.burst.size", 200, "RATE_LIMIT_BURST_SIZE")?,
            },
        })
    }
}

fn lookup(settings: &config::Config, key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve(
    settings: &config::Config,
    environment: AppEnvironment,
    key: &str,
    env_name: &'static str,
    sandbox_default: &str,
) -> Result<String, ConfigurationError> {
    match lookup(settings, key) {
        Some(value) => Ok(value),
        None if environment.is_production() => Err(ConfigurationError::Missing(env_name)),
        None => {
            tracing::warn!(setting = env_name, "Setting not provided, using VNPay sandbox default");
            Ok(sandbox_default.to_string())
        }
    }
}

fn int_or<T>(
    settings: &config::Config,
    key: &str,
    default: T,
    env_name: &'static str,
) -> Result<T, ConfigurationError>
where
    T: TryFrom<i64>,
{
    match settings.get_int(key) {
        Ok(value) => T::try_from(value).map_err(|_| ConfigurationError::Invalid {
            key: env_name,
            reason: format!("{} is out of range", value),
        }),
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        Err(e) => Err(ConfigurationError::Invalid {
            key: env_name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> config::Config {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_development_falls_back_to_sandbox() {
        let config = Config::from_settings(&settings(&[])).unwrap();

        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.vnpay.tmn_code, SANDBOX_TMN_CODE);
        assert_eq!(config.vnpay.payment_url, SANDBOX_PAYMENT_URL);
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_explicit_values_win() {
        let config = Config::from_settings(&settings(&[
            ("vnpay.tmn.code", "MERCHANT9"),
            ("vnpay.hash.secret", "0123456789"),
            ("port", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.vnpay.tmn_code, "MERCHANT9");
        assert_eq!(config.vnpay.hash_secret, "0123456789");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_production_requires_secret() {
        let result = Config::from_settings(&settings(&[
            ("app.env", "production"),
            ("database.url", "postgres://localhost/payments"),
            ("vnpay.tmn.code", "MERCHANT9"),
        ]));

        assert!(matches!(result, Err(ConfigurationError::Missing("VNPAY_HASH_SECRET"))));
    }

    #[test]
    fn test_production_requires_database() {
        let result = Config::from_settings(&settings(&[("app.env", "production")]));
        assert!(matches!(result, Err(ConfigurationError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let result = Config::from_settings(&settings(&[
            ("app.env", "production"),
            ("database.url", "postgres://localhost/payments"),
            ("vnpay.tmn.code", "   "),
        ]));

        assert!(matches!(result, Err(ConfigurationError::Missing("VNPAY_TMN_CODE"))));
    }

    #[test]
    fn test_rejects_invalid_gateway_url() {
        let result = Config::from_settings(&settings(&[("vnpay.url", "not a url")]));
        assert!(matches!(result, Err(ConfigurationError::Invalid { key: "VNPAY_URL", .. })));
    }

    #[test]
    fn test_environment_aliases() {
        assert_eq!(AppEnvironment::parse(" Production ").unwrap(), AppEnvironment::Production);
        assert_eq!(AppEnvironment::parse("prod").unwrap(), AppEnvironment::Production);
        assert_eq!(AppEnvironment::parse("DEV").unwrap(), AppEnvironment::Development);
        assert_eq!(AppEnvironment::parse("").unwrap(), AppEnvironment::Development);
        assert!(AppEnvironment::parse("staging").is_err());

        let config = Config::from_settings(&settings(&[
            ("app.env", " prod "),
            ("database.url", "postgres://localhost/payments"),
        ]));
        assert!(matches!(config, Err(ConfigurationError::Missing("VNPAY_TMN_CODE"))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", VnpayConfig::sandbox());
        assert!(!rendered.contains(SANDBOX_HASH_SECRET));
        assert!(rendered.contains("<redacted>"));
    }
}
