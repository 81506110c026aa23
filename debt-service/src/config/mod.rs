use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct DebtConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub uploads: UploadConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: Secret<String>,
    pub refresh_secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub signin_attempts: u32,
    pub signin_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

/// Super admin seeded at startup when none with this username exists.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: Secret<String>,
    pub phone_number: String,
}

impl DebtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = DebtConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("debt-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            jwt: JwtConfig {
                access_secret: Secret::new(get_env("JWT_ACCESS_SECRET", None, is_prod)?),
                refresh_secret: Secret::new(get_env("JWT_REFRESH_SECRET", None, is_prod)?),
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "1440",
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "15", is_prod)?,
            },
            uploads: UploadConfig {
                dir: get_env("UPLOAD_DIR", Some("./uploads"), is_prod)?,
                max_bytes: parse_env("UPLOAD_MAX_BYTES", "10485760", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                signin_attempts: get_env("RATE_LIMIT_SIGNIN_ATTEMPTS", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
                signin_window_seconds: get_env(
                    "RATE_LIMIT_SIGNIN_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(900),
                global_ip_limit: get_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?
                    .parse()
                    .unwrap_or(100),
                global_ip_window_seconds: get_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(60),
            },
            bootstrap: bootstrap_from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.jwt.access_secret.expose_secret().is_empty()
            || self.jwt.refresh_secret.expose_secret().is_empty()
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT secrets must not be empty"
            )));
        }

        if self.jwt.access_secret.expose_secret() == self.jwt.refresh_secret.expose_secret() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.uploads.max_bytes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPLOAD_MAX_BYTES must be positive"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

fn bootstrap_from_env() -> Option<BootstrapAdmin> {
    let username = env::var("SUPER_ADMIN_USERNAME").ok()?;
    let password = env::var("SUPER_ADMIN_PASSWORD").ok()?;
    let phone_number = env::var("SUPER_ADMIN_PHONE").unwrap_or_default();

    Some(BootstrapAdmin {
        username,
        password: Secret::new(password),
        phone_number,
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config() -> DebtConfig {
        DebtConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "debt-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            database: DatabaseConfig {
                url: Secret::new("postgres://localhost/debt_test".to_string()),
                max_connections: 2,
                min_connections: 1,
            },
            jwt: JwtConfig {
                access_secret: Secret::new("access-secret".to_string()),
                refresh_secret: Secret::new("refresh-secret".to_string()),
                access_token_expiry_minutes: 15,
                refresh_token_expiry_days: 15,
            },
            uploads: UploadConfig {
                dir: "./uploads".to_string(),
                max_bytes: 1024,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            rate_limit: RateLimitConfig {
                signin_attempts: 5,
                signin_window_seconds: 900,
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
            },
            bootstrap: None,
        }
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_expiry() {
        let mut config = sample_config();
        config.jwt.access_token_expiry_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_shared_jwt_secret() {
        let mut config = sample_config();
        config.jwt.refresh_secret = Secret::new("access-secret".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_wildcard_origin_in_prod() {
        let mut config = sample_config();
        config.environment = Environment::Prod;
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());

        config.environment = Environment::Dev;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_environment() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
