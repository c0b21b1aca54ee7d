use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

use crate::notifications::RetryPolicy;
use crate::workflows::{ScoringPolicy, WorkflowSettings};

const DEV_JWT_SECRET: &str = "skill-portal-development-secret";

/// Distinguishes runtime behavior for different stages of the service.
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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub outbox: OutboxConfig,
    pub workflow: WorkflowSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) if environment == AppEnvironment::Production => LogFormat::Full,
            Err(_) => LogFormat::Compact,
        };

        let jwt_secret = match env::var("APP_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSecret)
            }
            _ => DEV_JWT_SECRET.to_string(),
        };
        let token_ttl_hours = parse_number("APP_TOKEN_TTL_HOURS", 168)?;

        let email_domain = env::var("APP_EMAIL_DOMAIN")
            .unwrap_or_else(|_| "bitsathy.ac.in".to_string())
            .trim()
            .trim_start_matches('@')
            .to_lowercase();
        if email_domain.is_empty() || !email_domain.contains('.') {
            return Err(ConfigError::InvalidEmailDomain(email_domain));
        }

        let data_path = env::var("APP_DATA_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let from = env::var("APP_MAIL_FROM").unwrap_or_else(|_| format!("no-reply@{email_domain}"));

        let poll_interval_secs = parse_number("APP_OUTBOX_POLL_SECS", 15)?;
        let max_attempts = parse_number("APP_OUTBOX_MAX_ATTEMPTS", 5)?;
        let backoff_secs = parse_number("APP_OUTBOX_BACKOFF_SECS", 30)?;

        let scoring_policy = match env::var("APP_SCORING_POLICY") {
            Ok(raw) => ScoringPolicy::parse(&raw).ok_or(ConfigError::InvalidScoringPolicy(raw))?,
            Err(_) => ScoringPolicy::default(),
        };
        let skill_type_limit = parse_number("APP_SKILL_TYPE_LIMIT", 1)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
            },
            storage: StorageConfig { data_path },
            mail: MailConfig { from },
            outbox: OutboxConfig {
                poll_interval_secs,
                max_attempts,
                backoff_secs,
            },
            workflow: WorkflowSettings {
                email_domain,
                scoring_policy,
                skill_type_limit: skill_type_limit as usize,
            },
        })
    }
}

fn parse_number(variable: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(variable) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { variable, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Line layout for the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single line, no targets.
    Compact,
    /// Targets and thread names, for shipping to a collector.
    Full,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u32,
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::hours(i64::from(self.token_ttl_hours))
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

/// Where documents live; no path keeps everything in memory.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub poll_interval_secs: u32,
    pub max_attempts: u32,
    pub backoff_secs: u32,
}

impl OutboxConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.poll_interval_secs))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::seconds(i64::from(self.backoff_secs)),
            ..RetryPolicy::default()
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingSecret,
    InvalidNumber { variable: &'static str, value: String },
    InvalidEmailDomain(String),
    InvalidScoringPolicy(String),
    InvalidLogFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingSecret => {
                write!(f, "APP_JWT_SECRET must be set in production")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidEmailDomain(value) => {
                write!(f, "APP_EMAIL_DOMAIN must be a domain name, got '{value}'")
            }
            ConfigError::InvalidScoringPolicy(value) => write!(
                f,
                "APP_SCORING_POLICY must be single_option or exact_set, got '{value}'"
            ),
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be compact or full, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_JWT_SECRET",
            "APP_TOKEN_TTL_HOURS",
            "APP_EMAIL_DOMAIN",
            "APP_DATA_PATH",
            "APP_MAIL_FROM",
            "APP_OUTBOX_POLL_SECS",
            "APP_OUTBOX_MAX_ATTEMPTS",
            "APP_OUTBOX_BACKOFF_SECS",
            "APP_SCORING_POLICY",
            "APP_SKILL_TYPE_LIMIT",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(config.auth.token_ttl_hours, 168);
        assert_eq!(config.workflow.email_domain, "bitsathy.ac.in");
        assert_eq!(config.workflow.scoring_policy, ScoringPolicy::SingleOption);
        assert_eq!(config.workflow.skill_type_limit, 1);
        assert_eq!(config.mail.from, "no-reply@bitsathy.ac.in");
        assert_eq!(config.outbox.retry_policy().max_attempts, 5);
        assert!(config.storage.data_path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 5000));
        reset_env();
    }

    #[test]
    fn production_requires_a_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        assert!(matches!(AppConfig::load(), Err(ConfigError::MissingSecret)));

        env::set_var("APP_JWT_SECRET", "prod-secret");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.auth.jwt_secret, "prod-secret");
        assert_eq!(config.telemetry.log_format, LogFormat::Full);
        reset_env();
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_OUTBOX_MAX_ATTEMPTS", "zero");
        let err = AppConfig::load().expect_err("rejects non-numeric");
        assert!(err.to_string().starts_with("APP_OUTBOX_MAX_ATTEMPTS"));

        reset_env();
        env::set_var("APP_SCORING_POLICY", "exact-set");
        let config = AppConfig::load().expect("dash spelling accepted");
        assert_eq!(config.workflow.scoring_policy, ScoringPolicy::ExactSet);

        env::set_var("APP_SCORING_POLICY", "partial");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidScoringPolicy(_))
        ));
        reset_env();
    }
}
