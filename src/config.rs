//! Startup Configuration
//! Mission: Load process settings once and refuse to boot without a signing secret

use chrono::Duration;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[command(name = "userhub")]
#[command(about = "User accounts with role-gated bearer tokens")]
pub struct AppConfig {
    /// HMAC secret used to sign and verify access tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// SQLite file holding users and addresses
    #[arg(long, env = "AUTH_DB_PATH", default_value = "userhub.db")]
    pub db_path: PathBuf,

    /// Access token lifetime in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// bcrypt work factor for stored passwords
    #[arg(long, env = "BCRYPT_COST", default_value_t = 10)]
    pub bcrypt_cost: u32,

    /// E-mail of the admin account seeded when no admin exists
    #[arg(long, env = "ADMIN_EMAIL", default_value = "admin@localhost")]
    pub admin_email: String,

    /// Password of the seeded admin account; no admin is seeded without one
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET is not set; refusing to start without a signing secret")]
    MissingSecret,
    #[error("TOKEN_TTL_HOURS must be positive and representable, got {0}")]
    InvalidTokenTtl(i64),
    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    InvalidBcryptCost(u32),
}

impl AppConfig {
    /// Check the values that would otherwise only fail on the first request.
    /// Returns the signing secret so callers never handle an unchecked one.
    pub fn validate(&self) -> Result<&str, ConfigError> {
        let secret = self
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        if self.token_ttl_hours <= 0 || Duration::try_hours(self.token_ttl_hours).is_none() {
            return Err(ConfigError::InvalidTokenTtl(self.token_ttl_hours));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.bcrypt_cost));
        }

        Ok(secret)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Credentials for the bootstrap admin, only when a password was given.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        self.admin_password
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|password| (self.admin_email.as_str(), password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["userhub"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_secret_is_returned_when_present() {
        let config = parse(&["--jwt-secret", "s3cret", "--port", "8080"]);
        assert_eq!(config.validate().unwrap(), "s3cret");
        assert_eq!(config.bind_addr().port(), 8080);
    }

    #[test]
    fn test_blank_secret_is_fatal() {
        let mut config = parse(&["--jwt-secret", "x"]);
        config.jwt_secret = Some("   ".to_string());
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));

        config.jwt_secret = None;
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let mut config = parse(&["--jwt-secret", "s3cret"]);
        config.token_ttl_hours = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTokenTtl(0)));

        config.token_ttl_hours = i64::MAX;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTokenTtl(i64::MAX)));
    }

    #[test]
    fn test_admin_seed_requires_explicit_password() {
        let config = parse(&["--jwt-secret", "s3cret"]);
        assert_eq!(config.admin_password, None);
        assert_eq!(config.admin_credentials(), None);

        let config = parse(&["--jwt-secret", "s3cret", "--admin-password", "   "]);
        assert_eq!(config.admin_credentials(), None);

        let config = parse(&[
            "--jwt-secret",
            "s3cret",
            "--admin-email",
            "root@example.com",
            "--admin-password",
            "long-random-pass",
        ]);
        assert_eq!(
            config.admin_credentials(),
            Some(("root@example.com", "long-random-pass"))
        );
    }

    #[test]
    fn test_rejects_out_of_range_bcrypt_cost() {
        let mut config = parse(&["--jwt-secret", "s3cret"]);
        config.bcrypt_cost = 2;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBcryptCost(2)));
    }
}
