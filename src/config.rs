//! Process configuration, loaded once at startup from the environment.
//!
//! ```bash
//! PORT=4000
//! JWT_SECRET=change-me
//!
//! # Payment provider (both present => live mode, otherwise mock mode)
//! RAZORPAY_KEY=rzp_test_...
//! RAZORPAY_SECRET=...
//!
//! # Outbound mail (unset => sends are logged instead)
//! SMTP_HOST=smtp.example.com
//! SMTP_PORT=587
//! SMTP_USERNAME=user@example.com
//! SMTP_PASSWORD=app_password
//! MAIL_FROM=noreply@example.com
//! MAIL_FROM_NAME="Course Platform"
//!
//! FRONTEND_URL=http://localhost:3000
//! ```

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub payment: Option<PaymentCredentials>,
    pub smtp: Option<SmtpConfig>,
}

/// Provider key pair. Presence of both keys switches the gateway out of
/// mock mode.
#[derive(Debug, Clone)]
pub struct PaymentCredentials {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidPort(s))?,
            Err(_) => 4000,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("JWT_SECRET".into()))?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let payment = match (env::var("RAZORPAY_KEY"), env::var("RAZORPAY_SECRET")) {
            (Ok(key_id), Ok(key_secret)) => Some(PaymentCredentials { key_id, key_secret }),
            _ => None,
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => {
                let smtp_port = match env::var("SMTP_PORT") {
                    Ok(s) => s.parse().map_err(|_| ConfigError::InvalidPort(s))?,
                    Err(_) => 587,
                };
                let from_address = env::var("MAIL_FROM")
                    .map_err(|_| ConfigError::MissingEnvVar("MAIL_FROM".into()))?;
                Some(SmtpConfig {
                    host,
                    port: smtp_port,
                    username: env::var("SMTP_USERNAME").ok(),
                    password: env::var("SMTP_PASSWORD").ok(),
                    from_address,
                    from_name: env::var("MAIL_FROM_NAME").ok(),
                })
            }
            Err(_) => None,
        };

        Ok(AppConfig {
            port,
            jwt_secret,
            frontend_url,
            payment,
            smtp,
        })
    }
}
