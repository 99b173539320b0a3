//! Notification dispatcher.
//!
//! Transactional email goes through the [`Mailer`] trait: SMTP when
//! configured, otherwise a log-only fallback so the rest of the system
//! behaves identically in development. Senders never retry; a failed
//! dispatch is logged by the caller and does not roll anything back.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Build the dispatcher from configuration.
pub fn from_config(cfg: Option<&SmtpConfig>) -> Result<Arc<dyn Mailer>, EmailError> {
    match cfg {
        Some(cfg) => Ok(Arc::new(SmtpMailer::new(cfg)?)),
        None => {
            tracing::warn!("SMTP not configured, outbound mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> Result<Self, EmailError> {
        // Port 465 uses implicit TLS (SMTPS), other ports use STARTTLS.
        let mut builder = if cfg.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
                .map_err(|e| EmailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                .port(cfg.port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
                .map_err(|e| EmailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                .port(cfg.port)
        };

        if let (Some(user), Some(pass)) = (cfg.username.clone(), cfg.password.clone()) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        let from = match &cfg.from_name {
            Some(name) => format!("{} <{}>", name, cfg.from_address),
            None => cfg.from_address.clone(),
        };
        let from = from
            .parse()
            .map_err(|e| EmailError::InvalidConfig(format!("Invalid from address: {e}")))?;

        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| EmailError::InvalidConfig(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;
        Ok(())
    }
}

/// Fallback dispatcher used when SMTP is unconfigured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), EmailError> {
        tracing::info!(%to, %subject, "email suppressed, SMTP not configured");
        Ok(())
    }
}

pub mod templates {
    //! Plain-text bodies for transactional mail, returned as
    //! (subject, body) pairs.

    pub fn signup_code(code: &str) -> (String, String) {
        (
            "Verification Code".into(),
            format!(
                "Your verification code is: {code}\n\n\
                 The code expires in 10 minutes. If you did not request it, \
                 you can ignore this email."
            ),
        )
    }

    pub fn enrollment(course_title: &str, student_name: &str) -> (String, String) {
        (
            format!("Enrolled in {course_title}"),
            format!(
                "Hi {student_name},\n\nYou have been enrolled in {course_title}. \
                 Head to your dashboard to start learning."
            ),
        )
    }

    pub fn payment_receipt(
        student_name: &str,
        amount: u64,
        order_id: &str,
        payment_id: &str,
    ) -> (String, String) {
        (
            "Payment Received".into(),
            format!(
                "Hi {student_name},\n\nWe received your payment of {}.{:02}.\n\
                 Order ID: {order_id}\nPayment ID: {payment_id}",
                amount / 100,
                amount % 100,
            ),
        )
    }

    pub fn password_reset(reset_url: &str) -> (String, String) {
        (
            "Password Reset".into(),
            format!("Click the link to reset your password: {reset_url}\n\nThe link expires in 5 minutes."),
        )
    }

    pub fn password_updated(student_name: &str) -> (String, String) {
        (
            "Password Updated".into(),
            format!("Password updated successfully for {student_name}."),
        )
    }
}
