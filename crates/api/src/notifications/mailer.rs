//! OTP delivery by email.
//!
//! [`SmtpMailer`] sends through an SMTP relay when `SMTP_HOST` is configured.
//! Otherwise [`LogMailer`] writes the code to the log so local development
//! works without a mail server.

use async_trait::async_trait;
use querypilot_core::otp::OtpPurpose;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

/// Delivers one-time codes to a mailbox.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, purpose: OtpPurpose, code: &str) -> Result<(), MailError>;
}

/// Build the mailer from the environment, falling back to the log.
pub fn mailer_from_env() -> std::sync::Arc<dyn Mailer> {
    match MailerConfig::from_env() {
        Some(config) => {
            tracing::info!(host = %config.smtp_host, port = config.smtp_port, "SMTP mailer configured");
            std::sync::Arc::new(SmtpMailer::new(config))
        }
        None => {
            tracing::warn!("SMTP_HOST not set; OTP codes will be written to the log");
            std::sync::Arc::new(LogMailer)
        }
    }
}

// ---------------------------------------------------------------------------
// MailerConfig
// ---------------------------------------------------------------------------

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "QueryPilot <noreply@querypilot.local>";

#[derive(Clone)]
pub struct MailerConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl std::fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("from_address", &self.from_address)
            .field("smtp_username", &self.smtp_username)
            .finish_non_exhaustive()
    }
}

impl MailerConfig {
    /// `None` when `SMTP_HOST` is unset.
    ///
    /// | Variable        | Required | Default                                  |
    /// |-----------------|----------|------------------------------------------|
    /// | `SMTP_HOST`     | yes      | --                                       |
    /// | `SMTP_PORT`     | no       | `587`                                    |
    /// | `SMTP_FROM`     | no       | `QueryPilot <noreply@querypilot.local>`  |
    /// | `SMTP_USERNAME` | no       | --                                       |
    /// | `SMTP_PASSWORD` | no       | --                                       |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_username: std::env::var("SMTP_USERNAME").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Mailers
// ---------------------------------------------------------------------------

pub struct SmtpMailer {
    config: MailerConfig,
}

impl SmtpMailer {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, purpose: OtpPurpose, code: &str) -> Result<(), MailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to.parse()?)
            .subject(purpose.email_subject())
            .header(ContentType::TEXT_PLAIN)
            .body(otp_body(purpose, code))
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mut transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);
        if let (Some(user), Some(pass)) = (&self.config.smtp_username, &self.config.smtp_password)
        {
            transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport.build().send(email).await?;
        tracing::info!(purpose = purpose.as_str(), "OTP email sent");
        Ok(())
    }
}

/// Development fallback: the code goes to the log instead of a mailbox.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, purpose: OtpPurpose, code: &str) -> Result<(), MailError> {
        tracing::info!(to, purpose = purpose.as_str(), code, "OTP issued (no SMTP configured)");
        Ok(())
    }
}

fn otp_body(purpose: OtpPurpose, code: &str) -> String {
    let minutes = purpose.ttl().num_minutes();
    format!(
        "Your QueryPilot code is {code}.\n\n\
         It expires in {minutes} minutes. If you did not request it, ignore this email."
    )
}
