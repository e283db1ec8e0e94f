//! Outbound email for one-time codes and verification/reset links.
//!
//! Uses SMTP via lettre, with bodies rendered from askama templates. Sends
//! are retried a bounded number of times when the failure is transient; a
//! failed delivery never touches the code or token that was already stored.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::otp_codes::OtpPurpose;

const SENDER_NAME: &str = "Hugli Printing Service";
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Template)]
#[template(path = "email/otp_code.html")]
struct OtpCodeHtml<'a> {
    heading: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/otp_code.txt")]
struct OtpCodeText<'a> {
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification_link.html")]
struct VerificationLinkHtml<'a> {
    heading: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification_link.txt")]
struct VerificationLinkText<'a> {
    url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset_link.html")]
struct PasswordResetLinkHtml<'a> {
    heading: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset_link.txt")]
struct PasswordResetLinkText<'a> {
    url: &'a str,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A message the auth flows hand to the notification sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Otp { to: String, code: String, purpose: OtpPurpose },
    VerificationLink { to: String, url: String },
    PasswordResetLink { to: String, url: String },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Self::Otp { to, .. } | Self::VerificationLink { to, .. } | Self::PasswordResetLink { to, .. } => to,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Otp { purpose: OtpPurpose::Login, .. } => "Your Hugli account login verification code",
            Self::Otp { purpose: OtpPurpose::EmailVerification, .. } => "Verify your Hugli account",
            Self::Otp { purpose: OtpPurpose::PasswordReset, .. } => "Your Hugli password reset code",
            Self::VerificationLink { .. } => "Verify Your Hugli Account",
            Self::PasswordResetLink { .. } => "Reset Your Hugli Account Password",
        }
    }

    pub fn text_body(&self) -> Result<String, EmailError> {
        let body = match self {
            Self::Otp { code, .. } => OtpCodeText { code }.render()?,
            Self::VerificationLink { url, .. } => VerificationLinkText { url }.render()?,
            Self::PasswordResetLink { url, .. } => PasswordResetLinkText { url }.render()?,
        };
        Ok(body)
    }

    pub fn html_body(&self) -> Result<String, EmailError> {
        let heading = self.subject();
        let body = match self {
            Self::Otp { code, .. } => OtpCodeHtml { heading, code }.render()?,
            Self::VerificationLink { url, .. } => VerificationLinkHtml { heading, url }.render()?,
            Self::PasswordResetLink { url, .. } => PasswordResetLinkHtml { heading, url }.render()?,
        };
        Ok(body)
    }
}

/// The external notification sender.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), EmailError>;
}

/// Sends and reports whether delivery succeeded. A failure is logged and
/// never undoes the code or token that was already persisted.
pub async fn deliver(notifier: &dyn Notifier, notification: &Notification) -> bool {
    match notifier.send(notification).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, to = %notification.recipient(), "Email delivery failed");
            false
        }
    }
}

/// SMTP delivery through a STARTTLS relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let from = sender_mailbox(&config.from_address)?;

        Ok(Self { mailer, from })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, EmailError> {
        let to = notification.recipient();
        let to: Mailbox = to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(to.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(notification.text_body()?),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(notification.html_body()?),
                    ),
            )?;

        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), EmailError> {
        let message = self.build_message(notification)?;

        let mut attempt = 1;
        loop {
            match self.mailer.send(message.clone()).await {
                Ok(_) => {
                    tracing::info!(to = %notification.recipient(), subject = %notification.subject(), "Email sent successfully");
                    return Ok(());
                }
                Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                    tracing::warn!(error = %e, attempt, "Transient SMTP failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// 4xx replies, timeouts and dropped or refused connections are retried.
/// Everything else (5xx, TLS, malformed responses) fails at once.
fn is_retryable(err: &SmtpError) -> bool {
    err.is_transient() || err.is_timeout() || is_connection_failure(err)
}

fn is_connection_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            return matches!(
                io.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::UnexpectedEof
            );
        }
        source = cause.source();
    }
    false
}

/// `SMTP_FROM` may already be a full mailbox (`Name <addr>`); a bare
/// address gets the shop's display name.
fn sender_mailbox(from: &str) -> Result<Mailbox, EmailError> {
    let mut mailbox: Mailbox = from
        .parse()
        .map_err(|_| EmailError::InvalidAddress(from.to_string()))?;
    if mailbox.name.is_none() {
        mailbox.name = Some(SENDER_NAME.to_string());
    }
    Ok(mailbox)
}

/// Used when no SMTP relay is configured. Logs instead of sending, so codes
/// are visible to whoever runs the server locally.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), EmailError> {
        let body = notification.text_body()?;
        tracing::warn!(
            to = %notification.recipient(),
            subject = %notification.subject(),
            %body,
            "SMTP not configured, email not sent"
        );
        Ok(())
    }
}
