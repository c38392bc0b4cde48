// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound email.
//!
//! Mail goes out over SMTP (`SMTP_HOST`). Without it, messages are written
//! to the log so local development still shows the links. Delivery failures
//! are reported to the caller, which logs and moves on.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;

use crate::config::SmtpConfig;

/// Timeout for SMTP commands.
const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Sends messages through an SMTP server.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the transport. No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let mut builder = builder.port(config.port).timeout(Some(MAIL_TIMEOUT));
        if let Some((user, pass)) = &config.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Render an [`Email`] as a text and HTML alternative message.
pub fn build_message(email: &Email) -> Result<Message, MailError> {
    let message = Message::builder()
        .from(email.from.parse::<Mailbox>()?)
        .to(email.to.parse::<Mailbox>()?)
        .subject(email.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))?;
    Ok(message)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let message = build_message(&email)?;
        self.transport.send(message).await?;
        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.text,
            "smtp not configured, email logged only"
        );
        Ok(())
    }
}

/// Link the frontend uses to confirm an address.
pub fn verification_link(origin: &str, code: &str) -> String {
    format!("{origin}/email/verify/{code}")
}

/// Link the frontend uses to pick a new password.
pub fn password_reset_link(origin: &str, code: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "{origin}/password/reset?code={code}&exp={}",
        expires_at.timestamp_millis()
    )
}

pub fn verification_email(from: &str, to: &str, name: &str, link: &str) -> Email {
    Email {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Verify your email".to_string(),
        text: format!("Hi {name},\n\nConfirm your email address by opening {link}\n"),
        html: format!(
            "<p>Hi {name},</p><p>Confirm your email address by clicking \
             <a href=\"{link}\">this link</a>.</p>"
        ),
    }
}

pub fn password_reset_email(from: &str, to: &str, name: &str, link: &str) -> Email {
    Email {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text: format!(
            "Hi {name},\n\nReset your password by opening {link}\n\
             The link is valid for one hour. Ignore this email if you did not ask for it.\n"
        ),
        html: format!(
            "<p>Hi {name},</p><p>Reset your password by clicking \
             <a href=\"{link}\">this link</a>. It is valid for one hour.</p>\
             <p>Ignore this email if you did not ask for it.</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn links_embed_code() {
        assert_eq!(
            verification_link("http://localhost:3000", "abc"),
            "http://localhost:3000/email/verify/abc"
        );
        let exp = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(
            password_reset_link("http://localhost:3000", "abc", exp),
            "http://localhost:3000/password/reset?code=abc&exp=1700000000000"
        );
    }

    #[test]
    fn templates_contain_link() {
        let email = verification_email("noreply@x", "a@b.com", "A", "http://l/1");
        assert_eq!(email.to, "a@b.com");
        assert!(email.text.contains("http://l/1"));
        assert!(email.html.contains("href=\"http://l/1\""));

        let reset = password_reset_email("noreply@x", "a@b.com", "A", "http://l/2");
        assert!(reset.text.contains("http://l/2"));
    }

    #[test]
    fn message_carries_both_bodies() {
        let email = verification_email("noreply@x.com", "a@b.com", "A", "http://l/1");
        let raw = String::from_utf8(build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("Subject: Verify your email"));
        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn bad_recipient_is_an_address_error() {
        let email = verification_email("noreply@x.com", "not an address", "A", "http://l/1");
        assert!(matches!(
            build_message(&email),
            Err(MailError::Address(_))
        ));
    }

    #[tokio::test]
    async fn smtp_mailer_builds_without_connecting() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 2525,
            credentials: Some(("user".into(), "pass".into())),
            secure: false,
        };
        assert!(SmtpMailer::new(&config).is_ok());
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = verification_email("noreply@x", "a@b.com", "A", "http://l/1");
        assert!(LogMailer.send(email).await.is_ok());
    }
}
