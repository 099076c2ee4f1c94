//! Outbound mail for password resets.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Result, UserError};
use crate::reset::RESET_TOKEN_TTL_MINUTES;

/// SMTP configuration for outbound mail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Leave empty to skip authentication (development with MailHog)
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    /// Base URL reset links point at
    pub reset_base_url: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025, // MailHog default port for development
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "noreply@platter.dev".to_string(),
            from_name: "Platter".to_string(),
            reset_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Sends password reset email over SMTP
#[derive(Debug, Clone)]
pub struct Mailer {
    config: MailerConfig,
}

impl Mailer {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }

    /// The URL a reset email points at
    pub fn reset_url(&self, token: &str) -> String {
        format!(
            "{}/api/v1/auth/resetpassword/{}",
            self.config.reset_base_url,
            urlencoding::encode(token)
        )
    }

    /// Send a password reset email carrying the plain token link
    pub async fn send_password_reset(&self, to_email: &str, name: &str, token: &str) -> Result<()> {
        let reset_link = self.reset_url(token);

        let email_body = format!(
            r#"
            <html>
            <body>
                <h2>Hello {name},</h2>
                <p>You are receiving this email because you (or someone else) requested a password reset.</p>
                <p>Submit a PUT request with your new password to:</p>
                <p>{reset_link}</p>
                <p>This link will expire in {} minutes.</p>
                <p>If you didn't request a reset, you can safely ignore this email.</p>
            </body>
            </html>
            "#,
            RESET_TOKEN_TTL_MINUTES
        );

        let email = Message::builder()
            .from(
                format!("{} <{}>", self.config.from_name, self.config.from_email)
                    .parse()
                    .map_err(|e| UserError::Configuration(format!("Invalid from email: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| UserError::Configuration(format!("Invalid to email: {}", e)))?)
            .subject("Password reset request")
            .header(ContentType::TEXT_HTML)
            .body(email_body)
            .map_err(|e| UserError::Configuration(format!("Failed to build email: {}", e)))?;

        // No authentication for development transports, credentials otherwise
        let mailer = if self.config.smtp_username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            );

            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| UserError::Configuration(format!("Invalid SMTP host: {}", e)))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };

        mailer.send(email).await.map_err(|e| {
            error!("Failed to send reset email: {}", e);
            UserError::Mail(format!("Failed to send email: {}", e))
        })?;

        debug!("Password reset email sent to: {}", to_email);
        Ok(())
    }
}
