//! Email delivery for purchase confirmations and password resets.
//!
//! Sends via the SendGrid v3 mail-send API when an API key is configured,
//! otherwise logs and reports `Disabled`. Callers must treat any failure as
//! non-fatal: a lost email never rolls back a purchase.

use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was accepted by SendGrid
    Sent,
    /// No API key configured - logged only
    Disabled,
}

#[derive(Serialize)]
struct MailAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [MailAddress<'a>; 1],
}

#[derive(Serialize)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: String,
}

#[derive(Serialize)]
struct SendGridMessage<'a> {
    personalizations: [Personalization<'a>; 1],
    from: MailAddress<'a>,
    subject: &'a str,
    content: [MailContent<'a>; 1],
}

#[derive(Clone)]
pub struct EmailService {
    client: Client,
    api_key: Option<String>,
    from: String,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            from,
        }
    }

    /// Purchase confirmation with the freshly minted download link.
    pub async fn send_purchase_confirmation(
        &self,
        to: &str,
        product_name: &str,
        download_url: &str,
    ) -> Result<EmailSendResult> {
        let subject = format!("Your \"{}\" template is ready", product_name);
        let body = format!(
            "Thanks for your purchase on Run Your Trip!\n\n\
             Your template \"{}\" is ready to download:\n\n{}\n\n\
             The link stays valid for 7 days. You can generate a fresh link\n\
             from your dashboard at any time.\n",
            product_name, download_url
        );
        self.send(to, &subject, &body).await
    }

    /// Password reset link (valid for 1 hour).
    pub async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<EmailSendResult> {
        let body = format!(
            "We received a request to reset your Run Your Trip password.\n\n\
             Reset it here (link valid for 1 hour):\n\n{}\n\n\
             If you didn't request this, you can ignore this email.\n",
            reset_url
        );
        self.send(to, "Reset your Run Your Trip password", &body).await
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<EmailSendResult> {
        let Some(api_key) = &self.api_key else {
            tracing::info!("Email disabled (no SENDGRID_API_KEY): would send \"{}\" to {}", subject, to);
            return Ok(EmailSendResult::Disabled);
        };

        let message = SendGridMessage {
            personalizations: [Personalization {
                to: [MailAddress { email: to }],
            }],
            from: MailAddress { email: &self.from },
            subject,
            content: [MailContent {
                content_type: "text/plain",
                value: body.to_string(),
            }],
        };

        let response = self
            .client
            .post(SENDGRID_API_URL)
            .bearer_auth(api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("SendGrid request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "SendGrid rejected message ({}): {}",
                status, error_text
            )));
        }

        Ok(EmailSendResult::Sent)
    }
}
