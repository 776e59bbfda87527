//! SendGrid mail client.

use super::{Notifier, NotifyError};
use async_trait::async_trait;
use std::time::Duration;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            from_email,
        }
    }
}

#[async_trait]
impl Notifier for SendGridMailer {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "personalizations": [{ "to": [{ "email": to_email }] }],
            "from": { "email": self.from_email },
            "subject": subject,
            "content": [{ "type": "text/html", "value": body }],
        });

        let resp = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(%to_email, %status, "reminder mail accepted");
            Ok(())
        } else {
            Err(NotifyError::Provider {
                status: status.as_u16(),
            })
        }
    }
}
