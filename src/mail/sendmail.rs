use async_trait::async_trait;
use serde_json::json;
use tokio::time::{sleep, Duration};

use super::mails::render_html;
use crate::service::notification_service::{Notifier, NotifyError, OutboundMessage};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// E-mail channel backed by the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        ResendMailer {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }

    async fn send_with_retries(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), NotifyError> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.send_via_resend(to_email, subject, html_body).await {
                Ok(email_id) => {
                    tracing::info!("✓ Email sent to {} (id: {})", to_email, email_id);
                    return Ok(());
                }
                // A 4xx will not get better on retry.
                Err(e) if is_client_rejection(&e) => {
                    tracing::error!("✗ Email rejected for {}: {}", to_email, e);
                    return Err(e);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        let delay = RETRY_DELAY_MS * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            "Email send attempt {} failed for {}. Retrying in {}ms...",
                            attempt,
                            to_email,
                            delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| NotifyError::Transport("unknown email sending error".to_string()));
        tracing::error!("✗ Email failed for {} after {} attempts: {}", to_email, MAX_RETRIES, error);
        Err(error)
    }

    async fn send_via_resend(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotifyError> {
        let request_body = json!({
            "from": self.from,
            "to": to_email,
            "subject": subject,
            "html": html_body,
        });

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());

        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let id = serde_json::from_str::<serde_json::Value>(&response_text)
            .ok()
            .and_then(|body| body.get("id").and_then(|v| v.as_str()).map(str::to_owned))
            .unwrap_or_else(|| "success".to_string());
        Ok(id)
    }
}

fn is_client_rejection(error: &NotifyError) -> bool {
    matches!(error, NotifyError::Rejected { status, .. } if (400..500).contains(status))
}

#[async_trait]
impl Notifier for ResendMailer {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(NotifyError::InvalidRecipient(recipient.to_string()));
        }

        let html = render_html(message);
        self.send_with_retries(recipient, &message.subject, &html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_recipient_without_at_sign() {
        let mailer = ResendMailer::new("key".into(), "LabourHub <noreply@example.com>".into());
        let result = mailer
            .send("9876543210", &OutboundMessage::new("Hi", "body"))
            .await;

        assert!(matches!(result, Err(NotifyError::InvalidRecipient(_))));
    }

    #[test]
    fn only_client_errors_skip_retries() {
        let rejected = |status| NotifyError::Rejected {
            status,
            body: String::new(),
        };

        assert!(is_client_rejection(&rejected(422)));
        assert!(!is_client_rejection(&rejected(503)));
        assert!(!is_client_rejection(&NotifyError::Transport("reset".into())));
    }
}
