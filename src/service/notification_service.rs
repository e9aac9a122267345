use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::{DbError, MarketStore},
    service::error::ServiceError,
    utils::phone::format_phone_display,
};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        OutboundMessage {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// One delivery channel (SMS, e-mail, ...).
#[async_trait]
pub trait Notifier: Debug + Send + Sync {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), NotifyError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    channel: &'static str,
}

impl LogNotifier {
    pub fn sms() -> Self {
        LogNotifier { channel: "sms" }
    }

    pub fn email() -> Self {
        LogNotifier { channel: "email" }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<(), NotifyError> {
        tracing::info!(
            channel = self.channel,
            recipient,
            subject = %message.subject,
            "📨 {}",
            message.body
        );
        Ok(())
    }
}

/// Who a lifecycle message is for. Resolved to an account on the delivery task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(Uuid),
    Client(Uuid),
    Labour(Uuid),
}

impl Recipient {
    async fn user_id(self, db_client: &dyn MarketStore) -> Result<Option<Uuid>, DbError> {
        Ok(match self {
            Recipient::User(id) => Some(id),
            Recipient::Client(id) => db_client.get_client(id).await?.map(|c| c.user_id),
            Recipient::Labour(id) => db_client.get_labour(id).await?.map(|l| l.user_id),
        })
    }
}

/// Fire-and-forget side channel for lifecycle events. Delivery runs on its own
/// task; a failed send is logged and never reaches the caller.
#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<dyn MarketStore>,
    sms: Arc<dyn Notifier>,
    email: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(
        db_client: Arc<dyn MarketStore>,
        sms: Arc<dyn Notifier>,
        email: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db_client,
            sms,
            email,
        }
    }

    /// OTP delivery is the whole point of its request, so it is awaited.
    pub async fn send_otp(&self, phone: &str, code: &str) -> Result<(), ServiceError> {
        let message = OutboundMessage::new(
            "Verification code",
            format!("Your LabourHub verification code is {}", code),
        );
        self.sms
            .send(&format_phone_display(phone), &message)
            .await
            .map_err(|e| ServiceError::Notification(e.to_string()))
    }

    pub fn application_submitted(
        &self,
        client_id: Uuid,
        job_title: &str,
        labour_name: &str,
        labour_phone: Option<&str>,
    ) {
        let phone = labour_phone
            .map(format_phone_display)
            .unwrap_or_else(|| "not provided".to_string());
        self.notify(
            Recipient::Client(client_id),
            OutboundMessage::new(
                "New Job Application",
                format!(
                    "{} has applied for your job \"{}\". Phone: {}",
                    labour_name, job_title, phone
                ),
            ),
        );
    }

    pub fn application_accepted(&self, labour_id: Uuid, job_title: &str) {
        self.notify(
            Recipient::Labour(labour_id),
            OutboundMessage::new(
                "Application Accepted",
                format!("Your application for \"{}\" has been accepted.", job_title),
            ),
        );
    }

    pub fn work_done(&self, labour_id: Uuid, job_title: &str) {
        self.notify(
            Recipient::Labour(labour_id),
            OutboundMessage::new(
                "Work Marked Done",
                format!(
                    "The client marked \"{}\" as done. Confirm once you have been paid.",
                    job_title
                ),
            ),
        );
    }

    pub fn payment_confirmed(&self, client_id: Uuid, job_title: &str, amount: f64) {
        self.notify(
            Recipient::Client(client_id),
            OutboundMessage::new(
                "Job Completed",
                format!(
                    "Payment of ₹{:.2} for \"{}\" was confirmed. Please rate the worker.",
                    amount, job_title
                ),
            ),
        );
    }

    pub fn welcome(&self, user_id: Uuid, name: &str) {
        self.notify(
            Recipient::User(user_id),
            OutboundMessage::new(
                "Welcome to LabourHub",
                format!("Hi {}, your account is ready.", name),
            ),
        );
    }

    /// E-mail when the user has one, SMS otherwise.
    fn notify(&self, recipient: Recipient, message: OutboundMessage) {
        let db_client = self.db_client.clone();
        let sms = self.sms.clone();
        let email = self.email.clone();

        tokio::spawn(async move {
            let user = match recipient.user_id(db_client.as_ref()).await {
                Ok(Some(user_id)) => db_client.get_user(user_id).await,
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            };
            let user = match user {
                Ok(Some(user)) => user,
                Ok(None) => {
                    tracing::warn!("Notification skipped: {:?} not found", recipient);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Notification skipped for {:?}: {}", recipient, e);
                    return;
                }
            };

            let outcome = match (user.email.as_deref(), user.phone.as_deref()) {
                (Some(address), _) => email.send(address, &message).await,
                (None, Some(phone)) => sms.send(&format_phone_display(phone), &message).await,
                (None, None) => Err(NotifyError::InvalidRecipient(user.id.to_string())),
            };

            if let Err(e) = outcome {
                tracing::warn!(
                    "Failed to deliver '{}' to user {}: {}",
                    message.subject,
                    user.id,
                    e
                );
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::mpsc;

    use super::*;

    /// Forwards every delivery to a channel the test can await.
    #[derive(Debug, Clone)]
    pub struct RecordingNotifier {
        tx: mpsc::UnboundedSender<(String, OutboundMessage)>,
    }

    impl RecordingNotifier {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, OutboundMessage)>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (RecordingNotifier { tx }, rx)
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            recipient: &str,
            message: &OutboundMessage,
        ) -> Result<(), NotifyError> {
            let _ = self.tx.send((recipient.to_string(), message.clone()));
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _: &str, _: &OutboundMessage) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("gateway unreachable".to_string()))
        }
    }
}
